use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::StoreResult;
use crate::validation::expense_from_fields;

/// A persisted expense record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub date: String,
}

/// The mutable fields of an expense, used for inserts and full replaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub amount: f64,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub date: String,
}

/// Spending aggregated over one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: i64,
}

/// Overall spend plus the per-category breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_spending: f64,
    pub by_category: Vec<CategoryTotal>,
}

/// Outcome of a CSV import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// One row of an import file: `amount,category,description,date`
#[derive(Debug, Deserialize)]
struct CsvExpense {
    amount: Option<f64>,
    category: Option<String>,
    #[serde(default)]
    description: Option<String>,
    date: Option<String>,
}

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS expenses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    amount REAL NOT NULL,
    category TEXT NOT NULL,
    description TEXT,
    date TEXT NOT NULL
)";

// `date` is opaque text, so ordering is lexicographic. ISO-8601 dates sort chronologically.
const SELECT_COLUMNS: &str = "SELECT id, amount, category, description, date FROM expenses";

/// Where the database lives and how each connection is opened
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// Handle to the expense table.
///
/// Holds no connection: every operation opens its own, runs a single
/// statement and drops the connection before returning, on success or error.
#[derive(Debug, Clone)]
pub struct ExpenseStore {
    config: StoreConfig,
}

impl ExpenseStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(StoreConfig::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn connect(&self) -> StoreResult<Connection> {
        let conn = Connection::open(&self.config.path)?;
        conn.busy_timeout(self.config.busy_timeout)?;
        Ok(conn)
    }

    /// Create the expense table if it does not exist
    pub fn init_schema(&self) -> StoreResult<()> {
        if let Some(parent) = self.config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = self.connect()?;
        // WAL lets readers proceed while another connection writes
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.execute(SCHEMA, [])?;

        info!(path = %self.config.path.display(), journal_mode = %mode, "Expense schema ready");
        Ok(())
    }

    /// Insert an expense and return its new id
    pub fn add(&self, expense: &NewExpense) -> StoreResult<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO expenses (amount, category, description, date) VALUES (?1, ?2, ?3, ?4)",
            params![
                expense.amount,
                expense.category,
                expense.description,
                expense.date
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(id, category = %expense.category, "Inserted expense");
        Ok(id)
    }

    /// Every expense, newest date first
    pub fn list_all(&self) -> StoreResult<Vec<Expense>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY date DESC, id DESC"))?;

        let expenses = stmt
            .query_map([], row_to_expense)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(expenses)
    }

    pub fn get_by_id(&self, id: i64) -> StoreResult<Option<Expense>> {
        let conn = self.connect()?;
        let expense = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id],
                row_to_expense,
            )
            .optional()?;

        Ok(expense)
    }

    /// Returns false when no row had this id
    pub fn delete(&self, id: i64) -> StoreResult<bool> {
        let conn = self.connect()?;
        let affected = conn.execute("DELETE FROM expenses WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Replace all mutable fields. Returns false (and inserts nothing) when the id is unknown.
    pub fn update(&self, id: i64, expense: &NewExpense) -> StoreResult<bool> {
        let conn = self.connect()?;
        let affected = conn.execute(
            "UPDATE expenses
             SET amount = ?1, category = ?2, description = ?3, date = ?4
             WHERE id = ?5",
            params![
                expense.amount,
                expense.category,
                expense.description,
                expense.date,
                id
            ],
        )?;

        Ok(affected > 0)
    }

    /// Expenses whose category matches exactly (case-sensitive)
    pub fn list_by_category(&self, category: &str) -> StoreResult<Vec<Expense>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE category = ?1 ORDER BY date DESC, id DESC"
        ))?;

        let expenses = stmt
            .query_map([category], row_to_expense)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(expenses)
    }

    /// Sum of all amounts, 0 on an empty table
    pub fn total(&self) -> StoreResult<f64> {
        let conn = self.connect()?;
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0.0) FROM expenses",
            [],
            |row| row.get(0),
        )?;

        Ok(total)
    }

    /// One row per category, largest total first
    pub fn totals_by_category(&self) -> StoreResult<Vec<CategoryTotal>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT category, SUM(amount) AS total, COUNT(*) AS count
             FROM expenses
             GROUP BY category
             ORDER BY total DESC",
        )?;

        let totals = stmt
            .query_map([], |row| {
                Ok(CategoryTotal {
                    category: row.get(0)?,
                    total: row.get(1)?,
                    count: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(totals)
    }

    /// Two independent reads; no snapshot is shared between them
    pub fn summary(&self) -> StoreResult<Summary> {
        let total_spending = self.total()?;
        let by_category = self.totals_by_category()?;

        Ok(Summary {
            total_spending,
            by_category,
        })
    }

    pub fn count(&self) -> StoreResult<i64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM expenses", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Import expenses from a CSV file with an `amount,category,description,date` header.
    ///
    /// Rows that fail to parse or validate are skipped and counted.
    pub fn import_csv(&self, csv_path: &Path) -> StoreResult<ImportReport> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(csv_path)?;

        let mut report = ImportReport::default();

        for (index, result) in rdr.deserialize::<CsvExpense>().enumerate() {
            // header is line 1
            let line = index + 2;

            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    warn!(line, error = %e, "Skipping unreadable row");
                    report.skipped += 1;
                    continue;
                }
            };

            match expense_from_fields(row.amount, row.category, row.description, row.date) {
                Ok(expense) => {
                    self.add(&expense)?;
                    report.inserted += 1;
                }
                Err(errors) => {
                    warn!(line, %errors, "Skipping invalid row");
                    report.skipped += 1;
                }
            }
        }

        info!(
            inserted = report.inserted,
            skipped = report.skipped,
            "Imported {}",
            csv_path.display()
        );
        Ok(report)
    }
}

fn row_to_expense(row: &Row<'_>) -> rusqlite::Result<Expense> {
    let description: Option<String> = row.get(3)?;

    Ok(Expense {
        id: row.get(0)?,
        amount: row.get(1)?,
        category: row.get(2)?,
        description: description.unwrap_or_default(),
        date: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Fresh store in a temp dir; the dir must outlive the store
    fn test_store() -> (TempDir, ExpenseStore) {
        let dir = TempDir::new().unwrap();
        let store = ExpenseStore::open(dir.path().join("expenses.db"));
        store.init_schema().unwrap();
        (dir, store)
    }

    fn expense(amount: f64, category: &str, description: &str, date: &str) -> NewExpense {
        NewExpense {
            amount,
            category: category.to_string(),
            description: description.to_string(),
            date: date.to_string(),
        }
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let (_dir, store) = test_store();
        store.init_schema().unwrap();
        store.init_schema().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_init_schema_creates_parent_dir() {
        let dir = TempDir::new().unwrap();
        let store = ExpenseStore::open(dir.path().join("nested").join("expenses.db"));
        store.init_schema().unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_add_then_get_round_trip() {
        let (_dir, store) = test_store();
        let new = expense(500.50, "Groceries", "", "2026-01-12");

        let id = store.add(&new).unwrap();
        let fetched = store.get_by_id(id).unwrap().unwrap();

        assert_eq!(
            fetched,
            Expense {
                id,
                amount: 500.50,
                category: "Groceries".to_string(),
                description: String::new(),
                date: "2026-01-12".to_string(),
            }
        );
    }

    #[test]
    fn test_ids_increase() {
        let (_dir, store) = test_store();
        let first = store.add(&expense(1.0, "A", "", "2026-01-01")).unwrap();
        let second = store.add(&expense(2.0, "A", "", "2026-01-01")).unwrap();
        assert!(second > first);

        // AUTOINCREMENT never reuses a deleted id
        store.delete(second).unwrap();
        let third = store.add(&expense(3.0, "A", "", "2026-01-01")).unwrap();
        assert!(third > second);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (_dir, store) = test_store();
        assert!(store.get_by_id(42).unwrap().is_none());
    }

    #[test]
    fn test_null_description_reads_as_empty() {
        let (_dir, store) = test_store();
        let conn = Connection::open(store.path()).unwrap();
        conn.execute(
            "INSERT INTO expenses (amount, category, description, date) VALUES (9.5, 'Misc', NULL, '2026-02-01')",
            [],
        )
        .unwrap();
        let id = conn.last_insert_rowid();
        drop(conn);

        assert_eq!(store.get_by_id(id).unwrap().unwrap().description, "");
    }

    #[test]
    fn test_list_all_orders_by_date_string_desc() {
        let (_dir, store) = test_store();
        store.add(&expense(1.0, "A", "", "2026-01-12")).unwrap();
        store.add(&expense(2.0, "B", "", "2026-02-02")).unwrap();
        store.add(&expense(3.0, "C", "", "2025-12-31")).unwrap();

        let dates: Vec<String> = store.list_all().unwrap().into_iter().map(|e| e.date).collect();
        assert_eq!(dates, vec!["2026-02-02", "2026-01-12", "2025-12-31"]);
    }

    #[test]
    fn test_non_iso_dates_sort_lexicographically() {
        let (_dir, store) = test_store();
        store.add(&expense(1.0, "A", "", "12-01-2026")).unwrap();
        store.add(&expense(2.0, "A", "", "02-02-2026")).unwrap();
        store.add(&expense(3.0, "A", "", "15-01-2026")).unwrap();

        let dates: Vec<String> = store.list_all().unwrap().into_iter().map(|e| e.date).collect();
        assert_eq!(dates, vec!["15-01-2026", "12-01-2026", "02-02-2026"]);
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = test_store();
        let id = store.add(&expense(10.0, "Food", "", "2026-01-01")).unwrap();

        assert!(store.delete(id).unwrap());
        assert!(!store.delete(id).unwrap());
        assert!(!store.delete(9999).unwrap());
        assert!(store.get_by_id(id).unwrap().is_none());
    }

    #[test]
    fn test_update_replaces_all_fields() {
        let (_dir, store) = test_store();
        let id = store
            .add(&expense(10.0, "Food", "Lunch", "2026-01-01"))
            .unwrap();

        let replacement = expense(12.5, "Dining", "", "2026-01-02");
        assert!(store.update(id, &replacement).unwrap());

        let fetched = store.get_by_id(id).unwrap().unwrap();
        assert_eq!(fetched.amount, 12.5);
        assert_eq!(fetched.category, "Dining");
        assert_eq!(fetched.description, "");
        assert_eq!(fetched.date, "2026-01-02");
    }

    #[test]
    fn test_update_missing_does_not_insert() {
        let (_dir, store) = test_store();
        assert!(!store
            .update(77, &expense(1.0, "A", "", "2026-01-01"))
            .unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_list_by_category_is_exact_match() {
        let (_dir, store) = test_store();
        store.add(&expense(1.0, "Food", "", "2026-01-01")).unwrap();
        store.add(&expense(2.0, "food", "", "2026-01-02")).unwrap();
        store.add(&expense(3.0, "Food", "", "2026-01-03")).unwrap();

        let food = store.list_by_category("Food").unwrap();
        assert_eq!(food.len(), 2);
        assert_eq!(food[0].date, "2026-01-03");
        assert!(store.list_by_category("Travel").unwrap().is_empty());
    }

    #[test]
    fn test_total_empty_is_zero() {
        let (_dir, store) = test_store();
        assert_eq!(store.total().unwrap(), 0.0);
        assert!(store.totals_by_category().unwrap().is_empty());
    }

    #[test]
    fn test_aggregates_are_consistent() {
        let (_dir, store) = test_store();
        store.add(&expense(500.50, "Groceries", "", "2026-01-12")).unwrap();
        store.add(&expense(200.0, "Transport", "Ola Ride", "2026-01-15")).unwrap();
        store.add(&expense(13000.55, "Flight", "", "2026-02-02")).unwrap();
        store.add(&expense(50.0, "Groceries", "", "2026-02-03")).unwrap();

        let totals = store.totals_by_category().unwrap();
        let categories: Vec<&str> = totals.iter().map(|t| t.category.as_str()).collect();
        assert_eq!(categories, vec!["Flight", "Groceries", "Transport"]);

        for t in &totals {
            let rows = store.list_by_category(&t.category).unwrap();
            assert_eq!(t.count, rows.len() as i64);
        }

        let sum: f64 = totals.iter().map(|t| t.total).sum();
        assert!((sum - store.total().unwrap()).abs() < 1e-9);

        let summary = store.summary().unwrap();
        assert_eq!(summary.by_category, totals);
        assert!((summary.total_spending - 13751.05).abs() < 1e-9);
    }

    #[test]
    fn test_import_csv_skips_invalid_rows() {
        let (dir, store) = test_store();
        let csv_path = dir.path().join("seed.csv");
        std::fs::write(
            &csv_path,
            "amount,category,description,date\n\
             500.50,Groceries,Weekly grocery shopping,2026-01-12\n\
             200.00,Transport,,2026-01-15\n\
             ,Flight,Missing amount,2026-02-02\n\
             abc,Flight,Bad amount,2026-02-02\n\
             13000.55,Flight,Airline ticket for vacation,2026-02-02\n",
        )
        .unwrap();

        let report = store.import_csv(&csv_path).unwrap();
        assert_eq!(report, ImportReport { inserted: 3, skipped: 2 });
        assert_eq!(store.count().unwrap(), 3);

        let transport = store.list_by_category("Transport").unwrap();
        assert_eq!(transport[0].description, "");
    }

    #[test]
    fn test_concurrent_writers_wait_for_lock() {
        let (_dir, store) = test_store();
        let store = ExpenseStore::new(StoreConfig {
            path: store.path().to_path_buf(),
            busy_timeout: Duration::from_secs(10),
        });
        let threads = 8;
        let per_thread = 25;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..per_thread {
                        let category = format!("Thread{}", t);
                        store
                            .add(&expense(i as f64, &category, "", "2026-01-01"))
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.count().unwrap(), (threads * per_thread) as i64);
        let totals = store.totals_by_category().unwrap();
        assert_eq!(totals.len(), threads);
        assert!(totals.iter().all(|t| t.count == per_thread as i64));
    }
}
