use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use expense_tracker::logging::init_tracing;
use expense_tracker::validation::expense_from_fields;
use expense_tracker::{Expense, ExpenseStore};

/// Manage the expense database from the command line
#[derive(Parser, Debug)]
#[command(name = "expense-tracker", version)]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "EXPENSES_DB", default_value = "expenses.db", global = true)]
    db: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the expense table if it does not exist
    Init,
    /// Record a new expense
    Add {
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Defaults to today (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
    /// List expenses, newest date first
    List {
        /// Only show this category (exact match)
        #[arg(long)]
        category: Option<String>,
    },
    /// Show one expense
    Show { id: i64 },
    /// Delete one expense
    Delete { id: i64 },
    /// Total spending and per-category breakdown
    Summary,
    /// Import expenses from a CSV file (amount,category,description,date)
    Import { csv: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    // stdout carries results, so only warnings are logged by default
    init_tracing(if cli.debug { "debug" } else { "warn" })?;

    let store = ExpenseStore::open(&cli.db);
    store
        .init_schema()
        .with_context(|| format!("Failed to open database at {}", cli.db.display()))?;

    match cli.command {
        Command::Init => {
            println!("✓ Database ready: {}", cli.db.display());
        }
        Command::Add {
            amount,
            category,
            description,
            date,
        } => {
            let date = date.unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());
            let expense =
                expense_from_fields(Some(amount), Some(category), Some(description), Some(date))?;
            let id = store.add(&expense)?;
            println!("✓ Added expense #{}", id);
        }
        Command::List { category } => {
            let expenses = match &category {
                Some(c) => store.list_by_category(c)?,
                None => store.list_all()?,
            };
            print_expenses(&expenses);
        }
        Command::Show { id } => match store.get_by_id(id)? {
            Some(expense) => print_expenses(&[expense]),
            None => bail!("Expense #{} not found", id),
        },
        Command::Delete { id } => {
            if !store.delete(id)? {
                bail!("Expense #{} not found", id);
            }
            println!("✓ Deleted expense #{}", id);
        }
        Command::Summary => {
            let summary = store.summary()?;
            println!("Total spending: {:.2}", summary.total_spending);
            for row in &summary.by_category {
                println!("  {:<20} {:>12.2}  ({} expenses)", row.category, row.total, row.count);
            }
        }
        Command::Import { csv } => {
            let report = store
                .import_csv(&csv)
                .with_context(|| format!("Failed to import {}", csv.display()))?;
            println!("✓ Inserted: {} expenses", report.inserted);
            println!("✓ Skipped invalid rows: {}", report.skipped);
            println!("✓ Database contains {} expenses", store.count()?);
        }
    }

    Ok(())
}

fn print_expenses(expenses: &[Expense]) {
    if expenses.is_empty() {
        println!("No expenses found");
        return;
    }

    println!("{:>5}  {:<12} {:<20} {:>12}  DESCRIPTION", "ID", "DATE", "CATEGORY", "AMOUNT");
    for e in expenses {
        println!(
            "{:>5}  {:<12} {:<20} {:>12.2}  {}",
            e.id, e.date, e.category, e.amount, e.description
        );
    }
}
