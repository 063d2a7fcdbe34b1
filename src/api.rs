// Expense Tracker - HTTP layer
// Routes, request validation, and JSON response shaping

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::db::{Expense, ExpenseStore, NewExpense, Summary};
use crate::error::{StoreError, StoreResult};
use crate::validation::{expense_from_json, ValidationErrors};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    fn expense_not_found() -> Self {
        ApiError::NotFound("Expense not found".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": errors.to_string(),
                    "missing": errors.missing,
                    "invalid": errors.invalid,
                }),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                json!({ "error": self.to_string() }),
            ),
            ApiError::Store(e) => {
                error!("Store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": e.to_string() }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// Expense id from the path. Only unsigned decimal digits match; anything
/// else is treated as an unknown route.
pub struct ExpenseId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for ExpenseId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| route_not_found())?;

        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(route_not_found());
        }

        raw.parse::<i64>().map(Self).map_err(|_| route_not_found())
    }
}

fn route_not_found() -> ApiError {
    ApiError::NotFound("Not found".into())
}

/// Turn a JSON body (or the framework's rejection) into a validated payload
fn parse_body(body: Result<Json<Value>, JsonRejection>) -> ApiResult<NewExpense> {
    let Json(value) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    expense_from_json(&value).map_err(ApiError::Validation)
}

/// Run a store call on the blocking pool
async fn with_store<T, F>(store: &ExpenseStore, op: F) -> ApiResult<T>
where
    F: FnOnce(&ExpenseStore) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    let result = tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?;

    Ok(result?)
}

// ============================================================================
// Response bodies
// ============================================================================

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct CreatedResponse {
    message: &'static str,
    id: i64,
}

#[derive(Serialize)]
struct ExpenseListResponse {
    count: usize,
    expenses: Vec<Expense>,
}

#[derive(Serialize)]
struct CategoryResponse {
    category: String,
    count: usize,
    expenses: Vec<Expense>,
}

#[derive(Serialize)]
struct TotalResponse {
    total_spending: f64,
}

const AVAILABLE_ROUTES: &[&str] = &[
    "POST /expenses - Add new expense",
    "GET /expenses - Get all expenses",
    "GET /expenses/{id} - Get one expense",
    "PUT /expenses/{id} - Replace an expense",
    "DELETE /expenses/{id} - Delete an expense",
    "GET /expenses/category/{category} - Get expenses in a category",
    "GET /expenses/category/total - Get total spending",
    "GET /expenses/summary - Get totals per category",
];

// ============================================================================
// Handlers
// ============================================================================

/// GET / - Welcome payload
async fn home() -> impl IntoResponse {
    Json(json!({
        "message": "Welcome to Expense Tracker API!",
        "available_routes": AVAILABLE_ROUTES,
    }))
}

/// POST /expenses - Add a new expense
async fn create_expense(
    State(store): State<ExpenseStore>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let expense = parse_body(body)?;
    let id = with_store(&store, move |s| s.add(&expense)).await?;
    info!(id, "Expense created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Expense added successfully",
            id,
        }),
    ))
}

/// GET /expenses - All expenses, newest date first
async fn list_expenses(State(store): State<ExpenseStore>) -> ApiResult<impl IntoResponse> {
    let expenses = with_store(&store, |s| s.list_all()).await?;

    Ok(Json(ExpenseListResponse {
        count: expenses.len(),
        expenses,
    }))
}

/// GET /expenses/:id
async fn get_expense(
    State(store): State<ExpenseStore>,
    ExpenseId(id): ExpenseId,
) -> ApiResult<Json<Expense>> {
    with_store(&store, move |s| s.get_by_id(id))
        .await?
        .map(Json)
        .ok_or_else(ApiError::expense_not_found)
}

/// DELETE /expenses/:id
async fn delete_expense(
    State(store): State<ExpenseStore>,
    ExpenseId(id): ExpenseId,
) -> ApiResult<impl IntoResponse> {
    if !with_store(&store, move |s| s.delete(id)).await? {
        return Err(ApiError::expense_not_found());
    }
    info!(id, "Expense deleted");

    Ok(Json(MessageResponse {
        message: "Expense deleted successfully",
    }))
}

/// PUT /expenses/:id - Replace every mutable field
async fn update_expense(
    State(store): State<ExpenseStore>,
    ExpenseId(id): ExpenseId,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let expense = parse_body(body)?;

    if !with_store(&store, move |s| s.update(id, &expense)).await? {
        return Err(ApiError::expense_not_found());
    }
    info!(id, "Expense updated");

    Ok(Json(MessageResponse {
        message: "Expense updated successfully",
    }))
}

/// GET /expenses/category/total
async fn total_spending(State(store): State<ExpenseStore>) -> ApiResult<impl IntoResponse> {
    let total_spending = with_store(&store, |s| s.total()).await?;
    Ok(Json(TotalResponse { total_spending }))
}

/// GET /expenses/category/:category - Exact, case-sensitive match
async fn expenses_by_category(
    State(store): State<ExpenseStore>,
    Path(category): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let lookup = category.clone();
    let expenses = with_store(&store, move |s| s.list_by_category(&lookup)).await?;

    Ok(Json(CategoryResponse {
        category,
        count: expenses.len(),
        expenses,
    }))
}

/// GET /expenses/summary
async fn summary(State(store): State<ExpenseStore>) -> ApiResult<Json<Summary>> {
    let summary = with_store(&store, |s| s.summary()).await?;
    Ok(Json(summary))
}

async fn fallback() -> ApiError {
    route_not_found()
}

/// Known path, unsupported verb
async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Build the application router.
///
/// `static_dir`, when set, is served under `/static` for the browser dashboard.
pub fn router(store: ExpenseStore, static_dir: Option<PathBuf>) -> Router {
    let mut app = Router::new()
        .route("/", get(home).fallback(method_not_allowed))
        .route(
            "/expenses",
            get(list_expenses)
                .post(create_expense)
                .fallback(method_not_allowed),
        )
        .route(
            "/expenses/summary",
            get(summary).fallback(method_not_allowed),
        )
        .route(
            "/expenses/category/total",
            get(total_spending).fallback(method_not_allowed),
        )
        .route(
            "/expenses/category/:category",
            get(expenses_by_category).fallback(method_not_allowed),
        )
        .route(
            "/expenses/:id",
            get(get_expense)
                .put(update_expense)
                .delete(delete_expense)
                .fallback(method_not_allowed),
        )
        .fallback(fallback)
        .with_state(store);

    if let Some(dir) = static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
