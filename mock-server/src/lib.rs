//! In-memory todo API used as the backend for the typed query hooks.
//!
//! Read-only: the data set is seeded at construction time and the server
//! only answers the two queries the hooks issue (paged list and lookup by
//! slug). Errors use the `{statusCode, message, error}` body shape the
//! client's transport error understands.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Todo {
    pub fn new(slug: &str, title: &str, description: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            title: title.to_string(),
            completed: false,
            description: Some(description.to_string()),
        }
    }

    fn summary(&self) -> Self {
        Self {
            description: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    #[serde(default)]
    pub verbose: bool,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    10
}

/// Error payload returned for every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub error: String,
}

pub struct ApiFailure(StatusCode, String);

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status_code: self.0.as_u16(),
            message: self.1,
            error: self.0.canonical_reason().unwrap_or("Error").to_string(),
        };
        (self.0, Json(body)).into_response()
    }
}

/// Todos keyed by slug so listing order is stable. Never written after
/// construction.
pub type Db = Arc<BTreeMap<String, Todo>>;

pub fn app() -> Router {
    app_with(seed())
}

pub fn app_with(todos: Vec<Todo>) -> Router {
    let db: Db = Arc::new(todos.into_iter().map(|t| (t.slug.clone(), t)).collect());
    Router::new()
        .route("/todos", get(list_todos))
        .route("/todos/{slug}", get(get_todo))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub fn seed() -> Vec<Todo> {
    vec![
        Todo::new("buy-milk", "Buy milk", "Two litres, semi-skimmed."),
        Todo::new("call-mom", "Call mom", "Sunday afternoon."),
        Todo::new("fix-bike", "Fix bike", "Rear brake pads are worn."),
        Todo::new("pay-rent", "Pay rent", "Due on the first."),
        Todo::new("walk-dog", "Walk dog", "Around the park, twice."),
    ]
}

async fn list_todos(
    State(db): State<Db>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Todo>>, ApiFailure> {
    if query.page == 0 || query.per_page == 0 {
        return Err(ApiFailure(
            StatusCode::BAD_REQUEST,
            "page and per_page start at 1".to_string(),
        ));
    }
    let offset = (query.page - 1).checked_mul(query.per_page).ok_or_else(|| {
        ApiFailure(
            StatusCode::BAD_REQUEST,
            format!("page {} is out of range", query.page),
        )
    })?;
    tracing::debug!(page = query.page, per_page = query.per_page, "list todos");
    let page = db
        .values()
        .skip(offset)
        .take(query.per_page)
        .map(Todo::summary)
        .collect();
    Ok(Json(page))
}

async fn get_todo(
    State(db): State<Db>,
    Path(slug): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Result<Json<Todo>, ApiFailure> {
    tracing::debug!(%slug, verbose = query.verbose, "get todo");
    let todo = db.get(&slug).ok_or_else(|| {
        ApiFailure(StatusCode::NOT_FOUND, format!("todo '{slug}' does not exist"))
    })?;
    Ok(Json(if query.verbose { todo.clone() } else { todo.summary() }))
}
