//! HTTP handlers for the Books module.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        OriginalUri, Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bookstore_db::DbPool;
use bookstore_http::error::AppError;
use serde::Deserialize;

use super::models::Book;
use super::service::{BookStoreDataService, StoreError};

/// Per-module state: only the pool handle. Handlers build their own
/// [`BookStoreDataService`] for the duration of a request.
#[derive(Clone)]
pub struct BooksState {
    pub db: DbPool,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub term: String,
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => AppError::not_found(format!("book {id} not found")),
            StoreError::Database(err) => AppError::Internal(err.into()),
        }
    }
}

pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/", get(list_books).post(add_book))
        .route("/search", get(search_books))
        .route("/authors", get(list_authors))
        .route("/health", get(health_check))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .with_state(state)
}

fn validated(book: Book) -> Result<Book, AppError> {
    book.validate().map_err(|violations| {
        let details = violations
            .iter()
            .map(|violation| serde_json::json!({"field": violation.field, "error": violation.error}))
            .collect();
        AppError::validation(details, "book failed validation")
    })?;
    Ok(book)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "books module is healthy"
}

async fn list_books(State(state): State<BooksState>) -> Result<Json<Vec<Book>>, AppError> {
    let books = BookStoreDataService::new(&state.db).list_all().await?;
    Ok(Json(books))
}

async fn get_book(
    State(state): State<BooksState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Book>, AppError> {
    let Path(id) = id?;
    let book = BookStoreDataService::new(&state.db).get_by_id(id).await?;
    Ok(Json(book))
}

async fn search_books(
    State(state): State<BooksState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<Book>>, AppError> {
    let Query(params) = params?;
    let books = BookStoreDataService::new(&state.db)
        .search(&params.term)
        .await?;
    Ok(Json(books))
}

async fn list_authors(State(state): State<BooksState>) -> Result<Json<Vec<String>>, AppError> {
    let books = BookStoreDataService::new(&state.db).list_all().await?;
    Ok(Json(BookStoreDataService::distinct_authors(&books)))
}

async fn add_book(
    State(state): State<BooksState>,
    OriginalUri(uri): OriginalUri,
    payload: Result<Json<Book>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(book) = payload?;
    let book = validated(book)?;
    let created = BookStoreDataService::new(&state.db).add(&book).await?;

    let location = format!("{}/{}", uri.path().trim_end_matches('/'), created.id);
    tracing::info!(book_id = created.id, %location, "book created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(created),
    ))
}

async fn update_book(
    State(state): State<BooksState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<Book>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    let Json(book) = payload?;

    if book.id != id {
        return Err(AppError::bad_request(format!(
            "path id {id} does not match body id {}",
            book.id
        )));
    }
    let book = validated(book)?;

    BookStoreDataService::new(&state.db).update(&book).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_book(
    State(state): State<BooksState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    BookStoreDataService::new(&state.db).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
