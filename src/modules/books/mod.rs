pub mod models;
pub mod routes;
pub mod service;

use async_trait::async_trait;
use bookstore_kernel::{InitCtx, Migration, Module};
use axum::Router;
use serde_json::json;
use utoipa::PartialSchema;

/// Books catalog module: CRUD plus search over the `books` table
pub struct BooksModule;

impl BooksModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        routes::router(routes::BooksState {
            db: ctx.db.clone(),
        })
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error_response = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let book_response = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/Book" }
                    }
                }
            })
        };
        let book_list = json!({
            "description": "List of books",
            "content": {
                "application/json": {
                    "schema": {
                        "type": "array",
                        "items": { "$ref": "#/components/schemas/Book" }
                    }
                }
            }
        });
        let book_body = json!({
            "required": true,
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/Book" }
                }
            }
        });
        let id_param = json!({
            "name": "id",
            "in": "path",
            "required": true,
            "schema": { "type": "integer", "format": "int64" }
        });

        let book_schema = serde_json::to_value(models::Book::schema()).ok()?;

        Some(json!({
            "paths": {
                "": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "responses": { "200": book_list }
                    },
                    "post": {
                        "summary": "Add a book",
                        "tags": ["Books"],
                        "requestBody": book_body,
                        "responses": {
                            "201": book_response("Created book; Location points at the new record"),
                            "400": error_response("Validation error")
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a book by id",
                        "tags": ["Books"],
                        "parameters": [id_param],
                        "responses": {
                            "200": book_response("The book"),
                            "404": error_response("Book not found")
                        }
                    },
                    "put": {
                        "summary": "Replace a book",
                        "tags": ["Books"],
                        "parameters": [id_param],
                        "requestBody": book_body,
                        "responses": {
                            "204": { "description": "Updated" },
                            "400": error_response("Validation error or id mismatch"),
                            "404": error_response("Book not found")
                        }
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "parameters": [id_param],
                        "responses": {
                            "204": { "description": "Deleted" },
                            "404": error_response("Book not found")
                        }
                    }
                },
                "/search": {
                    "get": {
                        "summary": "Search books by title or author substring",
                        "tags": ["Books"],
                        "parameters": [{
                            "name": "term",
                            "in": "query",
                            "required": true,
                            "schema": { "type": "string" }
                        }],
                        "responses": {
                            "200": book_list,
                            "400": error_response("Missing search term")
                        }
                    }
                },
                "/authors": {
                    "get": {
                        "summary": "Distinct author names",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "Author names",
                                "content": {
                                    "application/json": {
                                        "schema": { "type": "array", "items": { "type": "string" } }
                                    }
                                }
                            }
                        }
                    }
                },
                "/health": {
                    "get": {
                        "summary": "Books health check",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": { "text/plain": { "schema": { "type": "string" } } }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": book_schema
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE IF NOT EXISTS books (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    title       TEXT    NOT NULL CHECK (length(title) <= 100),
                    author      TEXT    NOT NULL CHECK (length(author) <= 100),
                    no_of_pages INTEGER NOT NULL CHECK (no_of_pages >= 1),
                    language    TEXT    NOT NULL CHECK (length(language) <= 50),
                    category    TEXT    NOT NULL CHECK (length(category) <= 50),
                    price       REAL    NOT NULL CHECK (price >= 0),
                    image_url   TEXT    NOT NULL
                );
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_every_route() {
        let spec = BooksModule::new().openapi().unwrap();
        for path in ["", "/{id}", "/search", "/authors", "/health"] {
            assert!(spec["paths"][path].is_object(), "missing {path}");
        }
        let book = &spec["components"]["schemas"]["Book"];
        assert!(book["properties"]["noOfPages"].is_object());
        assert!(book["properties"]["imageUrl"].is_object());
    }

    #[test]
    fn single_initial_migration() {
        let migrations = BooksModule::new().migrations();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].id, "001_init");
    }
}
