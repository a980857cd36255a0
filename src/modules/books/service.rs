//! Data access for [`Book`] records.

use std::collections::HashSet;

use bookstore_db::DbPool;
use thiserror::Error;

use super::models::Book;

/// Outcome of a store operation other than success.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("book {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Book operations over a borrowed pool. Built per request; every method is a
/// single statement, so each one is atomic on its own.
pub struct BookStoreDataService<'a> {
    db: &'a DbPool,
}

impl<'a> BookStoreDataService<'a> {
    pub fn new(db: &'a DbPool) -> Self {
        Self { db }
    }

    pub async fn list_all(&self) -> StoreResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT id, title, author, no_of_pages, language, category, price, image_url
             FROM books ORDER BY id",
        )
        .fetch_all(self.db)
        .await?;
        Ok(books)
    }

    pub async fn get_by_id(&self, id: i64) -> StoreResult<Book> {
        sqlx::query_as::<_, Book>(
            "SELECT id, title, author, no_of_pages, language, category, price, image_url
             FROM books WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(self.db)
        .await?
        .ok_or(StoreError::NotFound(id))
    }

    /// Books whose title or author contains `term`. Matching is case-sensitive.
    pub async fn search(&self, term: &str) -> StoreResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT id, title, author, no_of_pages, language, category, price, image_url
             FROM books
             WHERE instr(title, ?1) > 0 OR instr(author, ?1) > 0
             ORDER BY id",
        )
        .bind(term)
        .fetch_all(self.db)
        .await?;
        Ok(books)
    }

    /// Insert `book`, ignoring its id, and return the stored record.
    pub async fn add(&self, book: &Book) -> StoreResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            "INSERT INTO books (title, author, no_of_pages, language, category, price, image_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING id, title, author, no_of_pages, language, category, price, image_url",
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.no_of_pages)
        .bind(&book.language)
        .bind(&book.category)
        .bind(book.price)
        .bind(&book.image_url)
        .fetch_one(self.db)
        .await?;

        tracing::debug!(book_id = created.id, "book added");
        Ok(created)
    }

    /// Overwrite every field of the record with `book.id`.
    pub async fn update(&self, book: &Book) -> StoreResult<Book> {
        let updated = sqlx::query_as::<_, Book>(
            "UPDATE books
             SET title = ?1, author = ?2, no_of_pages = ?3, language = ?4,
                 category = ?5, price = ?6, image_url = ?7
             WHERE id = ?8
             RETURNING id, title, author, no_of_pages, language, category, price, image_url",
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.no_of_pages)
        .bind(&book.language)
        .bind(&book.category)
        .bind(book.price)
        .bind(&book.image_url)
        .bind(book.id)
        .fetch_optional(self.db)
        .await?
        .ok_or(StoreError::NotFound(book.id))?;

        tracing::debug!(book_id = updated.id, "book updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?1")
            .bind(id)
            .execute(self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }

        tracing::debug!(book_id = id, "book deleted");
        Ok(())
    }

    /// Unique author names in first-seen order.
    pub fn distinct_authors(books: &[Book]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut authors = Vec::new();
        for book in books {
            if seen.insert(book.author.as_str()) {
                authors.push(book.author.clone());
            }
        }
        authors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::BooksModule;
    use bookstore_kernel::Module;

    async fn test_db() -> DbPool {
        let db = bookstore_db::connect("sqlite::memory:", 1).await.unwrap();
        let migrations: Vec<(String, bookstore_db::Migration)> = BooksModule::new()
            .migrations()
            .into_iter()
            .map(|migration| ("books".to_string(), migration))
            .collect();
        bookstore_db::run_migrations(&db, &migrations).await.unwrap();
        db
    }

    fn book(title: &str, author: &str) -> Book {
        Book {
            id: 0,
            title: title.to_string(),
            author: author.to_string(),
            no_of_pages: 300,
            language: "English".to_string(),
            category: "Fantasy".to_string(),
            price: 15.0,
            image_url: "https://covers.example.com/cover.jpg".to_string(),
        }
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let db = test_db().await;
        let service = BookStoreDataService::new(&db);

        let mut input = book("Dune", "Herbert");
        input.id = 999;
        let created = service.add(&input).await.unwrap();
        assert_ne!(created.id, 999);

        let fetched = service.get_by_id(created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(Book { id: 0, ..fetched }, book("Dune", "Herbert"));
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let db = test_db().await;
        let service = BookStoreDataService::new(&db);

        let first = service.add(&book("A", "X")).await.unwrap();
        let second = service.add(&book("B", "Y")).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(service.list_all().await.unwrap(), vec![first, second]);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let db = test_db().await;
        let service = BookStoreDataService::new(&db);

        assert!(matches!(
            service.get_by_id(42).await,
            Err(StoreError::NotFound(42))
        ));
    }

    #[tokio::test]
    async fn update_overwrites_every_field() {
        let db = test_db().await;
        let service = BookStoreDataService::new(&db);
        let created = service.add(&book("Original Book", "Original Author")).await.unwrap();

        let replacement = Book {
            id: created.id,
            title: "Updated Book".to_string(),
            author: "Updated Author".to_string(),
            no_of_pages: 10,
            language: "German".to_string(),
            category: "Poetry".to_string(),
            price: 12.5,
            image_url: "http://x/updated.jpg".to_string(),
        };
        let updated = service.update(&replacement).await.unwrap();

        assert_eq!(updated, replacement);
        assert_eq!(service.get_by_id(created.id).await.unwrap(), replacement);
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let db = test_db().await;
        let service = BookStoreDataService::new(&db);

        let mut ghost = book("Updated Book", "Updated Author");
        ghost.id = 1;
        assert!(matches!(
            service.update(&ghost).await,
            Err(StoreError::NotFound(1))
        ));
        assert!(service.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let db = test_db().await;
        let service = BookStoreDataService::new(&db);
        let created = service.add(&book("Test Book", "Test Author")).await.unwrap();

        service.delete(created.id).await.unwrap();

        assert!(matches!(
            service.get_by_id(created.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            service.delete(created.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn search_matches_title_or_author_substring() {
        let db = test_db().await;
        let service = BookStoreDataService::new(&db);

        let hobbit = service.add(&book("The Hobbit", "J.R.R. Tolkien")).await.unwrap();
        service.add(&book("Dune", "Frank Herbert")).await.unwrap();
        let essay = service
            .add(&book("Tolkien and the Critics", "Isaacs"))
            .await
            .unwrap();
        service.add(&book("tolkien lowercase", "Nobody")).await.unwrap();

        let found = service.search("Tolkien").await.unwrap();
        assert_eq!(found, vec![hobbit, essay]);

        assert!(service.search("Asimov").await.unwrap().is_empty());
        assert_eq!(service.search("").await.unwrap().len(), 4);
    }

    #[test]
    fn distinct_authors_deduplicates() {
        let books = vec![
            book("The Hobbit", "Tolkien"),
            book("Dune", "Herbert"),
            book("The Silmarillion", "Tolkien"),
            book("Children of Dune", "Herbert"),
            book("Foundation", "Asimov"),
        ];

        assert_eq!(
            BookStoreDataService::distinct_authors(&books),
            vec!["Tolkien", "Herbert", "Asimov"]
        );
        assert!(BookStoreDataService::distinct_authors(&[]).is_empty());
    }
}
