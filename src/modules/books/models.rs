use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

pub const TITLE_MAX_LEN: usize = 100;
pub const AUTHOR_MAX_LEN: usize = 100;
pub const LANGUAGE_MAX_LEN: usize = 50;
pub const CATEGORY_MAX_LEN: usize = 50;

const IMAGE_URL_SCHEMES: &[&str] = &["http", "https", "ftp"];

/// A catalog entry. Serialized with camelCase keys, stored with snake_case columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Store-assigned identifier; ignored on create
    #[serde(default)]
    pub id: i64,
    /// Title of the book
    pub title: String,
    /// Author of the book
    pub author: String,
    /// Page count, at least 1
    pub no_of_pages: i32,
    /// Language the book is written in
    pub language: String,
    /// Catalog category
    pub category: String,
    /// Price, zero or greater
    pub price: f64,
    /// Absolute http(s) or ftp URL of the cover image
    pub image_url: String,
}

/// A single failed constraint, reported under the JSON name of the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub error: String,
}

impl FieldViolation {
    fn new(field: &'static str, error: impl Into<String>) -> Self {
        Self {
            field,
            error: error.into(),
        }
    }
}

impl Book {
    /// Check every field constraint, collecting all violations.
    pub fn validate(&self) -> Result<(), Vec<FieldViolation>> {
        let mut violations = Vec::new();

        check_text(&mut violations, "title", &self.title, TITLE_MAX_LEN);
        check_text(&mut violations, "author", &self.author, AUTHOR_MAX_LEN);
        check_text(&mut violations, "language", &self.language, LANGUAGE_MAX_LEN);
        check_text(&mut violations, "category", &self.category, CATEGORY_MAX_LEN);

        if self.no_of_pages < 1 {
            violations.push(FieldViolation::new("noOfPages", "must be at least 1"));
        }

        if !self.price.is_finite() || self.price < 0.0 {
            violations.push(FieldViolation::new("price", "must be zero or greater"));
        }

        if self.image_url.trim().is_empty() {
            violations.push(FieldViolation::new("imageUrl", "is required"));
        } else if !is_valid_image_url(&self.image_url) {
            violations.push(FieldViolation::new(
                "imageUrl",
                "must be an absolute http, https or ftp URL",
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn check_text(violations: &mut Vec<FieldViolation>, field: &'static str, value: &str, max: usize) {
    if value.trim().is_empty() {
        violations.push(FieldViolation::new(field, "is required"));
    } else if value.chars().count() > max {
        violations.push(FieldViolation::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
}

fn is_valid_image_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => IMAGE_URL_SCHEMES.contains(&url.scheme()) && url.host().is_some(),
        Err(_) => false,
    }
}
