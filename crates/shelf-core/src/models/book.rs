//! Textbook listing model
//!
//! A typed view over [`Record`] for the exchange listings the CLI works with.
//! The sync engine itself only ever sees records.

use serde::{Deserialize, Serialize};

use super::record::{FieldValue, Record, SyncStatus};

pub const TITLE: &str = "title";
pub const AUTHOR: &str = "author";
pub const PRICE: &str = "price";
pub const CATEGORY: &str = "category";
pub const DESCRIPTION: &str = "description";
pub const IMAGE_URL: &str = "imageUrl";

/// A textbook offered for exchange.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub price: f64,
    pub category: String,
    pub description: String,
    pub image_url: String,
    pub owner_id: String,
    pub sync_status: SyncStatus,
}

impl Book {
    /// Create an unassigned listing
    #[must_use]
    pub fn new(title: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            owner_id: owner_id.into(),
            ..Self::default()
        }
    }

    /// Price formatted for display, e.g. `$12.50`
    pub fn price_label(&self) -> String {
        format!("${:.2}", self.price)
    }
}

impl From<Book> for Record {
    fn from(book: Book) -> Self {
        Self::new(book.owner_id)
            .with_id(book.id)
            .with_status(book.sync_status)
            .with_field(TITLE, book.title)
            .with_field(AUTHOR, book.author)
            .with_field(PRICE, book.price)
            .with_field(CATEGORY, book.category)
            .with_field(DESCRIPTION, book.description)
            .with_field(IMAGE_URL, book.image_url)
    }
}

/// Missing or mistyped fields fall back to empty values.
impl From<&Record> for Book {
    fn from(record: &Record) -> Self {
        let text = |name: &str| {
            record
                .field(name)
                .and_then(FieldValue::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            id: record.id.clone(),
            title: text(TITLE),
            author: record
                .field(AUTHOR)
                .and_then(FieldValue::as_str)
                .map(str::to_string),
            price: record
                .field(PRICE)
                .and_then(FieldValue::as_f64)
                .unwrap_or_default(),
            category: text(CATEGORY),
            description: text(DESCRIPTION),
            image_url: text(IMAGE_URL),
            owner_id: record.owner_id.clone(),
            sync_status: record.sync_status,
        }
    }
}
