use crate::domain::cover::CoverUpload;
use crate::domain::error::DomainError;
use crate::domain::price::PriceInCents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Book {
    pub id: u32,
    pub title: String,
    pub price_in_cents: PriceInCents,
    pub cover_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated book that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub price_in_cents: PriceInCents,
    pub cover_path: Option<String>,
}

/// Partial update applied by the repository; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct BookChanges {
    pub title: Option<String>,
    pub price_in_cents: Option<PriceInCents>,
    pub cover_path: Option<String>,
}

impl BookChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.price_in_cents.is_none() && self.cover_path.is_none()
    }
}

/// The stored record before and after an update.
#[derive(Debug, Clone)]
pub struct BookRevision {
    pub previous: Book,
    pub current: Book,
}

/// Creation input as submitted by a client. The price is still raw text.
#[derive(Debug, Clone)]
pub struct BookForm {
    pub title: String,
    pub price: String,
    pub cover: Option<CoverUpload>,
}

/// Edit input; absent fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct BookPatch {
    pub title: Option<String>,
    pub price: Option<String>,
    pub cover: Option<CoverUpload>,
}

pub fn validate_title(title: &str) -> Result<String, DomainError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("title", "Title cannot be empty"));
    }
    Ok(title.to_string())
}
