use crate::domain::book::{Book, BookChanges, BookRevision, NewBook};
use crate::domain::cover::{CoverUpload, ImageKind};
use crate::domain::user::User;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn create(&self, book: NewBook) -> Result<Book>;
    async fn find_by_id(&self, id: u32) -> Result<Option<Book>>;
    /// All books in insertion order.
    async fn find_all(&self) -> Result<Vec<Book>>;
    /// Applies `changes` atomically. `None` if the book does not exist.
    async fn update(&self, id: u32, changes: BookChanges) -> Result<Option<BookRevision>>;
    async fn delete(&self, id: u32) -> Result<Option<Book>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts or replaces by id. Fails with a `Validation` error on field
    /// `email` when another user already owns the email.
    async fn save_user(&self, user: User) -> Result<()>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>>;
}

/// Where cover images live. Keys are opaque to callers.
#[async_trait]
pub trait CoverStorage: Send + Sync {
    /// Writes the upload under a fresh key and returns that key.
    async fn store(&self, upload: &CoverUpload, kind: ImageKind) -> Result<String>;
    async fn read(&self, key: &str) -> Result<Vec<u8>>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> bool;
}
