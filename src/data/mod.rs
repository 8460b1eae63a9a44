pub mod book_repository;
pub mod cover_storage;
pub mod user_repository;
