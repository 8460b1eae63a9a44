pub mod auth_service;
pub mod book_service;
