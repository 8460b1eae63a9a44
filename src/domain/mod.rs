pub mod book;
pub mod cover;
pub mod error;
pub mod policy;
pub mod price;
pub mod repository;
pub mod user;
