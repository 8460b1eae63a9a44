use crate::presentation::auth::{login, register};
use crate::presentation::books::{
    create_book, delete_book, get_book, get_cover, list_books, new_book_form, update_book,
};
use crate::presentation::handlers::{health_check, json_config};
use actix_web::web;

/// JSON body limit used when no cover size is configured.
pub const DEFAULT_JSON_LIMIT: usize = 4 * 1024 * 1024;

/// Registers every `/api` route with a JSON body limit of `json_limit` bytes.
/// `/books/new` must precede `/books/{id}`.
pub fn configure(json_limit: usize) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.service(
            web::scope("/api")
                .app_data(json_config(json_limit))
                .route("/health", web::get().to(health_check))
                .route("/auth/register", web::post().to(register))
                .route("/auth/login", web::post().to(login))
                .route("/books", web::get().to(list_books))
                .route("/books", web::post().to(create_book))
                .route("/books/new", web::get().to(new_book_form))
                .route("/books/{id}", web::get().to(get_book))
                .route("/books/{id}", web::put().to(update_book))
                .route("/books/{id}", web::delete().to(delete_book))
                .route("/books/{id}/cover", web::get().to(get_cover)),
        );
    }
}
