use crate::domain::book::{Book, BookForm, BookPatch};
use crate::domain::cover::CoverUpload;
use crate::domain::error::DomainError;
use crate::domain::policy::{BookAction, Capabilities};
use crate::domain::price::format_price;
use crate::domain::user::User;
use crate::presentation::handlers::{ApiError, AppState};
use crate::presentation::middleware::AuthenticatedUser;
use actix_web::http::header;
use actix_web::{HttpResponse, web};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

/// Where clients go after a successful write.
pub const BOOKS_LOCATION: &str = "/api/books";

#[derive(Debug, Serialize, Deserialize)]
pub struct BookView {
    pub id: u32,
    pub title: String,
    pub price_in_cents: u64,
    pub price: String,
    pub cover_path: Option<String>,
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookView {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            price: format_price(book.price_in_cents),
            price_in_cents: book.price_in_cents.inner(),
            cover_url: book
                .cover_path
                .as_ref()
                .map(|_| format!("{}/{}/cover", BOOKS_LOCATION, book.id)),
            cover_path: book.cover_path,
            title: book.title,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookListResponse {
    pub books: Vec<BookView>,
    pub permissions: Capabilities,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookFormResponse {
    pub title: String,
    pub price: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: u32,
}

/// Cover file as sent by clients: base64 content, optionally as a data URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverPayload {
    pub file_name: String,
    pub data: String,
}

impl CoverPayload {
    fn decode(self) -> Result<CoverUpload, DomainError> {
        let encoded = match self.data.split_once(";base64,") {
            Some((_, encoded)) => encoded,
            None => self.data.as_str(),
        };
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| DomainError::validation("cover", "Cover data is not valid base64"))?;
        Ok(CoverUpload {
            file_name: self.file_name,
            bytes,
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateBookRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub cover: Option<CoverPayload>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateBookRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub cover: Option<CoverPayload>,
}

async fn actor(state: &AppState, auth: &AuthenticatedUser) -> Result<User, ApiError> {
    Ok(state.auth_service.current_user(&auth.user_id).await?)
}

fn decode_cover(cover: Option<CoverPayload>) -> Result<Option<CoverUpload>, ApiError> {
    cover
        .map(CoverPayload::decode)
        .transpose()
        .map_err(|e| ApiError::from(anyhow::Error::from(e)))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn list_books(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let actor = actor(&state, &auth).await?;
    let listing = state.books.list(&actor).await?;
    info!(count = listing.books.len(), "Books listed");
    Ok(HttpResponse::Ok().json(BookListResponse {
        books: listing.books.into_iter().map(BookView::from).collect(),
        permissions: listing.permissions,
    }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn new_book_form(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let actor = actor(&state, &auth).await?;
    let form = state.books.new_form(&actor)?;
    Ok(HttpResponse::Ok().json(BookFormResponse {
        title: form.title,
        price: form.price,
    }))
}

#[instrument(skip(state, auth, req), fields(user_id = %auth.user_id, book_id))]
pub async fn create_book(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    req: web::Json<CreateBookRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = actor(&state, &auth).await?;
    let req = req.into_inner();
    state.books.authorize(&actor, BookAction::Create)?;
    info!(title = %req.title, with_cover = req.cover.is_some(), "Creating book");

    let form = BookForm {
        title: req.title,
        price: req.price,
        cover: decode_cover(req.cover)?,
    };
    let book = state.books.create(&actor, form).await.map_err(|e| {
        error!(error = %e, "Failed to create book");
        e
    })?;

    tracing::Span::current().record("book_id", book.id);
    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, BOOKS_LOCATION))
        .json(BookView::from(book)))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id, book_id = %*path))]
pub async fn get_book(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<u32>,
) -> Result<HttpResponse, ApiError> {
    let actor = actor(&state, &auth).await?;
    let book = state.books.view(&actor, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(BookView::from(book)))
}

#[instrument(skip(state, auth, req), fields(user_id = %auth.user_id, book_id = %*path))]
pub async fn update_book(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<u32>,
    req: web::Json<UpdateBookRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = actor(&state, &auth).await?;
    let book_id = path.into_inner();
    let req = req.into_inner();
    state.books.authorize(&actor, BookAction::Edit)?;

    let patch = BookPatch {
        title: req.title,
        price: req.price,
        cover: decode_cover(req.cover)?,
    };
    let book = state.books.edit(&actor, book_id, patch).await.map_err(|e| {
        error!(book_id = book_id, error = %e, "Failed to update book");
        e
    })?;

    Ok(HttpResponse::Ok()
        .insert_header((header::LOCATION, BOOKS_LOCATION))
        .json(BookView::from(book)))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id, book_id = %*path))]
pub async fn delete_book(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<u32>,
) -> Result<HttpResponse, ApiError> {
    let actor = actor(&state, &auth).await?;
    let book = state.books.delete(&actor, path.into_inner()).await?;
    Ok(HttpResponse::Ok()
        .insert_header((header::LOCATION, BOOKS_LOCATION))
        .json(DeleteResponse { deleted: book.id }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id, book_id = %*path))]
pub async fn get_cover(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<u32>,
) -> Result<HttpResponse, ApiError> {
    let actor = actor(&state, &auth).await?;
    let (bytes, kind) = state.books.cover(&actor, path.into_inner()).await?;
    Ok(HttpResponse::Ok().content_type(kind.content_type()).body(bytes))
}
