use crate::domain::book::{Book, BookChanges, BookForm, BookPatch, NewBook, validate_title};
use crate::domain::cover::{DEFAULT_MAX_COVER_BYTES, ImageKind, validate_cover};
use crate::domain::error::DomainError;
use crate::domain::policy::{BookAction, Capabilities, authorize};
use crate::domain::price::parse_price;
use crate::domain::repository::{BookRepository, CoverStorage};
use crate::domain::user::User;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Books visible to the actor plus the write actions it may offer.
#[derive(Debug)]
pub struct BookListing {
    pub books: Vec<Book>,
    pub permissions: Capabilities,
}

pub struct BookService<R: BookRepository, S: CoverStorage> {
    repository: Arc<R>,
    covers: Arc<S>,
    max_cover_bytes: usize,
}

impl<R: BookRepository, S: CoverStorage> BookService<R, S> {
    pub fn new(repository: Arc<R>, covers: Arc<S>) -> Self {
        Self {
            repository,
            covers,
            max_cover_bytes: DEFAULT_MAX_COVER_BYTES,
        }
    }

    pub fn with_max_cover_bytes(mut self, max_cover_bytes: usize) -> Self {
        self.max_cover_bytes = max_cover_bytes;
        self
    }

    /// Policy check for callers that must reject before doing their own work.
    pub fn authorize(&self, actor: &User, action: BookAction) -> Result<()> {
        authorize(&actor.roles(), action)?;
        Ok(())
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.id))]
    pub async fn list(&self, actor: &User) -> Result<BookListing> {
        let roles = actor.roles();
        authorize(&roles, BookAction::List)?;
        let books = self.repository.find_all().await?;
        debug!(count = books.len(), "Books listed");
        Ok(BookListing {
            books,
            permissions: Capabilities::for_roles(&roles),
        })
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.id))]
    pub async fn view(&self, actor: &User, id: u32) -> Result<Book> {
        authorize(&actor.roles(), BookAction::View)?;
        self.find(id).await
    }

    /// Blank creation form; only administrators may open it.
    pub fn new_form(&self, actor: &User) -> Result<BookForm> {
        authorize(&actor.roles(), BookAction::Create)?;
        Ok(BookForm {
            title: String::new(),
            price: String::new(),
            cover: None,
        })
    }

    #[instrument(skip(self, actor, form), fields(user_id = %actor.id, with_cover = form.cover.is_some()))]
    pub async fn create(&self, actor: &User, form: BookForm) -> Result<Book> {
        authorize(&actor.roles(), BookAction::Create)?;

        let title = validate_title(&form.title)?;
        let price_in_cents = parse_price(&form.price)?;
        let cover_kind = match &form.cover {
            Some(upload) => Some(validate_cover(upload, self.max_cover_bytes)?),
            None => None,
        };

        let cover_path = match (&form.cover, cover_kind) {
            (Some(upload), Some(kind)) => Some(self.covers.store(upload, kind).await?),
            _ => None,
        };

        let new_book = NewBook {
            title,
            price_in_cents,
            cover_path: cover_path.clone(),
        };
        let book = match self.repository.create(new_book).await {
            Ok(book) => book,
            Err(e) => {
                if let Some(key) = &cover_path {
                    self.discard_cover(key).await;
                }
                return Err(e);
            }
        };

        info!(
            book_id = book.id,
            price_in_cents = book.price_in_cents.inner(),
            "Book created"
        );
        Ok(book)
    }

    #[instrument(skip(self, actor, patch), fields(user_id = %actor.id, with_cover = patch.cover.is_some()))]
    pub async fn edit(&self, actor: &User, id: u32, patch: BookPatch) -> Result<Book> {
        authorize(&actor.roles(), BookAction::Edit)?;
        self.find(id).await?;

        let title = patch.title.as_deref().map(validate_title).transpose()?;
        let price_in_cents = patch.price.as_deref().map(parse_price).transpose()?;
        let cover_kind = match &patch.cover {
            Some(upload) => Some(validate_cover(upload, self.max_cover_bytes)?),
            None => None,
        };

        let cover_path = match (&patch.cover, cover_kind) {
            (Some(upload), Some(kind)) => Some(self.covers.store(upload, kind).await?),
            _ => None,
        };

        let changes = BookChanges {
            title,
            price_in_cents,
            cover_path: cover_path.clone(),
        };
        let revision = match self.repository.update(id, changes).await {
            Ok(Some(revision)) => revision,
            failed => {
                if let Some(key) = &cover_path {
                    self.discard_cover(key).await;
                }
                return match failed {
                    Err(e) => Err(e),
                    Ok(_) => Err(DomainError::BookNotFound(id).into()),
                };
            }
        };

        // The replaced file is unreferenced once the new path has committed.
        if cover_path.is_some() {
            if let Some(old) = revision.previous.cover_path.as_deref() {
                if revision.current.cover_path.as_deref() != Some(old) {
                    self.discard_cover(old).await;
                }
            }
        }

        info!(book_id = id, "Book updated");
        Ok(revision.current)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.id))]
    pub async fn delete(&self, actor: &User, id: u32) -> Result<Book> {
        authorize(&actor.roles(), BookAction::Delete)?;

        let book = self
            .repository
            .delete(id)
            .await?
            .ok_or(DomainError::BookNotFound(id))?;

        if let Some(key) = &book.cover_path {
            self.discard_cover(key).await;
        }

        info!(book_id = id, "Book deleted");
        Ok(book)
    }

    /// Cover bytes and their image type.
    #[instrument(skip(self, actor), fields(user_id = %actor.id))]
    pub async fn cover(&self, actor: &User, id: u32) -> Result<(Vec<u8>, ImageKind)> {
        authorize(&actor.roles(), BookAction::View)?;
        let book = self.find(id).await?;
        let key = book
            .cover_path
            .ok_or_else(|| DomainError::NotFound(format!("Book {} has no cover", id)))?;

        let bytes = self.covers.read(&key).await?;
        let kind = ImageKind::detect(&bytes)
            .or_else(|| {
                Path::new(&key)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(ImageKind::from_extension)
            })
            .ok_or_else(|| DomainError::Storage(format!("Cover '{}' is not a known image type", key)))?;
        Ok((bytes, kind))
    }

    async fn find(&self, id: u32) -> Result<Book> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::BookNotFound(id).into())
    }

    async fn discard_cover(&self, key: &str) {
        if let Err(e) = self.covers.remove(key).await {
            warn!(key = key, error = %e, "Failed to remove cover file");
        }
    }
}
