use crate::domain::book::{Book, BookChanges, BookRevision, NewBook};
use crate::domain::repository::BookRepository;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace};

#[derive(Default)]
struct BookStore {
    next_id: u32,
    // Ids are handed out in increasing order, so key order is insertion order.
    books: BTreeMap<u32, Book>,
}

#[derive(Clone)]
pub struct InMemoryBookRepository {
    storage: Arc<RwLock<BookStore>>,
}

impl InMemoryBookRepository {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(BookStore {
                next_id: 1,
                books: BTreeMap::new(),
            })),
        }
    }
}

impl Default for InMemoryBookRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookRepository for InMemoryBookRepository {
    #[instrument(skip(self, book), fields(title = %book.title))]
    async fn create(&self, book: NewBook) -> Result<Book> {
        trace!("Acquiring write lock for book storage");
        let mut storage = self.storage.write().await;
        let id = storage.next_id;
        storage.next_id = id
            .checked_add(1)
            .ok_or_else(|| anyhow::anyhow!("Book id space exhausted"))?;

        let now = Utc::now();
        let book = Book {
            id,
            title: book.title,
            price_in_cents: book.price_in_cents,
            cover_path: book.cover_path,
            created_at: now,
            updated_at: now,
        };
        storage.books.insert(id, book.clone());
        debug!(book_id = id, "Book saved to memory storage");
        Ok(book)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: u32) -> Result<Option<Book>> {
        let storage = self.storage.read().await;
        Ok(storage.books.get(&id).cloned())
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Book>> {
        let storage = self.storage.read().await;
        Ok(storage.books.values().cloned().collect())
    }

    #[instrument(skip(self, changes))]
    async fn update(&self, id: u32, changes: BookChanges) -> Result<Option<BookRevision>> {
        trace!("Acquiring write lock for book storage");
        let mut storage = self.storage.write().await;
        let Some(book) = storage.books.get_mut(&id) else {
            trace!(book_id = id, "Book not found in storage");
            return Ok(None);
        };

        let previous = book.clone();
        if let Some(title) = changes.title {
            book.title = title;
        }
        if let Some(price) = changes.price_in_cents {
            book.price_in_cents = price;
        }
        if let Some(cover_path) = changes.cover_path {
            book.cover_path = Some(cover_path);
        }
        book.updated_at = Utc::now();

        debug!(book_id = id, "Book updated in memory storage");
        Ok(Some(BookRevision {
            previous,
            current: book.clone(),
        }))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: u32) -> Result<Option<Book>> {
        let mut storage = self.storage.write().await;
        let removed = storage.books.remove(&id);
        if removed.is_some() {
            debug!(book_id = id, "Book removed from memory storage");
        }
        Ok(removed)
    }
}
