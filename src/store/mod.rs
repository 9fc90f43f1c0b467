//! Wiki storage seam
//!
//! The API layer talks to a [`WikiStore`]; `PgWikiStore` backs it with
//! Postgres, `MemoryWikiStore` with in-process rows.

mod memory;
mod models;
mod postgres;

use async_trait::async_trait;

pub use memory::MemoryWikiStore;
pub use models::{Category, Page, PageStatus, PageSummary};
pub use postgres::PgWikiStore;

#[cfg(test)]
pub use memory::fixtures;

/// Most pages a listing ever returns
pub const PAGE_LIST_LIMIT: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The database could not be reached or the query failed
    #[error("{0}")]
    Query(String),
    /// A row held a value the model cannot represent
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Query(err.to_string())
    }
}

/// Read-only access to pages and categories.
///
/// Every method is a direct pass-through read; implementations hold no
/// derived state.
#[async_trait]
pub trait WikiStore: Send + Sync {
    /// Round-trip to the backing store
    async fn ping(&self) -> Result<(), StoreError>;

    /// Published pages, newest first, at most `limit` of them
    async fn published_pages(&self, limit: i64) -> Result<Vec<PageSummary>, StoreError>;

    /// A published page by slug
    async fn published_page(&self, slug: &str) -> Result<Option<Page>, StoreError>;

    /// All categories ordered by name
    async fn categories(&self) -> Result<Vec<Category>, StoreError>;
}
