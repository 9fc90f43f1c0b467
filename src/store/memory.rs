// In-process store for tests and local runs without Postgres

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::models::{Category, Page, PageStatus, PageSummary};
use super::{StoreError, WikiStore};

const UNREACHABLE: &str = "connection refused: database unreachable";

/// Holds rows in memory and answers with the same filtering, ordering and
/// limits as the Postgres queries.
#[derive(Default)]
pub struct MemoryWikiStore {
    pages: RwLock<Vec<Page>>,
    categories: RwLock<Vec<Category>>,
    unreachable: AtomicBool,
}

impl MemoryWikiStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(pages: Vec<Page>, categories: Vec<Category>) -> Self {
        Self {
            pages: RwLock::new(pages),
            categories: RwLock::new(categories),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Make every call fail as if the database connection dropped
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Query(UNREACHABLE.to_string()));
        }
        Ok(())
    }
}

fn poisoned() -> StoreError {
    StoreError::Query("store lock poisoned".to_string())
}

#[async_trait]
impl WikiStore for MemoryWikiStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_reachable()
    }

    async fn published_pages(&self, limit: i64) -> Result<Vec<PageSummary>, StoreError> {
        self.check_reachable()?;
        let pages = self.pages.read().map_err(|_| poisoned())?;
        let mut published: Vec<&Page> = pages
            .iter()
            .filter(|p| p.status == PageStatus::Published)
            .collect();
        published.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(published
            .into_iter()
            .take(limit)
            .map(PageSummary::from)
            .collect())
    }

    async fn published_page(&self, slug: &str) -> Result<Option<Page>, StoreError> {
        self.check_reachable()?;
        let pages = self.pages.read().map_err(|_| poisoned())?;
        Ok(pages
            .iter()
            .find(|p| p.slug == slug && p.status == PageStatus::Published)
            .cloned())
    }

    async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        self.check_reachable()?;
        let mut categories = self.categories.read().map_err(|_| poisoned())?.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::store::PAGE_LIST_LIMIT;

    #[tokio::test]
    async fn test_published_pages_limit_and_order() {
        let store = populated_store();
        let pages = store.published_pages(PAGE_LIST_LIMIT).await.unwrap();
        assert_eq!(pages.len(), 50);
        assert!(pages.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        // newest published page is id 79 (80 is a draft)
        assert_eq!(pages[0].id, 79);
        assert!(pages.iter().all(|p| p.id % 4 != 0));
    }

    #[tokio::test]
    async fn test_draft_page_is_invisible() {
        let store = populated_store();
        assert!(store.published_page("page-4").await.unwrap().is_none());
        assert!(store.published_page("page-5").await.unwrap().is_some());
        assert!(store.published_page("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_categories_sorted_by_name() {
        let store = populated_store();
        let names: Vec<String> = store
            .categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Art", "History", "Science"]);
    }

    #[tokio::test]
    async fn test_unreachable_fails_every_call() {
        let store = populated_store();
        store.set_unreachable(true);
        assert!(store.ping().await.is_err());
        assert!(store.published_pages(10).await.is_err());
        assert!(store.categories().await.is_err());

        store.set_unreachable(false);
        assert!(store.ping().await.is_ok());
    }
}
