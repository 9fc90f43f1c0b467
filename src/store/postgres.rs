// Postgres-backed store over a lazily connected sqlx pool

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use super::models::{Category, Page, PageSummary};
use super::{StoreError, WikiStore};
use crate::config::DatabaseConfig;

const PING: &str = "SELECT 1";

const PUBLISHED_PAGES: &str = "\
    SELECT id, title, slug, summary, view_count, created_at \
    FROM pages \
    WHERE status = 'published' \
    ORDER BY created_at DESC \
    LIMIT $1";

const PUBLISHED_PAGE_BY_SLUG: &str = "\
    SELECT id, title, slug, summary, status, view_count, created_at \
    FROM pages \
    WHERE slug = $1 AND status = 'published'";

const CATEGORIES: &str = "\
    SELECT id, name, slug, description \
    FROM categories \
    ORDER BY name";

/// Raw `pages` row; `status` is text in the table
#[derive(sqlx::FromRow)]
struct PageRow {
    id: i32,
    title: String,
    slug: String,
    summary: Option<String>,
    status: String,
    view_count: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<PageRow> for Page {
    type Error = StoreError;

    fn try_from(row: PageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            summary: row.summary,
            status: row.status.parse()?,
            view_count: row.view_count,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PgWikiStore {
    pool: PgPool,
}

impl PgWikiStore {
    /// Build the pool without connecting. Connections open on first use, so
    /// the service starts (and reports itself unhealthy) while the database
    /// is down.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect_lazy(&config.url)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl WikiStore for PgWikiStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query(PING).execute(&self.pool).await?;
        Ok(())
    }

    async fn published_pages(&self, limit: i64) -> Result<Vec<PageSummary>, StoreError> {
        let rows = sqlx::query_as::<_, PageSummary>(PUBLISHED_PAGES)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn published_page(&self, slug: &str) -> Result<Option<Page>, StoreError> {
        let row = sqlx::query_as::<_, PageRow>(PUBLISHED_PAGE_BY_SLUG)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Page::try_from).transpose()
    }

    async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query_as::<_, Category>(CATEGORIES)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
