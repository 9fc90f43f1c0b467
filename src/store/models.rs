// Wiki data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Draft,
    Published,
}

impl PageStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            other => Err(StoreError::InvalidRow(format!("unknown page status '{other}'"))),
        }
    }
}

/// A full page row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub status: PageStatus,
    pub view_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Listing projection of a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PageSummary {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub view_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<&Page> for PageSummary {
    fn from(page: &Page) -> Self {
        Self {
            id: page.id,
            title: page.title.clone(),
            slug: page.slug.clone(),
            summary: page.summary.clone(),
            view_count: page.view_count,
            created_at: page.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!("published".parse::<PageStatus>(), Ok(PageStatus::Published));
        assert_eq!("draft".parse::<PageStatus>(), Ok(PageStatus::Draft));
        assert!(matches!(
            "archived".parse::<PageStatus>(),
            Err(StoreError::InvalidRow(_))
        ));
    }

    #[test]
    fn test_page_serializes_status_lowercase() {
        let page = Page {
            id: 1,
            title: "Home".to_string(),
            slug: "home".to_string(),
            summary: None,
            status: PageStatus::Published,
            view_count: 3,
            created_at: DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["status"], "published");
        assert_eq!(json["summary"], serde_json::Value::Null);
        assert_eq!(json["created_at"], "2024-01-02T03:04:05Z");
    }
}
