//! Read-only view of published content, as needed to build sitemaps.

mod postgres;

use crate::sitemap::keys::{ChunkedKind, JobFacet};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

pub use postgres::PgContentSource;

/// A published record reduced to what a sitemap URL needs.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ContentRecord {
    pub slug: String,
    pub updated_at: DateTime<Utc>,
    /// Grouping segment for the public path (primary category), if any.
    #[sqlx(rename = "group_slug")]
    pub group: Option<String>,
}

impl ContentRecord {
    pub fn new(slug: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            slug: slug.into(),
            updated_at,
            group: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Page,
    Post,
    Job,
    JobFacet(JobFacet),
}

impl From<ChunkedKind> for ContentKind {
    fn from(kind: ChunkedKind) -> Self {
        match kind {
            ChunkedKind::Post => ContentKind::Post,
            ChunkedKind::Job => ContentKind::Job,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page => f.write_str("page"),
            Self::Post => f.write_str("post"),
            Self::Job => f.write_str("job"),
            Self::JobFacet(facet) => write!(f, "job-{facet}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content query for {kind} failed")]
    Query {
        kind: ContentKind,
        #[source]
        source: sqlx::Error,
    },
    #[error("content store unavailable: {0}")]
    Unavailable(String),
}

/// Source of published content, one query per kind.
///
/// Implementations return only published records, newest `updated_at` first.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn published(&self, kind: ContentKind) -> Result<Vec<ContentRecord>, ContentError>;
}
