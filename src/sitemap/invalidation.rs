//! Cache invalidation for content writes.
//!
//! Mutating handlers call [`Invalidator::after_write`] before responding. List
//! and detail response caches are always purged; sitemaps are regenerated
//! inline only when the write moved something into or out of `published`.

use super::generator::{GenerationSummary, SitemapGenerator};
use crate::cache::Cache;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    Draft,
    Published,
    Scheduled,
    Archived,
}

impl FromStr for PublishStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "scheduled" => Ok(Self::Scheduled),
            "archived" => Ok(Self::Archived),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown publish status {0:?}")]
pub struct UnknownStatus(String);

/// The content family a write touched; selects which response caches to purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFamily {
    Posts,
    Pages,
    Jobs,
}

impl ContentFamily {
    fn segment(self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Pages => "pages",
            Self::Jobs => "job-posts",
        }
    }
}

/// A completed create, update, or delete.
///
/// `old_status` is `None` for creates and `new_status` is `None` for deletes.
#[derive(Debug, Clone)]
pub struct ContentMutation {
    pub family: ContentFamily,
    pub id: Option<String>,
    pub author_id: Option<String>,
    pub old_status: Option<PublishStatus>,
    pub new_status: Option<PublishStatus>,
}

impl ContentMutation {
    pub fn changes_published_set(&self) -> bool {
        self.old_status == Some(PublishStatus::Published)
            || self.new_status == Some(PublishStatus::Published)
    }

    /// Response-cache keys and patterns made stale by this write.
    pub fn response_cache_patterns(&self) -> Vec<String> {
        let segment = self.family.segment();
        let mut patterns = vec![format!("api:public:{segment}:*")];
        if let Some(author) = &self.author_id {
            patterns.push(format!("api:{segment}:user:{author}"));
        }
        if let Some(id) = &self.id {
            patterns.push(format!("api:{segment}:id:{id}"));
        }
        patterns
    }
}

#[derive(Clone)]
pub struct Invalidator {
    cache: Cache,
    generator: SitemapGenerator,
}

impl Invalidator {
    pub fn new(generator: SitemapGenerator) -> Self {
        Self {
            cache: generator.cache().clone(),
            generator,
        }
    }

    /// Purge the write's response caches, then regenerate sitemaps if the
    /// published set changed. Returns the regeneration summary when one ran.
    pub async fn after_write(&self, mutation: &ContentMutation) -> Option<GenerationSummary> {
        for pattern in mutation.response_cache_patterns() {
            self.cache.delete_matching(&pattern).await;
        }

        if !mutation.changes_published_set() {
            debug!(family = ?mutation.family, "write left published set unchanged, sitemaps kept");
            return None;
        }
        Some(self.generator.invalidate().await)
    }

    /// Unconditional sitemap invalidation.
    pub async fn invalidate_sitemaps(&self) -> GenerationSummary {
        self.generator.invalidate().await
    }
}
