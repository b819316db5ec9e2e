//! Builds every sitemap artifact from the current published content and
//! writes each one to the cache with no expiry.
//!
//! Each artifact is one full-document `set`, so a reader sees either the old
//! document or the new one. Content query failures are contained to their
//! kind: that kind's previously cached artifacts are left in place and the
//! remaining kinds still regenerate.

use super::keys::{ChunkedKind, INFO_KEY, JobFacet, PAGES_KEY, ROOT_KEY, SitemapFile};
use super::xml::{ChangeFrequency, UrlEntry, build_index, build_url_set};
use crate::cache::Cache;
use crate::content::{ContentKind, ContentRecord, ContentSource};
use crate::utils::{elapsed_ms, fmt_duration, log_if_slow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Maximum URL entries per chunk document.
pub const POSTS_PER_SITEMAP: usize = 200;

/// Path segment used when a record has no category.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Route prefix the CMS serves sitemap files under.
pub const SITEMAP_ROUTE: &str = "/api/v1/sitemaps";

const SLOW_GENERATION_THRESHOLD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SitemapSettings {
    /// Origin of the public site the URLs point at (no trailing slash).
    pub site_url: String,
    /// Origin of this service, used for index and chunk pointers.
    pub cms_url: String,
    pub chunk_size: usize,
}

impl SitemapSettings {
    pub fn new(site_url: impl Into<String>, cms_url: impl Into<String>) -> Self {
        Self {
            site_url: trim_origin(site_url.into()),
            cms_url: trim_origin(cms_url.into()),
            chunk_size: POSTS_PER_SITEMAP,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Public URL of a sitemap file served by this service.
    pub fn file_url(&self, file: SitemapFile) -> String {
        format!("{}{SITEMAP_ROUTE}/{}", self.cms_url, file.file_name())
    }
}

fn trim_origin(origin: String) -> String {
    origin.trim_end_matches('/').to_owned()
}

/// One entry of the published sitemap topology, as listed by the admin endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Generated,
    Empty,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindOutcome {
    pub kind: String,
    pub status: OutcomeStatus,
    pub urls: usize,
    pub chunks: u32,
}

impl KindOutcome {
    fn failed(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            status: OutcomeStatus::Failed,
            urls: 0,
            chunks: 0,
        }
    }

    fn built(kind: impl Into<String>, urls: usize, chunks: u32) -> Self {
        Self {
            kind: kind.into(),
            status: if urls == 0 {
                OutcomeStatus::Empty
            } else {
                OutcomeStatus::Generated
            },
            urls,
            chunks,
        }
    }
}

/// What one generation run did, per kind.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSummary {
    pub generated_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub sitemaps: Vec<KindOutcome>,
}

impl GenerationSummary {
    pub fn outcome(&self, kind: &str) -> Option<&KindOutcome> {
        self.sitemaps.iter().find(|o| o.kind == kind)
    }

    pub fn failures(&self) -> usize {
        self.sitemaps
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .count()
    }

    /// Whether the content backing `file` failed to load in this run.
    pub fn failed_for(&self, file: SitemapFile) -> bool {
        let kind = match file {
            SitemapFile::Root => return false,
            SitemapFile::Pages => "pages".to_owned(),
            SitemapFile::Index(kind) | SitemapFile::Chunk(kind, _) => kind.slug().to_owned(),
            SitemapFile::Facet(facet) => facet.info_type(),
        };
        self.outcome(&kind)
            .is_some_and(|o| o.status == OutcomeStatus::Failed)
    }
}

/// Clone-cheap handle; all state lives in the cache.
#[derive(Clone)]
pub struct SitemapGenerator {
    cache: Cache,
    content: Arc<dyn ContentSource>,
    settings: Arc<SitemapSettings>,
}

impl SitemapGenerator {
    pub fn new(cache: Cache, content: Arc<dyn ContentSource>, settings: SitemapSettings) -> Self {
        Self {
            cache,
            content,
            settings: Arc::new(settings),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn settings(&self) -> &SitemapSettings {
        &self.settings
    }

    /// Regenerate every artifact: pages, each chunked kind, each job facet,
    /// then the root index and the info listing.
    pub async fn generate_all(&self) -> GenerationSummary {
        let start = Instant::now();
        let now = Utc::now();
        let settings = &self.settings;

        let mut outcomes = Vec::with_capacity(2 + ChunkedKind::ALL.len() + JobFacet::ALL.len());
        let mut root_urls = Vec::new();
        let mut listing = vec![SitemapInfo {
            kind: "root".to_owned(),
            url: settings.file_url(SitemapFile::Root),
            index: None,
            references: None,
        }];

        let pages = self.generate_pages(now).await;
        // Only point at the pages document if a reader can actually get it.
        let pages_published = match pages.status {
            OutcomeStatus::Failed => self.cache.get::<String>(PAGES_KEY).await.is_some(),
            _ => true,
        };
        if pages_published {
            let url = settings.file_url(SitemapFile::Pages);
            root_urls.push(url.clone());
            listing.push(SitemapInfo {
                kind: "pages".to_owned(),
                url,
                index: None,
                references: None,
            });
        }
        outcomes.push(pages);

        for kind in ChunkedKind::ALL {
            let outcome = self.generate_chunked(kind, now).await;
            // A failed kind keeps whatever it published last time.
            let chunks = match outcome.status {
                OutcomeStatus::Failed => contiguous_from_one(&self.cached_chunks(kind).await),
                _ => outcome.chunks,
            };
            if chunks > 0 {
                let index_url = settings.file_url(SitemapFile::Index(kind));
                root_urls.push(index_url.clone());
                listing.push(SitemapInfo {
                    kind: kind.info_type().to_owned(),
                    url: index_url.clone(),
                    index: Some(index_url),
                    references: Some(
                        (1..=chunks)
                            .map(|n| settings.file_url(SitemapFile::Chunk(kind, n)))
                            .collect(),
                    ),
                });
            }
            outcomes.push(outcome);
        }

        for facet in JobFacet::ALL {
            let outcome = self.generate_facet(facet).await;
            let published = match outcome.status {
                OutcomeStatus::Generated => true,
                OutcomeStatus::Empty => false,
                OutcomeStatus::Failed => self.cache.get::<String>(&facet.key()).await.is_some(),
            };
            if published {
                let url = settings.file_url(SitemapFile::Facet(facet));
                root_urls.push(url.clone());
                listing.push(SitemapInfo {
                    kind: facet.info_type(),
                    url,
                    index: None,
                    references: None,
                });
            }
            outcomes.push(outcome);
        }

        self.cache
            .set(ROOT_KEY, &build_index(&root_urls, now), 0)
            .await;
        self.cache.set(INFO_KEY, &listing, 0).await;

        let summary = GenerationSummary {
            generated_at: now,
            duration_ms: elapsed_ms(start),
            sitemaps: outcomes,
        };

        log_if_slow(start, SLOW_GENERATION_THRESHOLD, "sitemap generation");
        if summary.failures() > 0 {
            warn!(
                failures = summary.failures(),
                root_entries = root_urls.len(),
                duration = fmt_duration(start.elapsed()),
                "sitemaps regenerated with failures"
            );
        } else {
            info!(
                root_entries = root_urls.len(),
                duration = fmt_duration(start.elapsed()),
                site = %settings.site_url,
                cms = %settings.cms_url,
                "sitemaps regenerated"
            );
        }
        summary
    }

    /// Drop the cached listing and regenerate everything now.
    ///
    /// Called inline by writes that change what is published; returns once
    /// every artifact has been rewritten.
    pub async fn invalidate(&self) -> GenerationSummary {
        self.cache.delete_matching(INFO_KEY).await;
        self.generate_all().await
    }

    /// Read-through listing: regenerate once if the cached listing is missing.
    ///
    /// The flag is `true` when the listing came straight from the cache.
    pub async fn sitemap_info(&self) -> (Vec<SitemapInfo>, bool) {
        if let Some(listing) = self.cache.get::<Vec<SitemapInfo>>(INFO_KEY).await {
            return (listing, true);
        }
        self.generate_all().await;
        let listing = self
            .cache
            .get::<Vec<SitemapInfo>>(INFO_KEY)
            .await
            .unwrap_or_default();
        (listing, false)
    }

    async fn generate_pages(&self, now: DateTime<Utc>) -> KindOutcome {
        let records = match self.load(ContentKind::Page).await {
            Some(records) => records,
            None => return KindOutcome::failed("pages"),
        };

        let site = &self.settings.site_url;
        let mut entries = Vec::with_capacity(records.len() + 1);
        entries.push(
            UrlEntry::new(format!("{site}/"))
                .last_modified(now)
                .change_frequency(ChangeFrequency::Daily)
                .priority(1.0),
        );
        entries.extend(records.into_iter().map(|page| {
            UrlEntry::new(format!("{site}/{}/", page.slug))
                .last_modified(page.updated_at)
                .change_frequency(ChangeFrequency::Monthly)
                .priority(0.6)
        }));

        self.cache.set(PAGES_KEY, &build_url_set(&entries), 0).await;
        KindOutcome::built("pages", entries.len(), 1)
    }

    async fn generate_chunked(&self, kind: ChunkedKind, now: DateTime<Utc>) -> KindOutcome {
        let Some(records) = self.load(kind.into()).await else {
            return KindOutcome::failed(kind.slug());
        };

        let entries: Vec<UrlEntry> = records
            .into_iter()
            .map(|record| chunked_entry(&self.settings.site_url, kind, record))
            .collect();

        let mut chunk_urls = Vec::new();
        for (i, chunk) in entries.chunks(self.settings.chunk_size).enumerate() {
            let n = i as u32 + 1;
            self.cache
                .set(&kind.chunk_key(n), &build_url_set(chunk), 0)
                .await;
            chunk_urls.push(self.settings.file_url(SitemapFile::Chunk(kind, n)));
        }
        let count = chunk_urls.len() as u32;

        if count > 0 {
            self.cache
                .set(&kind.index_key(), &build_index(&chunk_urls, now), 0)
                .await;
        } else {
            self.cache.delete_matching(&kind.index_key()).await;
        }

        // The cached chunk set must match the index: drop every chunk beyond the
        // new count, whatever the stored count says.
        let stale: Vec<u32> = self
            .cached_chunks(kind)
            .await
            .into_iter()
            .filter(|&n| n > count)
            .collect();
        for &n in &stale {
            self.cache.delete_matching(&kind.chunk_key(n)).await;
        }
        self.cache
            .set(&kind.count_key(), &count.to_string(), 0)
            .await;

        debug!(%kind, urls = entries.len(), chunks = count, stale = stale.len(), "chunked sitemap written");
        KindOutcome::built(kind.slug(), entries.len(), count)
    }

    async fn generate_facet(&self, facet: JobFacet) -> KindOutcome {
        let Some(records) = self.load(ContentKind::JobFacet(facet)).await else {
            return KindOutcome::failed(facet.info_type());
        };

        if records.is_empty() {
            self.cache.delete_matching(&facet.key()).await;
            return KindOutcome::built(facet.info_type(), 0, 0);
        }

        let site = &self.settings.site_url;
        let entries: Vec<UrlEntry> = records
            .into_iter()
            .map(|record| {
                UrlEntry::new(format!("{site}/jobs/{}/{}/", facet.slug(), record.slug))
                    .last_modified(record.updated_at)
                    .change_frequency(ChangeFrequency::Weekly)
                    .priority(0.5)
            })
            .collect();

        self.cache.set(&facet.key(), &build_url_set(&entries), 0).await;
        KindOutcome::built(facet.info_type(), entries.len(), 1)
    }

    /// Query one kind, sorted newest first. `None` means the query failed and was logged.
    async fn load(&self, kind: ContentKind) -> Option<Vec<ContentRecord>> {
        match self.content.published(kind).await {
            Ok(mut records) => {
                // Stable: ties keep the collaborator's order.
                records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
                Some(records)
            }
            Err(e) => {
                error!(
                    %kind,
                    error = ?e,
                    at = %Utc::now().to_rfc3339(),
                    "content query failed, keeping previously cached sitemaps"
                );
                None
            }
        }
    }

    /// Chunk numbers currently cached for `kind`, ascending.
    async fn cached_chunks(&self, kind: ChunkedKind) -> Vec<u32> {
        let mut numbers: Vec<u32> = self
            .cache
            .keys(&kind.chunk_pattern())
            .await
            .iter()
            .filter_map(|key| kind.chunk_number(key))
            .collect();
        numbers.sort_unstable();
        numbers
    }
}

/// Length of the `1, 2, 3, ...` run at the start of an ascending list.
fn contiguous_from_one(numbers: &[u32]) -> u32 {
    numbers
        .iter()
        .zip(1u32..)
        .take_while(|(n, expected)| **n == *expected)
        .count() as u32
}

fn chunked_entry(site: &str, kind: ChunkedKind, record: ContentRecord) -> UrlEntry {
    let group = record.group.as_deref().unwrap_or(UNCATEGORIZED);
    match kind {
        ChunkedKind::Post => UrlEntry::new(format!("{site}/blog/{group}/{}/", record.slug))
            .last_modified(record.updated_at)
            .change_frequency(ChangeFrequency::Weekly)
            .priority(0.8),
        ChunkedKind::Job => UrlEntry::new(format!("{site}/jobs/{group}/{}/", record.slug))
            .last_modified(record.updated_at)
            .change_frequency(ChangeFrequency::Daily)
            .priority(0.7),
    }
}
