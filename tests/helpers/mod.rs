#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use folio::cache::Cache;
use folio::content::{ContentError, ContentKind, ContentRecord, ContentSource};
use folio::sitemap::{SitemapGenerator, SitemapSettings};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const SITE: &str = "https://www.example.com";
pub const CMS: &str = "https://cms.example.com";

/// In-memory content with per-kind failure injection.
///
/// Every generation run queries pages exactly once, so the page query count
/// doubles as a regeneration counter.
#[derive(Default)]
pub struct FakeContent {
    records: Mutex<HashMap<ContentKind, Vec<ContentRecord>>>,
    failing: Mutex<HashSet<ContentKind>>,
    page_queries: AtomicUsize,
    panic_next: AtomicBool,
}

impl FakeContent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, kind: ContentKind, records: Vec<ContentRecord>) {
        self.records.lock().unwrap().insert(kind, records);
    }

    pub fn fail(&self, kind: ContentKind, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(kind);
        } else {
            set.remove(&kind);
        }
    }

    /// The next page query panics instead of returning.
    pub fn panic_next(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    pub fn generations(&self) -> usize {
        self.page_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for FakeContent {
    async fn published(&self, kind: ContentKind) -> Result<Vec<ContentRecord>, ContentError> {
        if kind == ContentKind::Page {
            if self.panic_next.swap(false, Ordering::SeqCst) {
                panic!("injected content panic");
            }
            self.page_queries.fetch_add(1, Ordering::SeqCst);
        }
        if self.failing.lock().unwrap().contains(&kind) {
            return Err(ContentError::Unavailable(format!("{kind} offline")));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// `n` posts, `post-0` newest, one minute apart.
pub fn posts(n: usize) -> Vec<ContentRecord> {
    (0..n)
        .map(|i| {
            ContentRecord::new(format!("post-{i}"), base_time() - Duration::minutes(i as i64))
                .in_group("news")
        })
        .collect()
}

pub fn generator(content: Arc<FakeContent>) -> SitemapGenerator {
    SitemapGenerator::new(Cache::in_memory(), content, SitemapSettings::new(SITE, CMS))
}

pub async fn cached(generator: &SitemapGenerator, key: &str) -> Option<String> {
    generator.cache().get::<String>(key).await
}

pub fn url_count(xml: &str) -> usize {
    xml.matches("<url>").count()
}

pub fn locs(xml: &str) -> Vec<String> {
    xml.split("<loc>")
        .skip(1)
        .filter_map(|rest| rest.split_once("</loc>").map(|(loc, _)| loc.to_owned()))
        .collect()
}
