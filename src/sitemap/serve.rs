//! Read-through lookup for requested sitemap files.
//!
//! A hit is served straight from the cache. A miss regenerates every
//! artifact and reads once more; a second miss is final.

use super::generator::SitemapGenerator;
use super::keys::SitemapFile;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Document found, and whether it needed a regeneration first.
    Found { xml: String, regenerated: bool },
    /// Still absent after regenerating, e.g. a chunk past the current count.
    NotFound,
    /// Regeneration ran but the content for this file failed to load.
    GenerationFailed,
}

pub async fn lookup(generator: &SitemapGenerator, file: SitemapFile) -> Lookup {
    let key = file.cache_key();
    if let Some(xml) = generator.cache().get::<String>(&key).await {
        return Lookup::Found {
            xml,
            regenerated: false,
        };
    }

    info!(%key, "sitemap not cached, regenerating");
    let summary = generator.generate_all().await;

    match generator.cache().get::<String>(&key).await {
        Some(xml) => Lookup::Found {
            xml,
            regenerated: true,
        },
        None if summary.failed_for(file) => {
            warn!(%key, "sitemap still missing, its content failed to load");
            Lookup::GenerationFailed
        }
        None => {
            debug!(%key, "sitemap still missing after regeneration");
            Lookup::NotFound
        }
    }
}
