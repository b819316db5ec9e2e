//! Sitemap generation, caching, and serving.

pub mod generator;
pub mod invalidation;
pub mod keys;
pub mod refresh;
pub mod serve;
pub mod xml;

pub use generator::{
    GenerationSummary, KindOutcome, OutcomeStatus, POSTS_PER_SITEMAP, SitemapGenerator,
    SitemapInfo, SitemapSettings,
};
pub use invalidation::{ContentFamily, ContentMutation, Invalidator, PublishStatus};
pub use keys::{ChunkedKind, JobFacet, SitemapFile};
pub use refresh::RefreshDriver;
pub use serve::{Lookup, lookup};
