//! Application state shared across request handlers.

use crate::sitemap::SitemapGenerator;
use crate::web::auth::TokenVerifier;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub generator: SitemapGenerator,
    pub tokens: Arc<dyn TokenVerifier>,
}

impl AppState {
    pub fn new(generator: SitemapGenerator, tokens: Arc<dyn TokenVerifier>) -> Self {
        Self { generator, tokens }
    }
}
