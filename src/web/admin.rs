//! Bearer-gated sitemap management endpoints.

use axum::extract::State;
use axum::response::Json;
use serde_json::{Value, json};
use tracing::info;

use crate::sitemap::SitemapInfo;
use crate::state::AppState;
use crate::web::auth::Authorized;
use crate::web::error::success;

/// `GET /api/v1/sitemaps` -- the published sitemap topology.
pub async fn sitemap_info(_auth: Authorized, State(state): State<AppState>) -> Json<Value> {
    let (sitemaps, cached) = state.generator.sitemap_info().await;
    success(json!({ "sitemaps": sitemaps }), cached)
}

/// `POST /api/v1/sitemaps/generate` -- full regeneration, returns the per-kind summary.
pub async fn generate(_auth: Authorized, State(state): State<AppState>) -> Json<Value> {
    info!("manual sitemap regeneration requested");
    let summary = state.generator.generate_all().await;
    success(
        json!({ "message": "Sitemaps generated", "summary": summary }),
        false,
    )
}

/// `GET /api/v1/job-posts/sitemaps` -- the job-related subset of the topology.
pub async fn job_sitemaps(_auth: Authorized, State(state): State<AppState>) -> Json<Value> {
    let (sitemaps, cached) = state.generator.sitemap_info().await;
    let jobs: Vec<SitemapInfo> = sitemaps
        .into_iter()
        .filter(|info| info.kind.starts_with("job"))
        .collect();
    success(json!({ "sitemaps": jobs }), cached)
}
