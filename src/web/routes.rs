//! Router construction and shared response presets.

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer};

use crate::sitemap::SitemapFile;
use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{admin, sitemap, status};

/// Cache-Control presets.
pub mod cache {
    /// Sitemap documents. Regeneration keeps the cache fresh, so an hour is safe for crawlers.
    pub const SITEMAP: &str = "public, max-age=3600";
    pub const ROBOTS: &str = "public, max-age=86400";
    /// Token-gated endpoints -- never cache.
    pub const ADMIN: &str = "private, no-store, must-revalidate";
}

/// Whole-request budget. A cache miss regenerates every sitemap inline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub fn create_router(app_state: AppState) -> Router {
    let sitemap_router = Router::new()
        .route("/v1/sitemaps/{file}", get(sitemap::sitemap_file))
        .route("/sitemaps/{file}", get(sitemap::legacy_sitemap_file))
        .route("/health", get(status::health))
        .with_state(app_state.clone());

    let admin_router = Router::new()
        .route("/v1/sitemaps", get(admin::sitemap_info))
        .route("/v1/sitemaps/generate", post(admin::generate))
        .route("/v1/job-posts/sitemaps", get(admin::job_sitemaps))
        .layer(axum::middleware::map_response(
            |mut resp: Response| async move {
                resp.headers_mut().insert(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static(cache::ADMIN),
                );
                resp
            },
        ))
        .with_state(app_state.clone());

    let router = Router::new()
        .route("/robots.txt", get(robots_txt))
        .route("/sitemap.xml", get(sitemap::sitemap_root))
        .nest("/api", sitemap_router)
        .nest("/api", admin_router)
        .with_state(app_state);

    router.layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::new(REQUEST_TIMEOUT),
    ))
}

/// `GET /robots.txt`
///
/// Keeps crawlers off the API and advertises the root sitemap.
async fn robots_txt(State(state): State<AppState>) -> Response {
    let body = format!(
        "User-agent: *\n\
         Allow: /api/v1/sitemaps/\n\
         Allow: /api/sitemaps/\n\
         Disallow: /api/\n\
         \n\
         Sitemap: {}\n",
        state.generator.settings().file_url(SitemapFile::Root)
    );
    let mut resp = body.into_response();
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp.headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(cache::ROBOTS));
    resp
}
