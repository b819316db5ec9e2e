//! XML sitemap endpoints.
//!
//! Files are served from the shared cache. A miss triggers one full
//! regeneration before giving up.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::sitemap::{Lookup, SitemapFile, lookup};
use crate::state::AppState;
use crate::web::routes::cache;

fn xml_response(xml: String, regenerated: bool) -> Response {
    let mut response = xml.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache::SITEMAP));
    headers.insert(
        "x-sitemap-cache",
        HeaderValue::from_static(if regenerated { "MISS" } else { "HIT" }),
    );
    response
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

async fn serve(state: &AppState, file: SitemapFile) -> Response {
    match lookup(&state.generator, file).await {
        Lookup::Found { xml, regenerated } => xml_response(xml, regenerated),
        Lookup::NotFound => not_found(),
        Lookup::GenerationFailed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate sitemap",
        )
            .into_response(),
    }
}

/// `GET /sitemap.xml` -- the root index.
pub async fn sitemap_root(State(state): State<AppState>) -> Response {
    serve(&state, SitemapFile::Root).await
}

/// `GET /api/v1/sitemaps/{file}`
pub async fn sitemap_file(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    match SitemapFile::parse(&file) {
        Some(parsed) => serve(&state, parsed).await,
        None => {
            debug!(file = %file, "unknown sitemap file");
            not_found()
        }
    }
}

/// `GET /api/sitemaps/{file}` -- pre-versioning names (`root.xml`, `blog-2.xml`, ...).
pub async fn legacy_sitemap_file(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Response {
    match SitemapFile::parse_legacy(&file) {
        Some(parsed) => serve(&state, parsed).await,
        None => {
            debug!(file = %file, "unknown legacy sitemap file");
            not_found()
        }
    }
}
