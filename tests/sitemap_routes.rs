//! HTTP behaviour of the sitemap and admin routes.

mod helpers;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use folio::content::ContentKind;
use folio::state::AppState;
use folio::web::auth::StaticTokens;
use folio::web::create_router;
use helpers::{CMS, FakeContent, generator, locs, posts, url_count};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN: &str = "test-token";

fn router(content: Arc<FakeContent>) -> Router {
    create_router(AppState::new(
        generator(content),
        Arc::new(StaticTokens::new([TOKEN])),
    ))
}

struct Reply {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    body: String,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

async fn send(router: &Router, request: Request<Body>) -> Reply {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    Reply {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

async fn get(router: &Router, path: &str) -> Reply {
    send(router, Request::get(path).body(Body::empty()).unwrap()).await
}

async fn authed(router: &Router, method: &str, path: &str) -> Reply {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap();
    send(router, request).await
}

#[tokio::test]
async fn miss_regenerates_once_then_serves_from_cache() {
    let content = FakeContent::new();
    content.set(ContentKind::Post, posts(450));
    let router = router(content.clone());

    let first = get(&router, "/api/v1/sitemaps/sitemap-post-3.xml").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.headers[header::CONTENT_TYPE], "application/xml");
    assert_eq!(first.headers[header::CACHE_CONTROL], "public, max-age=3600");
    assert_eq!(first.headers["x-sitemap-cache"], "MISS");
    assert_eq!(url_count(&first.body), 50);
    assert_eq!(content.generations(), 1);

    let second = get(&router, "/api/v1/sitemaps/sitemap-post-1.xml").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.headers["x-sitemap-cache"], "HIT");
    assert_eq!(content.generations(), 1);
}

#[tokio::test]
async fn unknown_filenames_404_without_touching_content() {
    let content = FakeContent::new();
    let router = router(content.clone());

    for path in [
        "/api/v1/sitemaps/sitemap-post-0.xml",
        "/api/v1/sitemaps/sitemap-post-01.xml",
        "/api/v1/sitemaps/sitemap-widgets.xml",
        "/api/v1/sitemaps/robots.txt",
        "/api/sitemaps/blog-x.xml",
    ] {
        let reply = get(&router, path).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND, "{path}");
        assert_eq!(reply.body, "Not Found");
    }
    assert_eq!(content.generations(), 0);
}

#[tokio::test]
async fn chunk_past_the_end_is_404_after_one_regeneration() {
    let content = FakeContent::new();
    content.set(ContentKind::Post, posts(10));
    let router = router(content.clone());

    let reply = get(&router, "/api/v1/sitemaps/sitemap-post-2.xml").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(content.generations(), 1);
}

#[tokio::test]
async fn failed_kind_with_nothing_cached_is_500() {
    let content = FakeContent::new();
    content.fail(ContentKind::Post, true);
    let router = router(content.clone());

    let reply = get(&router, "/api/v1/sitemaps/sitemap-post-1.xml").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);

    // Unaffected kinds are still served.
    let pages = get(&router, "/api/v1/sitemaps/sitemap-pages.xml").await;
    assert_eq!(pages.status, StatusCode::OK);
}

#[tokio::test]
async fn root_and_legacy_names_share_cached_documents() {
    let content = FakeContent::new();
    content.set(ContentKind::Post, posts(3));
    let router = router(content.clone());

    let root = get(&router, "/sitemap.xml").await;
    assert_eq!(root.status, StatusCode::OK);
    assert!(locs(&root.body).contains(&format!("{CMS}/api/v1/sitemaps/sitemap-post.xml")));

    let current = get(&router, "/api/v1/sitemaps/sitemap-post-1.xml").await;
    let legacy = get(&router, "/api/sitemaps/blog-1.xml").await;
    assert_eq!(legacy.status, StatusCode::OK);
    assert_eq!(legacy.body, current.body);
    assert_eq!(get(&router, "/api/sitemaps/root.xml").await.body, root.body);
    assert_eq!(content.generations(), 1);
}

#[tokio::test]
async fn admin_routes_require_a_bearer_token() {
    let router = router(FakeContent::new());

    let anonymous = get(&router, "/api/v1/sitemaps").await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.json()["success"], false);

    let request = Request::get("/api/v1/job-posts/sitemaps")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&router, request).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sitemap_listing_reports_cache_state() {
    let content = FakeContent::new();
    content.set(ContentKind::Post, posts(5));
    let router = router(content.clone());

    let first = authed(&router, "GET", "/api/v1/sitemaps").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(
        first.headers[header::CACHE_CONTROL],
        "private, no-store, must-revalidate"
    );
    let body = first.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["cached"], false);
    assert_eq!(body["data"]["sitemaps"][0]["type"], "root");
    assert_eq!(body["data"]["sitemaps"][2]["type"], "blog");

    let second = authed(&router, "GET", "/api/v1/sitemaps").await.json();
    assert_eq!(second["cached"], true);
    assert_eq!(content.generations(), 1);
}

#[tokio::test]
async fn job_listing_filters_to_job_sitemaps() {
    let content = FakeContent::new();
    content.set(ContentKind::Post, posts(5));
    content.set(ContentKind::Job, posts(2));
    let router = router(content);

    let body = authed(&router, "GET", "/api/v1/job-posts/sitemaps").await.json();
    let sitemaps = body["data"]["sitemaps"].as_array().unwrap();
    assert_eq!(sitemaps.len(), 1);
    assert_eq!(sitemaps[0]["type"], "job");
}

#[tokio::test]
async fn generate_returns_per_kind_summary() {
    let content = FakeContent::new();
    content.set(ContentKind::Post, posts(401));
    let router = router(content.clone());

    let reply = authed(&router, "POST", "/api/v1/sitemaps/generate").await;
    assert_eq!(reply.status, StatusCode::OK);
    let summary = &reply.json()["data"]["summary"];
    let post = summary["sitemaps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["kind"] == "post")
        .unwrap()
        .clone();
    assert_eq!(post["status"], "generated");
    assert_eq!(post["chunks"], 3);
    assert_eq!(content.generations(), 1);
}

#[tokio::test]
async fn robots_and_health() {
    let router = router(FakeContent::new());

    let robots = get(&router, "/robots.txt").await;
    assert_eq!(robots.status, StatusCode::OK);
    assert!(robots.body.contains("Disallow: /api/\n"));
    assert!(
        robots
            .body
            .contains(&format!("Sitemap: {CMS}/api/v1/sitemaps/sitemap.xml"))
    );

    let health = get(&router, "/api/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.json()["status"], "healthy");
    assert!(health.headers.contains_key("x-request-id"));
}
