//! Per-request tracing spans keyed by a request ID.
//!
//! An incoming `X-Request-Id` from a trusted proxy is reused; otherwise a
//! ULID is generated. The resolved ID is echoed back in `X-Request-Id`.

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;

use crate::utils::elapsed_ms;

pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Upstream IDs longer than this are replaced rather than logged.
const MAX_UPSTREAM_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

fn resolve_request_id(req: &Request) -> String {
    req.headers()
        .get(&REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty() && id.len() <= MAX_UPSTREAM_ID_LEN)
        .map(String::from)
        .unwrap_or_else(|| ulid::Ulid::new().to_string())
}

impl<S, B> Service<Request> for RequestIdService<S>
where
    S: Service<Request, Response = Response<B>> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::fmt::Debug,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let req_id = resolve_request_id(&req);
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let span = tracing::info_span!("request", req_id = %req_id);
        let header_value = HeaderValue::from_str(&req_id).ok();
        let start = Instant::now();

        let future = self.inner.call(req);

        Box::pin(
            async move {
                let mut result = future.await;
                let duration_ms = elapsed_ms(start);

                match &result {
                    Ok(response) => {
                        let status = response.status().as_u16();
                        match status {
                            200..=399 => {
                                tracing::debug!(%method, %path, status, duration_ms, "Response")
                            }
                            400..=499 => {
                                tracing::info!(%method, %path, status, duration_ms, "Response")
                            }
                            _ => tracing::warn!(%method, %path, status, duration_ms, "Response"),
                        }
                    }
                    Err(e) => {
                        tracing::error!(%method, %path, error = ?e, duration_ms, "Request failed");
                    }
                }

                if let Ok(response) = &mut result
                    && let Some(value) = header_value
                {
                    response.headers_mut().insert(REQUEST_ID, value);
                }

                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(id: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/sitemap.xml");
        if let Some(id) = id {
            builder = builder.header("x-request-id", id);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn upstream_id_is_reused() {
        assert_eq!(resolve_request_id(&request(Some("edge-42"))), "edge-42");
    }

    #[test]
    fn missing_or_oversized_id_gets_a_ulid() {
        let generated = resolve_request_id(&request(None));
        assert!(ulid::Ulid::from_string(&generated).is_ok());

        let long = "x".repeat(MAX_UPSTREAM_ID_LEN + 1);
        assert_ne!(resolve_request_id(&request(Some(&long))), long);
    }
}
