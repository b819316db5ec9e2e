//! Bearer-token authorization for the sitemap admin routes.

use crate::state::AppState;
use crate::web::error::ApiError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// `Ok(false)` for unknown or expired tokens; `Err` only when the check itself failed.
    async fn verify(&self, token: &str) -> Result<bool, sqlx::Error>;
}

/// Looks tokens up in the `api_tokens` table. A NULL `expires_at` never expires.
pub struct PgTokenVerifier {
    pool: PgPool,
}

impl PgTokenVerifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenVerifier for PgTokenVerifier {
    async fn verify(&self, token: &str) -> Result<bool, sqlx::Error> {
        let row: Option<Option<DateTime<Utc>>> =
            sqlx::query_scalar("SELECT expires_at FROM api_tokens WHERE token = $1 LIMIT 1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match row {
            None => false,
            Some(None) => true,
            Some(Some(expires_at)) => expires_at > Utc::now(),
        })
    }
}

/// Fixed set of accepted tokens, e.g. from `API_TOKENS`.
#[derive(Debug, Default, Clone)]
pub struct StaticTokens(HashSet<String>);

impl StaticTokens {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[async_trait]
impl TokenVerifier for StaticTokens {
    async fn verify(&self, token: &str) -> Result<bool, sqlx::Error> {
        Ok(self.0.contains(token))
    }
}

/// Accepts a token when any inner verifier does, checked in order.
pub struct AnyVerifier(Vec<Arc<dyn TokenVerifier>>);

impl AnyVerifier {
    pub fn new(verifiers: Vec<Arc<dyn TokenVerifier>>) -> Self {
        Self(verifiers)
    }
}

#[async_trait]
impl TokenVerifier for AnyVerifier {
    async fn verify(&self, token: &str) -> Result<bool, sqlx::Error> {
        for verifier in &self.0 {
            if verifier.verify(token).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// `Authorization: Bearer <token>` value, prefix stripped.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extractor that rejects the request with 401 unless it carries a valid bearer token.
pub struct Authorized;

impl FromRequestParts<AppState> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            debug!(path = %parts.uri.path(), "missing bearer token");
            return Err(ApiError::unauthorized("Invalid or expired API token"));
        };

        match state.tokens.verify(token).await {
            Ok(true) => Ok(Authorized),
            Ok(false) => {
                debug!(path = %parts.uri.path(), "rejected bearer token");
                Err(ApiError::unauthorized("Invalid or expired API token"))
            }
            Err(e) => {
                error!(error = ?e, "token verification failed");
                Err(ApiError::internal("Failed to verify API token"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/sitemaps");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_prefix_is_required_and_stripped() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc123"))), Some("abc123"));
        assert_eq!(bearer_token(&parts(Some("Basic abc123"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }

    #[tokio::test]
    async fn any_verifier_accepts_when_one_matches() {
        let verifier = AnyVerifier::new(vec![
            Arc::new(StaticTokens::new(["first"])),
            Arc::new(StaticTokens::new(["second"])),
        ]);
        assert!(verifier.verify("second").await.unwrap());
        assert!(!verifier.verify("third").await.unwrap());
        assert!(!AnyVerifier::new(Vec::new()).verify("first").await.unwrap());
    }
}
