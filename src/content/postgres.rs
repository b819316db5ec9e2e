//! Postgres-backed content queries.
//!
//! The schema is owned by the CMS; these queries only read it. Each returns
//! `slug`, `updated_at`, and a nullable `group_slug`.

use super::{ContentError, ContentKind, ContentRecord, ContentSource};
use crate::sitemap::keys::JobFacet;
use crate::utils::log_if_slow;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tracing::debug;

const SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(500);

const PAGES_SQL: &str = r#"
    SELECT p.slug, p.updated_at, NULL::text AS group_slug
    FROM pages p
    WHERE p.status = 'published'
    ORDER BY p.updated_at DESC
"#;

// First category per post, by category slug, so a post with several
// categories always lands on the same URL.
const POSTS_SQL: &str = r#"
    SELECT slug, updated_at, group_slug FROM (
        SELECT DISTINCT ON (p.id) p.slug, p.updated_at, c.slug AS group_slug
        FROM posts p
        LEFT JOIN post_categories pc ON p.id = pc.post_id
        LEFT JOIN categories c ON pc.category_id = c.id
        WHERE p.status = 'published'
          AND (p.post_type = 'post' OR p.post_type IS NULL)
        ORDER BY p.id, c.slug
    ) first_category
    ORDER BY updated_at DESC
"#;

const JOBS_SQL: &str = r#"
    SELECT slug, updated_at, group_slug FROM (
        SELECT DISTINCT ON (jp.id) jp.slug, jp.updated_at, jc.slug AS group_slug
        FROM job_posts jp
        LEFT JOIN job_post_categories jpc ON jp.id = jpc.job_post_id
        LEFT JOIN job_categories jc ON jpc.category_id = jc.id
        WHERE jp.status = 'published'
        ORDER BY jp.id, jc.slug
    ) first_category
    ORDER BY updated_at DESC
"#;

const JOB_CATEGORIES_SQL: &str = r#"
    SELECT jc.slug, MAX(jp.updated_at) AS updated_at, NULL::text AS group_slug
    FROM job_categories jc
    JOIN job_post_categories jpc ON jpc.category_id = jc.id
    JOIN job_posts jp ON jp.id = jpc.job_post_id
    WHERE jp.status = 'published'
    GROUP BY jc.slug
    ORDER BY updated_at DESC
"#;

const JOB_TAGS_SQL: &str = r#"
    SELECT jt.slug, MAX(jp.updated_at) AS updated_at, NULL::text AS group_slug
    FROM job_tags jt
    JOIN job_post_tags jpt ON jpt.tag_id = jt.id
    JOIN job_posts jp ON jp.id = jpt.job_post_id
    WHERE jp.status = 'published'
    GROUP BY jt.slug
    ORDER BY updated_at DESC
"#;

const JOB_EMPLOYMENT_TYPES_SQL: &str = r#"
    SELECT jet.slug, MAX(jp.updated_at) AS updated_at, NULL::text AS group_slug
    FROM job_employment_types jet
    JOIN job_posts jp ON jp.job_employment_type_id = jet.id
    WHERE jp.status = 'published'
    GROUP BY jet.slug
    ORDER BY updated_at DESC
"#;

const JOB_EXPERIENCE_LEVELS_SQL: &str = r#"
    SELECT jel.slug, MAX(jp.updated_at) AS updated_at, NULL::text AS group_slug
    FROM job_experience_levels jel
    JOIN job_posts jp ON jp.job_experience_level_id = jel.id
    WHERE jp.status = 'published'
    GROUP BY jel.slug
    ORDER BY updated_at DESC
"#;

const JOB_EDUCATION_LEVELS_SQL: &str = r#"
    SELECT jedl.slug, MAX(jp.updated_at) AS updated_at, NULL::text AS group_slug
    FROM job_education_levels jedl
    JOIN job_posts jp ON jp.job_education_level_id = jedl.id
    WHERE jp.status = 'published'
    GROUP BY jedl.slug
    ORDER BY updated_at DESC
"#;

fn query_for(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Page => PAGES_SQL,
        ContentKind::Post => POSTS_SQL,
        ContentKind::Job => JOBS_SQL,
        ContentKind::JobFacet(JobFacet::Category) => JOB_CATEGORIES_SQL,
        ContentKind::JobFacet(JobFacet::Tag) => JOB_TAGS_SQL,
        ContentKind::JobFacet(JobFacet::EmploymentType) => JOB_EMPLOYMENT_TYPES_SQL,
        ContentKind::JobFacet(JobFacet::ExperienceLevel) => JOB_EXPERIENCE_LEVELS_SQL,
        ContentKind::JobFacet(JobFacet::EducationLevel) => JOB_EDUCATION_LEVELS_SQL,
    }
}

/// A pool that cannot hand out a connection is an outage, not a bad query.
fn query_error(kind: ContentKind, source: sqlx::Error) -> ContentError {
    match source {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            ContentError::Unavailable(source.to_string())
        }
        source => ContentError::Query { kind, source },
    }
}

#[derive(Clone)]
pub struct PgContentSource {
    pool: PgPool,
}

impl PgContentSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentSource for PgContentSource {
    async fn published(&self, kind: ContentKind) -> Result<Vec<ContentRecord>, ContentError> {
        let start = Instant::now();
        let records = sqlx::query_as::<_, ContentRecord>(query_for(kind))
            .fetch_all(&self.pool)
            .await
            .map_err(|source| query_error(kind, source))?;
        log_if_slow(start, SLOW_QUERY_THRESHOLD, "published content query");
        debug!(%kind, count = records.len(), "loaded published content");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_reported_as_unavailable() {
        assert!(matches!(
            query_error(ContentKind::Post, sqlx::Error::PoolTimedOut),
            ContentError::Unavailable(_)
        ));
        assert!(matches!(
            query_error(ContentKind::Page, sqlx::Error::PoolClosed),
            ContentError::Unavailable(_)
        ));
        assert!(matches!(
            query_error(ContentKind::Job, sqlx::Error::RowNotFound),
            ContentError::Query { kind: ContentKind::Job, .. }
        ));
    }
}
