//! Periodic full regeneration, independent of request traffic.
//!
//! Catches anything invalidation missed, such as writes made directly against
//! the database. Each tick runs in its own task so a panic in one run is
//! logged and the next tick still fires.

use super::generator::SitemapGenerator;
use crate::utils::fmt_duration;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct RefreshDriver {
    generator: SitemapGenerator,
    interval: Duration,
}

impl RefreshDriver {
    /// `interval` is floored at one second.
    pub fn new(generator: SitemapGenerator, interval: Duration) -> Self {
        Self {
            generator,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Regenerate immediately, then once per interval until shutdown.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            interval = fmt_duration(self.interval),
            "sitemap refresh driver started"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("sitemap refresh driver received shutdown signal, exiting");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&self) {
        info!(at = %Utc::now().to_rfc3339(), "regenerating sitemaps");
        let generator = self.generator.clone();
        match tokio::spawn(async move { generator.generate_all().await }).await {
            Ok(summary) if summary.failures() > 0 => {
                warn!(
                    at = %Utc::now().to_rfc3339(),
                    failures = summary.failures(),
                    "scheduled sitemap regeneration finished with failures"
                );
            }
            Ok(summary) => {
                info!(
                    at = %Utc::now().to_rfc3339(),
                    duration_ms = summary.duration_ms,
                    "scheduled sitemap regeneration finished"
                );
            }
            Err(e) => {
                error!(
                    at = %Utc::now().to_rfc3339(),
                    error = ?e,
                    "scheduled sitemap regeneration aborted"
                );
            }
        }
    }
}
