//! Startup wiring and the long-running modes.

use crate::cache::{Cache, RedisStore};
use crate::cli::Command;
use crate::config::{CacheBackend, Config};
use crate::content::PgContentSource;
use crate::sitemap::{RefreshDriver, SitemapGenerator};
use crate::state::AppState;
use crate::utils::fmt_duration;
use crate::web::auth::{AnyVerifier, PgTokenVerifier, StaticTokens, TokenVerifier};
use anyhow::Context;
use sqlx::ConnectOptions;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

const SLOW_ACQUIRE_THRESHOLD: Duration = Duration::from_millis(500);

pub struct App {
    config: Config,
    db_pool: PgPool,
    generator: SitemapGenerator,
}

impl App {
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let connect_options = PgConnectOptions::from_str(&config.database_url)
            .context("Failed to parse database URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(4)
            .acquire_slow_threshold(SLOW_ACQUIRE_THRESHOLD)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect_with(connect_options)
            .await
            .context("Failed to create database pool")?;

        info!(
            min_connections = 0,
            max_connections = 4,
            acquire_timeout = "4s",
            idle_timeout = "2m",
            max_lifetime = "30m",
            acquire_slow_threshold = fmt_duration(SLOW_ACQUIRE_THRESHOLD),
            "database pool established"
        );

        let cache = Self::build_cache(&config)?;
        let settings = config.sitemap_settings();
        info!(
            backend = cache.backend(),
            site = %settings.site_url,
            cms = %settings.cms_url,
            "sitemap cache configured"
        );

        let generator = SitemapGenerator::new(
            cache,
            Arc::new(PgContentSource::new(db_pool.clone())),
            settings,
        );

        Ok(App {
            config,
            db_pool,
            generator,
        })
    }

    fn build_cache(config: &Config) -> Result<Cache, anyhow::Error> {
        match config.cache_backend() {
            CacheBackend::Memory => Ok(Cache::in_memory()),
            CacheBackend::Disabled => Ok(Cache::disabled()),
            CacheBackend::Redis => {
                let url = config
                    .redis_url
                    .as_deref()
                    .context("CACHE_BACKEND=redis requires REDIS_URL")?;
                let store = RedisStore::new(url).context("Failed to parse REDIS_URL")?;
                Ok(Cache::new(Arc::new(store)))
            }
        }
    }

    pub async fn run(self, command: Command) -> ExitCode {
        match command {
            Command::Serve => self.serve().await,
            Command::Refresh => self.refresh().await,
            Command::Generate => self.generate_once().await,
        }
    }

    fn token_verifier(&self) -> Arc<dyn TokenVerifier> {
        let mut verifiers: Vec<Arc<dyn TokenVerifier>> = Vec::new();
        let configured = StaticTokens::new(self.config.static_tokens());
        if !configured.is_empty() {
            verifiers.push(Arc::new(configured));
        }
        verifiers.push(Arc::new(PgTokenVerifier::new(self.db_pool.clone())));
        Arc::new(AnyVerifier::new(verifiers))
    }

    /// HTTP server plus the in-process refresh driver.
    async fn serve(self) -> ExitCode {
        let addr = ("0.0.0.0", self.config.port);
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(error = ?e, port = self.config.port, "failed to bind web server");
                return ExitCode::FAILURE;
            }
        };
        info!(port = self.config.port, "web server listening");

        let (shutdown_tx, _) = broadcast::channel(1);
        let driver = self.spawn_driver(&shutdown_tx);

        let router = crate::web::create_router(AppState::new(
            self.generator.clone(),
            self.token_verifier(),
        ));
        let mut server_rx = shutdown_tx.subscribe();
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = server_rx.recv().await;
                })
                .await
        });

        shutdown_signal().await;
        let _ = shutdown_tx.send(());

        self.drain(async move {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = ?e, "web server exited with error"),
                Err(e) => error!(error = ?e, "web server task panicked"),
            }
            let _ = driver.await;
        })
        .await
    }

    /// Standalone refresh loop; artifacts reach the servers through the shared cache.
    async fn refresh(self) -> ExitCode {
        let backend = self.generator.cache().backend();
        if matches!(backend, "memory" | "disabled") {
            warn!(backend, "refresh running without a shared cache, nothing outside this process will see it");
        }
        let (shutdown_tx, _) = broadcast::channel(1);
        let driver = self.spawn_driver(&shutdown_tx);

        shutdown_signal().await;
        let _ = shutdown_tx.send(());

        self.drain(async move {
            let _ = driver.await;
        })
        .await
    }

    async fn generate_once(self) -> ExitCode {
        let summary = self.generator.generate_all().await;
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => error!(error = ?e, "failed to encode generation summary"),
        }
        if summary.failures() > 0 {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }

    fn spawn_driver(&self, shutdown_tx: &broadcast::Sender<()>) -> tokio::task::JoinHandle<()> {
        let driver = RefreshDriver::new(
            self.generator.clone(),
            self.config.sitemap_refresh_interval,
        );
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { driver.run(shutdown_rx).await })
    }

    async fn drain(&self, tasks: impl Future<Output = ()>) -> ExitCode {
        let timeout = self.config.shutdown_timeout;
        match tokio::time::timeout(timeout, tasks).await {
            Ok(()) => {
                info!("graceful shutdown complete");
                ExitCode::SUCCESS
            }
            Err(_) => {
                warn!(
                    timeout = fmt_duration(timeout),
                    "graceful shutdown timed out, exiting"
                );
                ExitCode::FAILURE
            }
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = ?e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
