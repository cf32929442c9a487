//! Daemon wiring: store, API clients, orchestrator and metrics server

use std::sync::Arc;

use anyhow::{Context, Result};
use spotislack_api::{OAuthRefresher, SlackClient, SpotifyClient};
use spotislack_core::{
    config::Config,
    domain::{Service, TickSummary},
};
use spotislack_store::{DatabasePool, SqliteUserRepository};
use spotislack_sync::{LogObserver, SyncDependencies, SyncOrchestrator, SyncSettings};
use spotislack_telemetry::{MetricsObserver, MetricsRegistry, MetricsServer};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Everything the daemon runs, built from one validated [`Config`]
pub struct DaemonService {
    config: Config,
    db_pool: DatabasePool,
    orchestrator: SyncOrchestrator,
    metrics: Option<Arc<MetricsRegistry>>,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the store and builds the API clients and the orchestrator
    pub async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let db_url = config.database_url()?;
        let db_pool = DatabasePool::connect(db_url)
            .await
            .context("Failed to open user database")?;
        let repository = Arc::new(SqliteUserRepository::new(db_pool.pool().clone()));

        let spotify = SpotifyClient::new(&config.spotify, &config.http)
            .context("Failed to build Spotify client")?;
        let slack = SlackClient::new(&config.slack, &config.http)
            .context("Failed to build Slack client")?;
        let refresher = OAuthRefresher::new(&config.spotify, &config.slack, &config.http)
            .context("Failed to build OAuth refresher")?;
        for service in [Service::Spotify, Service::Slack] {
            if !refresher.supports(service) {
                warn!(%service, "No OAuth client configured; expired tokens will need re-authorization");
            }
        }

        let settings = SyncSettings::from_config(&config)?;
        let deps = SyncDependencies {
            repository,
            music: Arc::new(spotify),
            messaging: Arc::new(slack),
            refresher: Arc::new(refresher),
        };

        let mut orchestrator = SyncOrchestrator::new(deps, settings).with_observer(Arc::new(LogObserver));

        let metrics = match &config.metrics.endpoint {
            Some(_) => {
                let registry = Arc::new(MetricsRegistry::new()?);
                orchestrator =
                    orchestrator.with_observer(Arc::new(MetricsObserver::new(registry.clone())));
                Some(registry)
            }
            None => None,
        };

        Ok(Self {
            config,
            db_pool,
            orchestrator,
            metrics,
            shutdown,
        })
    }

    /// Runs the sync loop until the shutdown token is cancelled
    pub async fn run(&self) -> Result<()> {
        if let (Some(metrics), Some(endpoint)) = (&self.metrics, &self.config.metrics.endpoint) {
            let server = MetricsServer::new(metrics.clone(), endpoint)?;
            let token = self.shutdown.child_token();
            tokio::spawn(async move {
                if let Err(e) = server.run(token).await {
                    error!(error = %e, "Metrics server failed");
                }
            });
        }

        // Finish the current tick on shutdown, then return
        let orchestrator = self.orchestrator.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            orchestrator.stop();
        });

        self.orchestrator.run_forever().await;
        self.db_pool.close().await;
        Ok(())
    }

    /// Performs a single pass and returns its summary
    pub async fn run_once(&self) -> Result<TickSummary> {
        let summary = self.orchestrator.run_once().await;
        self.db_pool.close().await;
        let summary = summary?;
        info!(
            users = summary.users,
            failed = summary.failed(),
            "Single pass finished"
        );
        Ok(summary)
    }
}
