//! Application wiring.
//!
//! Builds the ledger, snapshot cache, HTTP sources, executor and
//! notifier from the effective configuration, then runs the dual-loop
//! engine until Ctrl-C.

use crate::config::{apply_settings, AppConfig, ExecutionMode, NotifierMode};
use crate::error::{AppError, AppResult};
use martin_detector::{MomentumConfig, MomentumOracle};
use martin_engine::{Collaborators, Orchestrator};
use martin_executor::{
    Executor, HmacSigner, LiveExecutor, LiveExecutorConfig, PaperExecutor,
};
use martin_feed::{SnapshotCache, SnapshotWorker};
use martin_ledger::Ledger;
use martin_notify::{
    decision_channel, DecisionSender, LogNotifier, Notifier, WebhookNotifier,
};
use martin_sources::{
    HttpCandleSource, HttpMarketCatalog, HttpOrderBook, NoopSigner, RequestSigner,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The assembled application.
pub struct App {
    config: AppConfig,
    ledger: Arc<Ledger>,
    /// Held open for chat-side integrations to clone; dropping it would
    /// close the decision stream.
    _decision_tx: DecisionSender,
}

impl App {
    /// Build the application from a loaded config file.
    ///
    /// Settings rows stored in the ledger override file and environment
    /// values, so `pause`/`set` survive restarts.
    pub fn build(file_config: AppConfig) -> AppResult<(Self, AppRun)> {
        let ledger = Arc::new(Ledger::open(&file_config.ledger.path)?);
        let settings = ledger.settings()?;
        let config = apply_settings(file_config, &settings);
        config.validate()?;

        let cache = Arc::new(SnapshotCache::new());

        let catalog = Arc::new(HttpMarketCatalog::new(&config.sources.catalog_url)?);
        let candles = Arc::new(HttpCandleSource::new(&config.sources.candles_url)?);

        let book_signer: Box<dyn RequestSigner> = match config.execution.mode {
            ExecutionMode::Paper => Box::new(NoopSigner),
            ExecutionMode::Live => Box::new(
                HmacSigner::new(&config.execution.api_key, &config.execution.api_secret)
                    .map_err(AppError::Config)?,
            ),
        };
        let book = Arc::new(HttpOrderBook::new(&config.sources.book_url, book_signer)?);

        let executor: Arc<dyn Executor> = match config.execution.mode {
            ExecutionMode::Paper => Arc::new(PaperExecutor::new(config.trading.price_cap)),
            ExecutionMode::Live => Arc::new(LiveExecutor::new(
                book.clone(),
                LiveExecutorConfig::default(),
            )),
        };

        let notifier: Arc<dyn Notifier> = match config.notifier.mode {
            NotifierMode::Log => Arc::new(LogNotifier),
            NotifierMode::Webhook => Arc::new(WebhookNotifier::new(&config.notifier.webhook_url)
                .map_err(|e| AppError::Config(e.to_string()))?),
        };

        let oracle = Arc::new(
            MomentumOracle::new(MomentumConfig::default())
                .map_err(|e| AppError::Config(e.to_string()))?,
        );

        let orchestrator = Arc::new(Orchestrator::new(
            config.engine_config()?,
            config.day_night.policy.clone(),
            config.rolling_quantile.clone(),
            ledger.clone(),
            cache.clone(),
            Collaborators {
                catalog,
                book,
                settlement: Arc::new(HttpMarketCatalog::new(&config.sources.catalog_url)?),
                oracle,
                executor,
                notifier,
            },
        )?);

        let snapshot_worker =
            SnapshotWorker::new(config.snapshot_config(), candles, cache.clone());

        let (decision_tx, decision_rx) = decision_channel(64);

        let app = Self {
            config,
            ledger,
            _decision_tx: decision_tx,
        };
        let run = AppRun {
            orchestrator,
            snapshot_worker,
            decision_rx,
        };
        Ok((app, run))
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// The runnable half: engine tasks plus the decision intake.
pub struct AppRun {
    orchestrator: Arc<Orchestrator>,
    snapshot_worker: SnapshotWorker,
    decision_rx: martin_notify::DecisionReceiver,
}

impl AppRun {
    /// Run until Ctrl-C; the in-flight cycle finishes before exit.
    pub async fn run(self) -> AppResult<()> {
        let shutdown = CancellationToken::new();

        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
                signal_token.cancel();
            }
        });

        martin_engine::run(
            self.orchestrator,
            self.snapshot_worker,
            self.decision_rx,
            shutdown,
        )
        .await;
        Ok(())
    }
}
