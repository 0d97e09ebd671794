//! Process-level orchestration of the spread monitor.
//!
//! Wires config, venue adapters, the supervisor and its observers together,
//! then keeps running until stopped.

mod config;
mod error;
mod logging;
mod stats;

pub use config::ScannerConfig;
pub use error::ScannerError;
pub use logging::LoggingObserver;
pub use stats::{Stats, StatsObserver};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::Venue;
use crate::feeds::{
    BinanceClient, BinanceFeedConfig, BinanceTickerFeed, JupiterFeedConfig, JupiterQuoteFeed,
};
use crate::monitor::{Observer, Supervisor};
use crate::notification::{
    Event, Notifier, NotifyingObserver, OverviewData, ShutdownData, StartupData, TelegramNotifier,
    TelegramNotifierConfig,
};
use crate::storage::{SqliteStorage, SqliteStorageConfig, StorageObserver};

const DEFAULT_OVERVIEW_INTERVAL: Duration = Duration::from_secs(3600);
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Scanner monitors configured symbols across both venues and reports
/// opportunities to the log, Telegram and storage.
pub struct Scanner {
    cfg: Config,
    version: String,
    supervisor: Supervisor,
    binance: BinanceClient,
    jupiter: Arc<JupiterQuoteFeed>,
    notifier: Option<Arc<TelegramNotifier>>,
    storage: Option<Arc<StorageObserver>>,
    stats: Arc<StatsObserver>,

    // Runtime state
    started_at: Mutex<Option<Instant>>,
    running: Mutex<bool>,
}

impl Scanner {
    /// Creates a new Scanner: builds adapters, the evaluator and the optional
    /// notifier and storage.
    pub async fn new(cfg: ScannerConfig) -> Result<Self, ScannerError> {
        let app = cfg.app_config;

        let evaluator = app.monitor.evaluator()?;

        let binance_config = BinanceFeedConfig::from_config(app.venues.binance.as_ref());
        let binance = BinanceClient::new(
            binance_config.rest_url.clone(),
            binance_config.quote_asset.clone(),
        )?;
        let venue_a = Arc::new(BinanceTickerFeed::new(binance_config));
        let jupiter = Arc::new(JupiterQuoteFeed::new(JupiterFeedConfig::from_config(
            &app.venues.jupiter,
        ))?);

        let supervisor = Supervisor::new(venue_a, jupiter.clone(), evaluator);

        let mut notifier = None;
        if let Some(telegram) = app.telegram() {
            if telegram.enabled && !telegram.bot_token.is_empty() && !telegram.chat_id.is_empty() {
                match TelegramNotifier::new(TelegramNotifierConfig::from_config(telegram)) {
                    Ok(n) => {
                        notifier = Some(Arc::new(n));
                        info!("Telegram notifier created");
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to create Telegram notifier");
                    }
                }
            }
        }

        let storage = match app.storage.as_ref().filter(|s| s.enabled) {
            Some(section) => {
                let sqlite = SqliteStorage::new(SqliteStorageConfig::from_config(section)).await?;
                Some(Arc::new(StorageObserver::new(Arc::new(sqlite))))
            }
            None => None,
        };

        Ok(Self {
            cfg: app,
            version: cfg.version,
            supervisor,
            binance,
            jupiter,
            notifier,
            storage,
            stats: Arc::new(StatsObserver::new()),
            started_at: Mutex::new(None),
            running: Mutex::new(false),
        })
    }

    /// Starts monitoring and runs until [`Scanner::stop`] is called.
    pub async fn start(&self) -> Result<(), ScannerError> {
        {
            let mut running = self.running.lock().await;
            if *running {
                return Err(ScannerError::AlreadyRunning);
            }
            *running = true;
        }

        *self.started_at.lock().await = Some(Instant::now());

        let symbols = self.resolve_symbols().await?;
        if symbols.is_empty() {
            return Err(ScannerError::NoSymbols);
        }

        let evaluator = self.supervisor.evaluator();
        info!(
            version = %self.version,
            symbols = ?symbols,
            notional = %evaluator.notional(),
            min_profit_percent = %evaluator.min_profit_percent(),
            "Starting spread monitor"
        );

        self.send_notification(Event::startup(StartupData {
            version: self.version.clone(),
            venues: vec![
                Venue::VenueA.label().to_string(),
                Venue::VenueB.label().to_string(),
            ],
            symbols: symbols.clone(),
            min_profit_percent: evaluator.min_profit_percent(),
            notional: evaluator.notional(),
        }))
        .await;

        for observer in self.observers() {
            self.supervisor.register_observer(observer);
        }
        info!(observers = self.supervisor.observer_count(), "Observers registered");

        let report = self
            .supervisor
            .start_monitoring(symbols, Arc::new(LoggingObserver))
            .await;

        if !report.is_success() {
            for (symbol, e) in &report.failed {
                warn!(symbol = %symbol, error = %e, "Symbol not monitored");
            }
        }
        if report.started.is_empty() && report.already_active.is_empty() {
            return Err(ScannerError::NothingStarted);
        }

        self.run_main_loop().await;
        Ok(())
    }

    /// Stops monitoring, sends the shutdown notification and closes outputs.
    pub async fn stop(&self, reason: &str) {
        {
            let mut running = self.running.lock().await;
            if !*running {
                return;
            }
            *running = false;
        }

        info!(reason = %reason, "Stopping scanner...");

        self.supervisor.stop_monitoring().await;

        let uptime = self.uptime().await;

        self.send_notification(Event::shutdown(ShutdownData {
            reason: reason.to_string(),
            uptime,
            graceful: true,
        }))
        .await;

        if let Some(ref notifier) = self.notifier {
            if let Err(e) = notifier.close().await {
                warn!(error = %e, "Failed to close notifier");
            }
        }

        if let Some(ref storage) = self.storage {
            if let Err(e) = storage.close().await {
                warn!(error = %e, "Failed to close storage");
            }
        }

        let stats = self.stats();
        info!(
            uptime = ?uptime,
            opportunities = stats.opportunities,
            feed_errors = stats.feed_errors,
            "Scanner stopped"
        );
    }

    /// Returns a copy of the current statistics.
    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    /// Returns true if the scanner is currently running.
    pub async fn is_running(&self) -> bool {
        *self.running.lock().await
    }

    /// Returns how long the scanner has been running.
    pub async fn uptime(&self) -> Duration {
        self.started_at
            .lock()
            .await
            .map(|s| s.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Symbols from config, or every venue A base asset that venue B can quote.
    async fn resolve_symbols(&self) -> Result<Vec<String>, ScannerError> {
        if !self.cfg.symbols.is_empty() {
            return Ok(self.cfg.symbols.clone());
        }

        let assets = self.binance.tradable_base_assets().await?;
        let symbols = select_supported(assets, |s| self.jupiter.supports(s));

        info!(count = symbols.len(), symbols = ?symbols, "Discovered symbols");
        Ok(symbols)
    }

    /// Observers registered besides the logging one.
    fn observers(&self) -> Vec<Arc<dyn Observer>> {
        let mut observers: Vec<Arc<dyn Observer>> = vec![self.stats.clone()];
        if let Some(ref notifier) = self.notifier {
            observers.push(Arc::new(NotifyingObserver::new(notifier.clone())));
        }
        if let Some(ref storage) = self.storage {
            observers.push(storage.clone());
        }
        observers
    }

    /// Periodic overview and status logging until stopped.
    async fn run_main_loop(&self) {
        let overview_interval = self
            .cfg
            .telegram()
            .map(|t| t.overview_interval)
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_OVERVIEW_INTERVAL);

        let mut overview_timer =
            tokio::time::interval_at(tokio::time::Instant::now() + overview_interval, overview_interval);
        let mut status_timer = tokio::time::interval_at(
            tokio::time::Instant::now() + STATUS_LOG_INTERVAL,
            STATUS_LOG_INTERVAL,
        );

        info!(overview_interval = ?overview_interval, "Monitoring running");

        loop {
            tokio::select! {
                _ = status_timer.tick() => {
                    if !self.is_running().await {
                        break;
                    }
                    let stats = self.stats();
                    let active = self.supervisor.active_symbols().await;
                    for symbol in &active {
                        if let Some(coordinator) = self.supervisor.coordinator(symbol).await {
                            debug!(
                                symbol = %symbol,
                                state = %coordinator.state(),
                                evaluations = coordinator.evaluations(),
                                "Symbol status"
                            );
                        }
                    }
                    info!(
                        active_symbols = active.len(),
                        evaluations = self.supervisor.evaluations().await,
                        opportunities = stats.opportunities,
                        feed_errors = stats.feed_errors,
                        "Monitor status"
                    );
                }
                _ = overview_timer.tick() => {
                    if !self.is_running().await {
                        break;
                    }
                    self.send_overview().await;
                }
            }
        }
    }

    /// Sends a notification event if notifier is configured.
    async fn send_notification(&self, event: Event) {
        if let Some(ref notifier) = self.notifier {
            if let Err(e) = notifier.send(&event).await {
                warn!(
                    event_type = %event.event_type,
                    error = %e,
                    "Failed to send notification"
                );
            }
        }
    }

    /// Sends a periodic overview notification with current stats.
    async fn send_overview(&self) {
        let stats = self.stats();

        self.send_notification(Event::overview(OverviewData {
            uptime: self.uptime().await,
            active_symbols: self.supervisor.active_symbols().await.len(),
            evaluations: self.supervisor.evaluations().await,
            opportunities: stats.opportunities,
            feed_errors: stats.feed_errors,
            start_failures: stats.start_failures,
            best_net_profit_percent: stats.best_net_profit_percent,
        }))
        .await;
    }
}

/// Keeps the assets `supported` accepts, uppercased, sorted and deduplicated.
fn select_supported(assets: Vec<String>, supported: impl Fn(&str) -> bool) -> Vec<String> {
    let mut symbols: Vec<String> = assets
        .into_iter()
        .map(|a| a.to_uppercase())
        .filter(|a| supported(a))
        .collect();
    symbols.sort();
    symbols.dedup();
    symbols
}
