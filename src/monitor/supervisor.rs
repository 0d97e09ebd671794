//! Supervisor owns the set of running symbol coordinators.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{MonitorError, MonitorEvent, Observer, ObserverRegistry, SymbolCoordinator};
use crate::arbitrage::Evaluator;
use crate::feeds::FeedAdapter;

/// Outcome of one `start_monitoring` call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StartReport {
    /// Symbols whose coordinator was created and started by this call.
    pub started: Vec<String>,
    /// Symbols that were already being monitored.
    pub already_active: Vec<String>,
    /// Symbols whose start failed. They are not in the active set.
    pub failed: Vec<(String, MonitorError)>,
}

impl StartReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Supervisor starts and stops one [`SymbolCoordinator`] per symbol and
/// forwards every event from every coordinator to all registered observers.
pub struct Supervisor {
    venue_a: Arc<dyn FeedAdapter>,
    venue_b: Arc<dyn FeedAdapter>,
    evaluator: Arc<Evaluator>,
    observers: Arc<ObserverRegistry>,
    coordinators: Mutex<HashMap<String, Arc<SymbolCoordinator>>>,
}

impl Supervisor {
    pub fn new(
        venue_a: Arc<dyn FeedAdapter>,
        venue_b: Arc<dyn FeedAdapter>,
        evaluator: Evaluator,
    ) -> Self {
        Self {
            venue_a,
            venue_b,
            evaluator: Arc::new(evaluator),
            observers: Arc::new(ObserverRegistry::new()),
            coordinators: Mutex::new(HashMap::new()),
        }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Registers an observer without starting anything.
    /// Returns false if it was already registered.
    pub fn register_observer(&self, observer: Arc<dyn Observer>) -> bool {
        self.observers.register(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Starts monitoring every symbol that is not already active and
    /// registers `observer`.
    ///
    /// Symbols are started concurrently. Starting an active symbol is a no-op.
    /// A symbol that fails to start is reported once, both in the returned
    /// report and as [`MonitorEvent::StartFailed`], and is not kept.
    pub async fn start_monitoring<I, S>(&self, symbols: I, observer: Arc<dyn Observer>) -> StartReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observers.register(observer);

        let requested: BTreeSet<String> = symbols.into_iter().map(Into::into).collect();
        let mut report = StartReport::default();
        let mut pending = Vec::new();

        {
            let mut coordinators = self.coordinators.lock().await;
            for symbol in requested {
                if coordinators.contains_key(&symbol) {
                    debug!(symbol = %symbol, "symbol already monitored");
                    report.already_active.push(symbol);
                    continue;
                }

                let sink: Arc<dyn Observer> = self.observers.clone();
                let coordinator = Arc::new(SymbolCoordinator::new(
                    symbol.clone(),
                    self.venue_a.clone(),
                    self.venue_b.clone(),
                    self.evaluator.clone(),
                    sink,
                ));
                coordinators.insert(symbol, coordinator.clone());
                pending.push(coordinator);
            }
        }

        let results = join_all(pending.iter().map(|coordinator| coordinator.start())).await;

        for (coordinator, result) in pending.into_iter().zip(results) {
            let symbol = coordinator.symbol().to_string();
            match result {
                Ok(()) => {
                    if self.is_current(&coordinator).await {
                        report.started.push(symbol);
                    } else {
                        // Removed by a stop while starting.
                        coordinator.stop().await;
                    }
                }
                Err(MonitorError::Cancelled { .. }) => {
                    debug!(symbol = %symbol, "start cancelled by stop");
                    self.remove_if_current(&coordinator).await;
                }
                Err(e) => {
                    self.remove_if_current(&coordinator).await;
                    warn!(symbol = %symbol, error = %e, "failed to start monitoring");
                    self.observers.notify(MonitorEvent::StartFailed {
                        symbol: symbol.clone(),
                        error: e.to_string(),
                    });
                    report.failed.push((symbol, e));
                }
            }
        }

        info!(
            started = report.started.len(),
            already_active = report.already_active.len(),
            failed = report.failed.len(),
            "start monitoring finished"
        );

        report
    }

    /// Stops every coordinator, releases all subscriptions and clears the
    /// observer registry. Safe to call repeatedly.
    pub async fn stop_monitoring(&self) {
        let drained: Vec<Arc<SymbolCoordinator>> = {
            let mut coordinators = self.coordinators.lock().await;
            coordinators.drain().map(|(_, c)| c).collect()
        };

        if !drained.is_empty() {
            info!(symbols = drained.len(), "stopping monitoring");
        }

        join_all(drained.iter().map(|coordinator| coordinator.stop())).await;
        self.observers.clear();
    }

    /// Symbols currently in the active set, sorted.
    pub async fn active_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.coordinators.lock().await.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    #[allow(dead_code)]
    pub async fn is_active(&self, symbol: &str) -> bool {
        self.coordinators.lock().await.contains_key(symbol)
    }

    /// Evaluations run by all active coordinators.
    pub async fn evaluations(&self) -> u64 {
        self.coordinators
            .lock()
            .await
            .values()
            .map(|c| c.evaluations())
            .sum()
    }

    pub async fn coordinator(&self, symbol: &str) -> Option<Arc<SymbolCoordinator>> {
        self.coordinators.lock().await.get(symbol).cloned()
    }

    async fn is_current(&self, coordinator: &Arc<SymbolCoordinator>) -> bool {
        self.coordinator(coordinator.symbol())
            .await
            .is_some_and(|c| Arc::ptr_eq(&c, coordinator))
    }

    async fn remove_if_current(&self, coordinator: &Arc<SymbolCoordinator>) {
        let mut coordinators = self.coordinators.lock().await;
        if coordinators
            .get(coordinator.symbol())
            .is_some_and(|c| Arc::ptr_eq(c, coordinator))
        {
            coordinators.remove(coordinator.symbol());
        }
    }
}
