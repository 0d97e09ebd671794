//! Per-symbol coordinator: two feed subscriptions, one serialized state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::{MonitorError, MonitorEvent, Observer};
use crate::arbitrage::Evaluator;
use crate::domain::{PriceSample, Venue};
use crate::feeds::{FeedAdapter, FeedEvent, FeedSink, SubscriptionHandle};

/// Lifecycle of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No subscriptions held.
    Idle,
    /// Opening the two feed subscriptions.
    Subscribing,
    /// Both feeds subscribed; every sample is evaluated.
    Active,
    /// Releasing subscriptions and discarding state.
    Stopping,
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorState::Idle => write!(f, "idle"),
            CoordinatorState::Subscribing => write!(f, "subscribing"),
            CoordinatorState::Active => write!(f, "active"),
            CoordinatorState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Resources held while active.
struct Running {
    subscriptions: Vec<(Arc<dyn FeedAdapter>, SubscriptionHandle)>,
    shutdown: oneshot::Sender<()>,
    worker: JoinHandle<()>,
}

/// SymbolCoordinator keeps the latest price from each venue for one symbol
/// and evaluates the pair on every inbound sample.
///
/// Both adapters push into a single channel drained by one worker task, which
/// exclusively owns the symbol's price slots. Samples from one venue are
/// applied in delivery order; nothing orders them against the other venue.
pub struct SymbolCoordinator {
    symbol: String,
    venue_a: Arc<dyn FeedAdapter>,
    venue_b: Arc<dyn FeedAdapter>,
    evaluator: Arc<Evaluator>,
    sink: Arc<dyn Observer>,
    state: Mutex<CoordinatorState>,
    /// Bumped by every stop; a start that sees it change gives up.
    stop_requests: AtomicU64,
    running: tokio::sync::Mutex<Option<Running>>,
    evaluations: Arc<AtomicU64>,
}

impl SymbolCoordinator {
    pub fn new(
        symbol: impl Into<String>,
        venue_a: Arc<dyn FeedAdapter>,
        venue_b: Arc<dyn FeedAdapter>,
        evaluator: Arc<Evaluator>,
        sink: Arc<dyn Observer>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            venue_a,
            venue_b,
            evaluator,
            sink,
            state: Mutex::new(CoordinatorState::Idle),
            stop_requests: AtomicU64::new(0),
            running: tokio::sync::Mutex::new(None),
            evaluations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of evaluations run so far, one per applied sample.
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: CoordinatorState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Opens both feed subscriptions and starts evaluating.
    ///
    /// Waits for subscription setup only, not for a first price. If either
    /// subscription fails, the other one is released and the coordinator stays
    /// idle. Starting an active coordinator is a no-op.
    pub async fn start(&self) -> Result<(), MonitorError> {
        let epoch = self.stop_requests.load(Ordering::SeqCst);
        let mut running = self.running.lock().await;

        if running.is_some() {
            debug!(symbol = %self.symbol, "already active");
            return Ok(());
        }
        if self.stop_requested_since(epoch) {
            return Err(MonitorError::Cancelled {
                symbol: self.symbol.clone(),
            });
        }

        self.set_state(CoordinatorState::Subscribing);
        debug!(symbol = %self.symbol, "subscribing to feeds");

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut handle_a = match self
            .subscribe(&self.venue_a, events_tx.clone())
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                self.set_state(CoordinatorState::Idle);
                return Err(e);
            }
        };

        let mut handle_b = match self
            .subscribe(&self.venue_b, events_tx)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                self.venue_a.unsubscribe(&mut handle_a).await;
                self.set_state(CoordinatorState::Idle);
                return Err(e);
            }
        };

        if self.stop_requested_since(epoch) {
            info!(symbol = %self.symbol, "stop issued while subscribing, releasing feeds");
            self.venue_a.unsubscribe(&mut handle_a).await;
            self.venue_b.unsubscribe(&mut handle_b).await;
            self.set_state(CoordinatorState::Idle);
            return Err(MonitorError::Cancelled {
                symbol: self.symbol.clone(),
            });
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = tokio::spawn(run_worker(
            self.symbol.clone(),
            events_rx,
            shutdown_rx,
            self.evaluator.clone(),
            self.sink.clone(),
            self.evaluations.clone(),
        ));

        *running = Some(Running {
            subscriptions: vec![
                (self.venue_a.clone(), handle_a),
                (self.venue_b.clone(), handle_b),
            ],
            shutdown: shutdown_tx,
            worker,
        });
        self.set_state(CoordinatorState::Active);

        info!(
            symbol = %self.symbol,
            venue_a = %self.venue_a.name(),
            venue_b = %self.venue_b.name(),
            "monitoring started"
        );

        Ok(())
    }

    /// Releases both subscriptions and discards the price slots.
    ///
    /// When this returns, no further evaluation or forward happens for the
    /// symbol. A stop issued while subscribing waits for subscribing to settle
    /// and then releases everything. Stopping an idle coordinator is a no-op.
    pub async fn stop(&self) {
        self.stop_requests.fetch_add(1, Ordering::SeqCst);
        let mut running = self.running.lock().await;

        let Some(mut run) = running.take() else {
            return;
        };

        self.set_state(CoordinatorState::Stopping);

        for (adapter, handle) in run.subscriptions.iter_mut() {
            debug!(
                symbol = %handle.symbol(),
                venue = %handle.venue(),
                adapter = %adapter.name(),
                "releasing subscription"
            );
            adapter.unsubscribe(handle).await;
        }

        let _ = run.shutdown.send(());
        if let Err(e) = run.worker.await {
            if e.is_panic() {
                error!(symbol = %self.symbol, error = %e, "coordinator worker panicked");
            }
        }

        self.set_state(CoordinatorState::Idle);
        info!(
            symbol = %self.symbol,
            evaluations = self.evaluations(),
            "monitoring stopped"
        );
    }

    fn stop_requested_since(&self, epoch: u64) -> bool {
        self.stop_requests.load(Ordering::SeqCst) != epoch
    }

    async fn subscribe(
        &self,
        adapter: &Arc<dyn FeedAdapter>,
        events: mpsc::UnboundedSender<FeedEvent>,
    ) -> Result<SubscriptionHandle, MonitorError> {
        let venue = adapter.venue();
        let sink = FeedSink::new(venue, self.symbol.clone(), events);

        adapter.subscribe(&self.symbol, sink).await.map_err(|e| {
            error!(
                symbol = %self.symbol,
                venue = %venue,
                adapter = %adapter.name(),
                error = %e,
                "feed subscription failed"
            );
            MonitorError::SubscriptionFailed {
                symbol: self.symbol.clone(),
                venue,
                source: e,
            }
        })
    }
}

/// Latest known price of one venue.
#[derive(Debug, Default)]
struct Slot {
    latest: Option<PriceSample>,
    degraded: bool,
}

/// Price slots of one symbol. Owned by the worker task only.
#[derive(Debug, Default)]
struct SymbolState {
    venue_a: Slot,
    venue_b: Slot,
}

impl SymbolState {
    fn slot_mut(&mut self, venue: Venue) -> &mut Slot {
        match venue {
            Venue::VenueA => &mut self.venue_a,
            Venue::VenueB => &mut self.venue_b,
        }
    }
}

/// Single writer for a symbol's state: applies events in arrival order and
/// evaluates after every sample.
async fn run_worker(
    symbol: String,
    mut events: mpsc::UnboundedReceiver<FeedEvent>,
    mut shutdown: oneshot::Receiver<()>,
    evaluator: Arc<Evaluator>,
    sink: Arc<dyn Observer>,
    evaluations: Arc<AtomicU64>,
) {
    let mut state = SymbolState::default();

    loop {
        let event = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            FeedEvent::Sample(sample) => {
                let venue = sample.venue;
                let slot = state.slot_mut(venue);
                // Later samples always win.
                slot.latest = Some(sample);
                if slot.degraded {
                    slot.degraded = false;
                    info!(symbol = %symbol, venue = %venue, "feed recovered");
                    sink.notify(MonitorEvent::FeedRecovered {
                        symbol: symbol.clone(),
                        venue,
                    });
                }

                evaluations.fetch_add(1, Ordering::SeqCst);
                match evaluator.evaluate(state.venue_a.latest.as_ref(), state.venue_b.latest.as_ref()) {
                    Ok(Some(opportunity)) => {
                        debug!(
                            symbol = %symbol,
                            buy = %opportunity.buy_venue,
                            sell = %opportunity.sell_venue,
                            net_profit_percent = %opportunity.net_profit_percent,
                            "opportunity found"
                        );
                        sink.notify(MonitorEvent::Opportunity(opportunity));
                    }
                    Ok(None) => {
                        trace!(symbol = %symbol, venue = %venue, "no opportunity");
                    }
                    Err(e) => {
                        error!(symbol = %symbol, error = %e, "evaluation failed");
                    }
                }
            }
            FeedEvent::Error { venue, message } => {
                let slot = state.slot_mut(venue);
                slot.latest = None;
                if slot.degraded {
                    debug!(symbol = %symbol, venue = %venue, error = %message, "feed still degraded");
                    continue;
                }
                slot.degraded = true;

                warn!(symbol = %symbol, venue = %venue, error = %message, "feed degraded");
                sink.notify(MonitorEvent::FeedDegraded {
                    symbol: symbol.clone(),
                    venue,
                    error: message,
                });
            }
        }
    }

    debug!(symbol = %symbol, "coordinator worker stopped");
}
