use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Barrier, Notify, oneshot};

use super::coordinator::CoordinatorState;
use super::*;
use crate::arbitrage::{DEFAULT_MIN_PROFIT_PERCENT, Evaluator};
use crate::domain::{FeeModel, Venue};
use crate::feeds::{FeedAdapter, FeedError, FeedSink, SubscriptionHandle};

// ==================== Helpers ====================

struct MockFeed {
    venue: Venue,
    fail: AtomicBool,
    gate: Option<Arc<Notify>>,
    subscribed: AtomicUsize,
    released: Arc<AtomicUsize>,
    sinks: Mutex<Vec<FeedSink>>,
}

impl MockFeed {
    fn new(venue: Venue) -> Arc<Self> {
        Arc::new(Self {
            venue,
            fail: AtomicBool::new(false),
            gate: None,
            subscribed: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
            sinks: Mutex::new(Vec::new()),
        })
    }

    fn failing(venue: Venue) -> Arc<Self> {
        let feed = Self::new(venue);
        feed.fail.store(true, Ordering::SeqCst);
        feed
    }

    fn gated(venue: Venue, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            venue,
            fail: AtomicBool::new(false),
            gate: Some(gate),
            subscribed: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
            sinks: Mutex::new(Vec::new()),
        })
    }

    fn sink(&self, symbol: &str) -> FeedSink {
        self.sinks
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.symbol() == symbol)
            .cloned()
            .expect("no subscription for symbol")
    }

    fn push(&self, symbol: &str, price: i64) -> bool {
        self.push_price(symbol, Decimal::from(price))
    }

    fn push_price(&self, symbol: &str, price: Decimal) -> bool {
        self.sink(symbol).deliver(price, Utc::now())
    }

    fn fail_delivery(&self, symbol: &str, message: &str) -> bool {
        self.sink(symbol).report_error(message)
    }

    fn subscribed(&self) -> usize {
        self.subscribed.load(Ordering::SeqCst)
    }

    fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedAdapter for MockFeed {
    fn venue(&self) -> Venue {
        self.venue
    }

    fn name(&self) -> &str {
        "mock"
    }

    async fn subscribe(&self, symbol: &str, sink: FeedSink) -> crate::feeds::Result<SubscriptionHandle> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(FeedError::Connection("refused".to_string()));
        }
        self.subscribed.fetch_add(1, Ordering::SeqCst);
        self.sinks.lock().unwrap().push(sink);

        let (tx, rx) = oneshot::channel::<()>();
        let released = self.released.clone();
        let task = tokio::spawn(async move {
            let _ = rx.await;
            released.fetch_add(1, Ordering::SeqCst);
        });

        Ok(SubscriptionHandle::new(self.venue, symbol, tx, task))
    }
}

#[derive(Clone, Default)]
struct Collector {
    events: Arc<Mutex<Vec<MonitorEvent>>>,
}

impl Collector {
    fn observer(&self) -> Arc<dyn Observer> {
        let events = self.events.clone();
        Arc::new(move |event: MonitorEvent| events.lock().unwrap().push(event))
    }

    fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }

    fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

fn evaluator() -> Evaluator {
    Evaluator::new(FeeModel::default(), Decimal::from(1000), DEFAULT_MIN_PROFIT_PERCENT).unwrap()
}

fn coordinator(
    symbol: &str,
    a: &Arc<MockFeed>,
    b: &Arc<MockFeed>,
    sink: Arc<dyn Observer>,
) -> SymbolCoordinator {
    SymbolCoordinator::new(symbol, a.clone(), b.clone(), Arc::new(evaluator()), sink)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// Gives spawned tasks a chance to run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ==================== Coordinator ====================

#[tokio::test]
async fn test_coordinator_start_and_stop() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let collector = Collector::default();
    let coord = coordinator("SOL", &a, &b, collector.observer());

    assert_eq!(coord.state(), CoordinatorState::Idle);
    coord.start().await.unwrap();
    assert_eq!(coord.state(), CoordinatorState::Active);
    assert_eq!(a.subscribed(), 1);
    assert_eq!(b.subscribed(), 1);

    coord.stop().await;
    assert_eq!(coord.state(), CoordinatorState::Idle);
    assert_eq!(a.released(), 1);
    assert_eq!(b.released(), 1);
}

#[tokio::test]
async fn test_coordinator_evaluates_every_sample() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let coord = coordinator("SOL", &a, &b, Collector::default().observer());
    coord.start().await.unwrap();

    for i in 0..10 {
        if i % 2 == 0 {
            assert!(a.push("SOL", 100 + i));
        } else {
            assert!(b.push("SOL", 100 + i));
        }
    }

    wait_until(|| coord.evaluations() == 10).await;
    settle().await;
    assert_eq!(coord.evaluations(), 10);

    coord.stop().await;
}

#[tokio::test]
async fn test_coordinator_forwards_opportunity_once() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let collector = Collector::default();
    let coord = coordinator("SOL", &a, &b, collector.observer());
    coord.start().await.unwrap();

    a.push("SOL", 100);
    wait_until(|| coord.evaluations() == 1).await;
    assert_eq!(collector.len(), 0);

    b.push("SOL", 102);
    wait_until(|| collector.len() == 1).await;

    match &collector.events.lock().unwrap()[0] {
        MonitorEvent::Opportunity(opp) => {
            assert_eq!(opp.symbol, "SOL");
            assert_eq!(opp.buy_venue, Venue::VenueA);
            assert_eq!(opp.sell_venue, Venue::VenueB);
            assert_eq!(opp.buy_price, Decimal::from(100));
            assert_eq!(opp.sell_price, Decimal::from(102));
        }
        other => panic!("unexpected event: {:?}", other),
    }

    coord.stop().await;
}

#[tokio::test]
async fn test_coordinator_later_sample_wins() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let collector = Collector::default();
    let coord = coordinator("SOL", &a, &b, collector.observer());
    coord.start().await.unwrap();

    a.push("SOL", 100);
    a.push("SOL", 102);
    b.push("SOL", 102);
    wait_until(|| coord.evaluations() == 3).await;
    settle().await;

    // Equal prices after the overwrite: nothing to forward.
    assert_eq!(collector.len(), 0);

    coord.stop().await;
}

#[tokio::test]
async fn test_coordinator_degraded_feed_flow() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let collector = Collector::default();
    let coord = coordinator("SOL", &a, &b, collector.observer());
    coord.start().await.unwrap();

    a.push("SOL", 100);
    b.push("SOL", 102);
    wait_until(|| collector.len() == 1).await;

    b.fail_delivery("SOL", "quote timeout");
    wait_until(|| collector.len() == 2).await;

    // B is stale: no opportunity even though A keeps updating.
    a.push("SOL", 100);
    wait_until(|| coord.evaluations() == 3).await;
    settle().await;
    assert_eq!(collector.len(), 2);

    b.push("SOL", 102);
    wait_until(|| collector.len() == 4).await;

    assert_eq!(
        collector.kinds(),
        vec!["opportunity", "feed_degraded", "feed_recovered", "opportunity"]
    );
    match &collector.events.lock().unwrap()[1] {
        MonitorEvent::FeedDegraded { symbol, venue, error } => {
            assert_eq!(symbol, "SOL");
            assert_eq!(*venue, Venue::VenueB);
            assert_eq!(error, "quote timeout");
        }
        other => panic!("unexpected event: {:?}", other),
    }

    coord.stop().await;
}

#[tokio::test]
async fn test_coordinator_repeated_errors_degrade_once() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let collector = Collector::default();
    let coord = coordinator("SOL", &a, &b, collector.observer());
    coord.start().await.unwrap();

    b.fail_delivery("SOL", "quote timeout");
    b.fail_delivery("SOL", "quote timeout");
    b.fail_delivery("SOL", "quote timeout");
    a.push("SOL", 100);
    wait_until(|| coord.evaluations() == 1).await;
    settle().await;
    assert_eq!(collector.kinds(), vec!["feed_degraded"]);

    b.push("SOL", 102);
    wait_until(|| collector.len() == 3).await;

    // Healthy again, so the next error is reported.
    b.fail_delivery("SOL", "quote timeout");
    wait_until(|| collector.len() == 4).await;
    settle().await;

    assert_eq!(
        collector.kinds(),
        vec!["feed_degraded", "feed_recovered", "opportunity", "feed_degraded"]
    );

    coord.stop().await;
}

#[tokio::test]
async fn test_coordinator_survives_evaluation_errors() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let collector = Collector::default();
    let evaluator = Evaluator::new(
        FeeModel::default(),
        Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0),
        DEFAULT_MIN_PROFIT_PERCENT,
    )
    .unwrap();
    let coord = SymbolCoordinator::new(
        "SOL",
        a.clone(),
        b.clone(),
        Arc::new(evaluator),
        collector.observer(),
    );
    coord.start().await.unwrap();

    // Quantity overflows for these prices; the evaluation fails.
    a.push_price("SOL", Decimal::new(1, 10));
    b.push_price("SOL", Decimal::new(2, 10));
    a.push("SOL", 100);
    wait_until(|| coord.evaluations() == 3).await;
    settle().await;
    assert_eq!(collector.len(), 0);
    assert_eq!(coord.state(), CoordinatorState::Active);

    b.push("SOL", 102);
    wait_until(|| collector.len() == 1).await;
    assert_eq!(coord.evaluations(), 4);
    assert_eq!(collector.kinds(), vec!["opportunity"]);

    coord.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_coordinator_serializes_concurrent_feeds() {
    const SAMPLES: i64 = 200;

    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let collector = Collector::default();
    let coord = coordinator("SOL", &a, &b, collector.observer());
    coord.start().await.unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let producers: Vec<_> = [(a.clone(), 1000), (b.clone(), 2000)]
        .into_iter()
        .map(|(feed, base)| {
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                for i in 0..SAMPLES {
                    assert!(feed.push("SOL", base + i));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    wait_until(|| coord.evaluations() == 2 * SAMPLES as u64).await;
    settle().await;
    assert_eq!(coord.evaluations(), 2 * SAMPLES as u64);

    let pairs: Vec<(Decimal, Decimal)> = collector
        .events
        .lock()
        .unwrap()
        .iter()
        .map(|event| match event {
            MonitorEvent::Opportunity(opp) => {
                assert_eq!(opp.buy_venue, Venue::VenueA);
                (opp.buy_price, opp.sell_price)
            }
            other => panic!("unexpected event: {:?}", other),
        })
        .collect();

    // Every sample after the first pair is evaluated and forwarded, each
    // against the other venue's latest price.
    assert!(pairs.len() >= SAMPLES as usize);
    for window in pairs.windows(2) {
        let (buy, sell) = window[0];
        let (next_buy, next_sell) = window[1];
        let buy_step = next_buy - buy;
        let sell_step = next_sell - sell;
        assert!(
            (buy_step == Decimal::ONE && sell_step.is_zero())
                || (buy_step.is_zero() && sell_step == Decimal::ONE),
            "pair {:?} does not follow {:?}",
            window[1],
            window[0]
        );
    }
    assert_eq!(
        pairs.last().copied(),
        Some((Decimal::from(1000 + SAMPLES - 1), Decimal::from(2000 + SAMPLES - 1)))
    );

    coord.stop().await;
}

#[tokio::test]
async fn test_coordinator_start_failure_releases_other_side() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::failing(Venue::VenueB);
    let coord = coordinator("SOL", &a, &b, Collector::default().observer());

    let err = coord.start().await.unwrap_err();
    match err {
        MonitorError::SubscriptionFailed { symbol, venue, .. } => {
            assert_eq!(symbol, "SOL");
            assert_eq!(venue, Venue::VenueB);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(coord.state(), CoordinatorState::Idle);
    assert_eq!(a.subscribed(), 1);
    assert_eq!(a.released(), 1);
}

#[tokio::test]
async fn test_coordinator_first_side_failure() {
    let a = MockFeed::failing(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let coord = coordinator("SOL", &a, &b, Collector::default().observer());

    let err = coord.start().await.unwrap_err();
    assert!(matches!(
        err,
        MonitorError::SubscriptionFailed { venue: Venue::VenueA, .. }
    ));
    assert_eq!(b.subscribed(), 0);
    assert_eq!(coord.state(), CoordinatorState::Idle);
}

#[tokio::test]
async fn test_coordinator_double_start_is_noop() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let coord = coordinator("SOL", &a, &b, Collector::default().observer());

    coord.start().await.unwrap();
    coord.start().await.unwrap();

    assert_eq!(a.subscribed(), 1);
    assert_eq!(b.subscribed(), 1);

    coord.stop().await;
}

#[tokio::test]
async fn test_coordinator_stop_is_idempotent() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let coord = coordinator("SOL", &a, &b, Collector::default().observer());

    // Stop on an idle coordinator.
    coord.stop().await;
    assert_eq!(coord.state(), CoordinatorState::Idle);

    coord.start().await.unwrap();
    coord.stop().await;
    coord.stop().await;

    assert_eq!(coord.state(), CoordinatorState::Idle);
    assert_eq!(a.released(), 1);
    assert_eq!(b.released(), 1);
}

#[tokio::test]
async fn test_coordinator_no_forwards_after_stop() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let collector = Collector::default();
    let coord = coordinator("SOL", &a, &b, collector.observer());
    coord.start().await.unwrap();

    a.push("SOL", 100);
    b.push("SOL", 102);
    wait_until(|| collector.len() == 1).await;

    coord.stop().await;
    let evaluations = coord.evaluations();

    assert!(!a.push("SOL", 100));
    assert!(!b.push("SOL", 105));
    settle().await;

    assert_eq!(collector.len(), 1);
    assert_eq!(coord.evaluations(), evaluations);
}

#[tokio::test]
async fn test_coordinator_restart_after_stop() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let collector = Collector::default();
    let coord = coordinator("SOL", &a, &b, collector.observer());

    coord.start().await.unwrap();
    a.push("SOL", 100);
    wait_until(|| coord.evaluations() == 1).await;
    coord.stop().await;

    coord.start().await.unwrap();
    assert_eq!(a.subscribed(), 2);

    // Slots were discarded: a lone B sample evaluates to nothing.
    b.push("SOL", 102);
    wait_until(|| coord.evaluations() == 2).await;
    settle().await;
    assert_eq!(collector.len(), 0);

    coord.stop().await;
}

// ==================== Supervisor ====================

fn supervisor(a: &Arc<MockFeed>, b: &Arc<MockFeed>) -> Arc<Supervisor> {
    Arc::new(Supervisor::new(a.clone(), b.clone(), evaluator()))
}

#[tokio::test]
async fn test_supervisor_starts_each_symbol() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let sup = supervisor(&a, &b);

    let report = sup
        .start_monitoring(["SOL", "BTC"], Collector::default().observer())
        .await;

    assert!(report.is_success());
    assert_eq!(report.started, vec!["BTC".to_string(), "SOL".to_string()]);
    assert_eq!(sup.active_symbols().await, vec!["BTC", "SOL"]);
    assert_eq!(a.subscribed(), 2);
    assert_eq!(b.subscribed(), 2);

    sup.stop_monitoring().await;
}

#[tokio::test]
async fn test_supervisor_double_start_is_noop() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let sup = supervisor(&a, &b);
    let observer = Collector::default().observer();

    sup.start_monitoring(["X"], observer.clone()).await;
    let report = sup.start_monitoring(["X"], observer).await;

    assert!(report.started.is_empty());
    assert_eq!(report.already_active, vec!["X".to_string()]);
    assert_eq!(sup.active_symbols().await, vec!["X"]);
    assert_eq!(a.subscribed(), 1);
    assert_eq!(b.subscribed(), 1);
    assert_eq!(sup.observer_count(), 1);

    sup.stop_monitoring().await;
}

#[tokio::test]
async fn test_supervisor_forwards_to_every_observer_once() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let sup = supervisor(&a, &b);
    let first = Collector::default();
    let second = Collector::default();
    let first_observer = first.observer();

    sup.start_monitoring(["SOL"], first_observer.clone()).await;
    sup.start_monitoring(["SOL"], first_observer).await;
    sup.start_monitoring(["SOL"], second.observer()).await;
    assert_eq!(sup.observer_count(), 2);

    a.push("SOL", 100);
    b.push("SOL", 102);
    wait_until(|| first.len() == 1 && second.len() == 1).await;
    settle().await;
    assert_eq!(sup.evaluations().await, 2);

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);

    sup.stop_monitoring().await;
}

#[tokio::test]
async fn test_supervisor_symbols_are_independent() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let sup = supervisor(&a, &b);
    let collector = Collector::default();

    sup.start_monitoring(["SOL", "ETH"], collector.observer()).await;

    a.push("SOL", 100);
    b.push("ETH", 102);
    settle().await;
    assert_eq!(collector.len(), 0);

    b.push("SOL", 102);
    wait_until(|| collector.len() == 1).await;
    assert_eq!(collector.events.lock().unwrap()[0].symbol(), "SOL");

    sup.stop_monitoring().await;
}

#[tokio::test]
async fn test_supervisor_reports_start_failure() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::failing(Venue::VenueB);
    let sup = supervisor(&a, &b);
    let collector = Collector::default();

    let report = sup.start_monitoring(["SOL"], collector.observer()).await;

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "SOL");
    assert!(!sup.is_active("SOL").await);
    assert_eq!(a.released(), 1);
    assert_eq!(collector.kinds(), vec!["start_failed"]);

    sup.stop_monitoring().await;
}

#[tokio::test]
async fn test_supervisor_stop_releases_everything() {
    let a = MockFeed::new(Venue::VenueA);
    let b = MockFeed::new(Venue::VenueB);
    let sup = supervisor(&a, &b);

    sup.start_monitoring(["SOL", "BTC", "ETH"], Collector::default().observer())
        .await;
    sup.stop_monitoring().await;

    assert!(sup.active_symbols().await.is_empty());
    assert_eq!(sup.observer_count(), 0);
    assert_eq!(a.released(), 3);
    assert_eq!(b.released(), 3);

    // Second stop changes nothing.
    sup.stop_monitoring().await;
    assert_eq!(a.released(), 3);
    assert_eq!(b.released(), 3);
}

#[tokio::test]
async fn test_supervisor_stop_while_subscribing() {
    let gate = Arc::new(Notify::new());
    let a = MockFeed::gated(Venue::VenueA, gate.clone());
    let b = MockFeed::new(Venue::VenueB);
    let sup = supervisor(&a, &b);
    let collector = Collector::default();

    let starting = {
        let sup = sup.clone();
        let observer = collector.observer();
        tokio::spawn(async move { sup.start_monitoring(["X"], observer).await })
    };

    let mut subscribing = false;
    for _ in 0..400 {
        if let Some(coord) = sup.coordinator("X").await {
            if coord.state() == CoordinatorState::Subscribing {
                subscribing = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(subscribing, "coordinator never reached subscribing");

    let stopping = {
        let sup = sup.clone();
        tokio::spawn(async move { sup.stop_monitoring().await })
    };

    // Stop has drained the set and is waiting for subscribing to settle.
    for _ in 0..400 {
        if !sup.is_active("X").await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!stopping.is_finished());

    gate.notify_one();

    let report = starting.await.unwrap();
    stopping.await.unwrap();

    assert!(report.started.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(a.subscribed(), 1);
    assert_eq!(b.subscribed(), 1);
    assert_eq!(a.released(), 1);
    assert_eq!(b.released(), 1);
    assert!(sup.active_symbols().await.is_empty());

    assert!(!a.push("X", 100));
    assert!(!b.push("X", 102));
    settle().await;
    assert_eq!(collector.len(), 0);
}
