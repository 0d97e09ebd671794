use std::sync::Arc;

use tracing::debug;

use crate::monitor::{MonitorEvent, Observer};
use crate::notification::{ErrorData, Event, Notifier, OpportunityData};

/// Переводит события монитора в уведомления и ставит их в очередь notifier'а
pub struct NotifyingObserver {
    notifier: Arc<dyn Notifier>,
}

impl NotifyingObserver {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

impl Observer for NotifyingObserver {
    fn notify(&self, event: MonitorEvent) {
        let Some(event) = to_notification(&event) else {
            return;
        };
        if self.notifier.is_enabled(event.event_type) {
            self.notifier.send_async(event);
        }
    }
}

/// Событие уведомления для события монитора; восстановление фида не уведомляется
pub(crate) fn to_notification(event: &MonitorEvent) -> Option<Event> {
    match event {
        MonitorEvent::Opportunity(opp) => Some(Event::opportunity(OpportunityData::from(opp))),
        MonitorEvent::FeedDegraded {
            symbol,
            venue,
            error,
        } => Some(Event::error(ErrorData {
            component: format!("feed {}", venue.label()),
            message: format!("Фид {} деградировал, цена устарела", symbol),
            error: Some(error.clone()),
        })),
        MonitorEvent::StartFailed { symbol, error } => Some(Event::error(ErrorData {
            component: "monitor".to_string(),
            message: format!("Не удалось запустить мониторинг {}", symbol),
            error: Some(error.clone()),
        })),
        MonitorEvent::FeedRecovered { symbol, venue } => {
            debug!(symbol = %symbol, venue = %venue, "feed recovery is not notified");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeeModel, PriceSample, Venue};
    use crate::notification::{EventType, NotificationError};
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    struct RecordingNotifier {
        enabled: Vec<EventType>,
        queued: Mutex<Vec<Event>>,
    }

    impl RecordingNotifier {
        fn new(enabled: Vec<EventType>) -> Arc<Self> {
            Arc::new(Self {
                enabled,
                queued: Mutex::new(Vec::new()),
            })
        }

        fn queued_types(&self) -> Vec<EventType> {
            self.queued.lock().unwrap().iter().map(|e| e.event_type).collect()
        }
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, event: &Event) -> Result<(), NotificationError> {
            self.queued.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn send_async(&self, event: Event) {
            self.queued.lock().unwrap().push(event);
        }

        fn is_enabled(&self, event_type: EventType) -> bool {
            self.enabled.contains(&event_type)
        }

        async fn close(&self) -> Result<(), NotificationError> {
            Ok(())
        }
    }

    fn opportunity_event() -> MonitorEvent {
        let a = PriceSample::new(Venue::VenueA, "SOL", Decimal::from(100)).unwrap();
        let b = PriceSample::new(Venue::VenueB, "SOL", Decimal::from(102)).unwrap();
        let opp = crate::arbitrage::Evaluator::new(FeeModel::default(), Decimal::from(1000), Decimal::new(5, 1))
            .unwrap()
            .evaluate(Some(&a), Some(&b))
            .unwrap()
            .unwrap();
        MonitorEvent::Opportunity(opp)
    }

    #[test]
    fn test_forwards_enabled_events() {
        let notifier = RecordingNotifier::new(vec![EventType::Opportunity, EventType::Error]);
        let observer = NotifyingObserver::new(notifier.clone());

        observer.notify(opportunity_event());
        observer.notify(MonitorEvent::FeedDegraded {
            symbol: "SOL".to_string(),
            venue: Venue::VenueB,
            error: "timeout".to_string(),
        });
        observer.notify(MonitorEvent::FeedRecovered {
            symbol: "SOL".to_string(),
            venue: Venue::VenueB,
        });

        assert_eq!(
            notifier.queued_types(),
            vec![EventType::Opportunity, EventType::Error]
        );
    }

    #[test]
    fn test_skips_disabled_events() {
        let notifier = RecordingNotifier::new(vec![EventType::Opportunity]);
        let observer = NotifyingObserver::new(notifier.clone());

        observer.notify(MonitorEvent::StartFailed {
            symbol: "SOL".to_string(),
            error: "refused".to_string(),
        });

        assert!(notifier.queued_types().is_empty());
    }

    #[test]
    fn test_opportunity_uses_venue_labels() {
        let event = to_notification(&opportunity_event()).unwrap();
        match event.data {
            crate::notification::notifier::EventData::Opportunity(data) => {
                assert_eq!(data.symbol, "SOL");
                assert_eq!(data.buy_venue, "BINANCE");
                assert_eq!(data.sell_venue, "SOLANA_DEX");
            }
            other => panic!("unexpected data: {:?}", other),
        }
    }

    #[test]
    fn test_start_failure_is_error_event() {
        let event = to_notification(&MonitorEvent::StartFailed {
            symbol: "JUP".to_string(),
            error: "refused".to_string(),
        })
        .unwrap();
        assert_eq!(event.event_type, EventType::Error);
    }
}
