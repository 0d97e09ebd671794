//! Telegram notifications for monitor events and lifecycle.

mod notifier;
mod observer;
mod telegram;

pub use notifier::{
    ErrorData, Event, EventType, NotificationError, Notifier, OpportunityData,
    OverviewData, ShutdownData, StartupData, format_event,
};
pub use observer::NotifyingObserver;
pub use telegram::{TelegramNotifier, TelegramNotifierConfig};
