use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::domain::Opportunity;

/// Тип события уведомления
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Обнаружена арбитражная возможность
    Opportunity,
    /// Деградация фида или ошибка запуска символа
    Error,
    /// Монитор запущен
    Startup,
    /// Монитор остановлен
    Shutdown,
    /// Периодический обзор статистики
    Overview,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Opportunity => write!(f, "opportunity"),
            EventType::Error => write!(f, "error"),
            EventType::Startup => write!(f, "startup"),
            EventType::Shutdown => write!(f, "shutdown"),
            EventType::Overview => write!(f, "overview"),
        }
    }
}

/// Данные об арбитражной возможности
#[derive(Debug, Clone)]
pub struct OpportunityData {
    pub symbol: String,
    pub buy_venue: String,
    pub sell_venue: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub spread_percent: Decimal,
    pub quantity: Decimal,
    pub total_fees: Decimal,
    pub net_profit: Decimal,
    pub net_profit_percent: Decimal,
}

impl From<&Opportunity> for OpportunityData {
    fn from(opp: &Opportunity) -> Self {
        Self {
            symbol: opp.symbol.clone(),
            buy_venue: opp.buy_venue.label().to_string(),
            sell_venue: opp.sell_venue.label().to_string(),
            buy_price: opp.buy_price,
            sell_price: opp.sell_price,
            spread_percent: opp.spread_percent,
            quantity: opp.quantity,
            total_fees: opp.total_fees,
            net_profit: opp.net_profit,
            net_profit_percent: opp.net_profit_percent,
        }
    }
}

/// Данные об ошибке
#[derive(Debug, Clone)]
pub struct ErrorData {
    pub component: String,
    pub message: String,
    pub error: Option<String>,
}

/// Данные о запуске монитора
#[derive(Debug, Clone)]
pub struct StartupData {
    pub version: String,
    pub venues: Vec<String>,
    pub symbols: Vec<String>,
    pub min_profit_percent: Decimal,
    pub notional: Decimal,
}

/// Данные об остановке монитора
#[derive(Debug, Clone)]
pub struct ShutdownData {
    pub reason: String,
    pub uptime: Duration,
    pub graceful: bool,
}

/// Данные периодического обзора
#[derive(Debug, Clone)]
pub struct OverviewData {
    pub uptime: Duration,
    pub active_symbols: usize,
    pub evaluations: u64,
    pub opportunities: u64,
    pub feed_errors: u64,
    pub start_failures: u64,
    pub best_net_profit_percent: Option<Decimal>,
}

/// Данные события
#[derive(Debug, Clone)]
pub enum EventData {
    Opportunity(OpportunityData),
    Error(ErrorData),
    Startup(StartupData),
    Shutdown(ShutdownData),
    Overview(OverviewData),
}

/// Событие уведомления
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub data: EventData,
}

impl Event {
    pub fn new(event_type: EventType, data: EventData) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            data,
        }
    }

    pub fn opportunity(data: OpportunityData) -> Self {
        Self::new(EventType::Opportunity, EventData::Opportunity(data))
    }

    pub fn error(data: ErrorData) -> Self {
        Self::new(EventType::Error, EventData::Error(data))
    }

    pub fn startup(data: StartupData) -> Self {
        Self::new(EventType::Startup, EventData::Startup(data))
    }

    pub fn shutdown(data: ShutdownData) -> Self {
        Self::new(EventType::Shutdown, EventData::Shutdown(data))
    }

    pub fn overview(data: OverviewData) -> Self {
        Self::new(EventType::Overview, EventData::Overview(data))
    }
}

/// Трейт для отправки уведомлений
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Отправить уведомление и дождаться результата
    async fn send(&self, event: &Event) -> Result<(), NotificationError>;

    /// Поставить уведомление в очередь (без блокировки)
    fn send_async(&self, event: Event);

    /// Проверить, включены ли уведомления для данного типа событий
    fn is_enabled(&self, event_type: EventType) -> bool;

    /// Закрыть notifier, дождавшись отправки очереди
    async fn close(&self) -> Result<(), NotificationError>;
}

/// Ошибка уведомления
#[derive(Debug, Clone, Error)]
#[error("NotificationError: {message}")]
pub struct NotificationError {
    pub message: String,
}

impl NotificationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// === Функции форматирования ===

/// Форматирует арбитражную возможность
pub fn format_opportunity(data: &OpportunityData) -> String {
    format!(
        "🔔 *Арбитражная возможность*\n\n\
         💰 Чистая прибыль: *{:.2}%* (${:.2})\n\
         📐 Спред: {:.2}%\n\n\
         Токен: #{}\n\
         Покупка: {} @ ${:.4}\n\
         Продажа: {} @ ${:.4}\n\
         Количество: {:.6} {}\n\
         Комиссии: ${:.4}\n\n\
         ⏰ {}",
        data.net_profit_percent,
        data.net_profit,
        data.spread_percent,
        data.symbol,
        data.buy_venue,
        data.buy_price,
        data.sell_venue,
        data.sell_price,
        data.quantity,
        data.symbol,
        data.total_fees,
        Utc::now().format("%H:%M:%S UTC")
    )
}

/// Форматирует ошибку
pub fn format_error(data: &ErrorData) -> String {
    let error_str = data
        .error
        .as_ref()
        .map(|e| format!("\nОшибка: {}", e))
        .unwrap_or_default();

    format!(
        "⚠️ *Ошибка*\n\n\
         Компонент: {}\n\
         Сообщение: {}{}\n\n\
         ⏰ {}",
        data.component,
        data.message,
        error_str,
        Utc::now().format("%H:%M:%S UTC")
    )
}

/// Форматирует запуск монитора
pub fn format_startup(data: &StartupData) -> String {
    format!(
        "🤖 *Монитор запущен*\n\n\
         Версия: {}\n\
         Площадки: {}\n\
         Токены: {}\n\
         Порог прибыли: {}%\n\
         Объем сделки: ${}\n\n\
         ⏰ {}",
        data.version,
        data.venues.join(" ↔ "),
        data.symbols.join(", "),
        data.min_profit_percent,
        data.notional,
        Utc::now().format("%H:%M:%S UTC")
    )
}

/// Форматирует остановку монитора
pub fn format_shutdown(data: &ShutdownData) -> String {
    let status = if data.graceful {
        "✅ Graceful"
    } else {
        "⚠️ Forced"
    };

    format!(
        "🛑 *Монитор остановлен*\n\n\
         Причина: {}\n\
         Статус: {}\n\
         Время работы: {}\n\n\
         ⏰ {}",
        data.reason,
        status,
        format_duration(data.uptime),
        Utc::now().format("%H:%M:%S UTC")
    )
}

/// Форматирует периодический обзор
pub fn format_overview(data: &OverviewData) -> String {
    let best = data
        .best_net_profit_percent
        .map(|p| format!("{:.2}%", p))
        .unwrap_or_else(|| "—".to_string());

    format!(
        "📊 *Обзор мониторинга*\n\n\
         ⏱ Время работы: {}\n\
         👀 Активных токенов: {}\n\
         🔄 Оценок спреда: {}\n\n\
         📈 Найдено возможностей: {}\n\
         🏆 Лучшая прибыль: {}\n\
         ⚠️ Сбоев фидов: {}\n\
         ❌ Ошибок запуска: {}\n\n\
         ⏰ {}",
        format_duration(data.uptime),
        data.active_symbols,
        add_thousand_separators(data.evaluations),
        data.opportunities,
        best,
        data.feed_errors,
        data.start_failures,
        Utc::now().format("%H:%M:%S UTC")
    )
}

/// Форматирует событие в строку
pub fn format_event(event: &Event) -> String {
    match &event.data {
        EventData::Opportunity(data) => format_opportunity(data),
        EventData::Error(data) => format_error(data),
        EventData::Startup(data) => format_startup(data),
        EventData::Shutdown(data) => format_shutdown(data),
        EventData::Overview(data) => format_overview(data),
    }
}

// === Вспомогательные функции ===

/// Форматирует длительность
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{}с", secs)
    } else if secs < 3600 {
        format!("{}м {}с", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}ч {}м", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}д {}ч", secs / 86400, (secs % 86400) / 3600)
    }
}

/// Добавляет разделители тысяч
fn add_thousand_separators(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Обрезает текст до `max` байт по границе символа
pub(crate) fn truncate_message(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
