use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::notification::notifier::truncate_message;
use crate::notification::{Event, EventType, NotificationError, Notifier, format_event};

const TELEGRAM_API_URL: &str = "https://api.telegram.org/bot";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_MESSAGE_LENGTH: usize = 4096;
const ASYNC_QUEUE_SIZE: usize = 100;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(15);

/// Конфигурация Telegram notifier
#[derive(Debug, Clone)]
pub struct TelegramNotifierConfig {
    /// Токен бота от BotFather
    pub bot_token: String,
    /// ID чата для отправки уведомлений
    pub chat_id: String,
    /// Опциональный ID чата для ошибок
    pub error_chat_id: Option<String>,
    /// Включить уведомления о возможностях
    pub notify_opportunities: bool,
    /// Включить уведомления об ошибках
    pub notify_errors: bool,
    /// Включить периодические обзоры
    pub notify_overview: bool,
}

impl TelegramNotifierConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            error_chat_id: None,
            notify_opportunities: true,
            notify_errors: true,
            notify_overview: true,
        }
    }

    pub fn with_error_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.error_chat_id = Some(chat_id.into());
        self
    }

    /// Собирает конфигурацию из секции `notification.telegram`
    pub fn from_config(config: &crate::config::TelegramConfig) -> Self {
        let mut settings = Self::new(config.bot_token.clone(), config.chat_id.clone());
        if !config.error_chat_id.is_empty() {
            settings = settings.with_error_chat_id(config.error_chat_id.clone());
        }
        settings.notify_opportunities = config.notify_opportunities;
        settings.notify_errors = config.notify_errors;
        settings.notify_overview = config.notify_overview;
        settings
    }

    fn chat_for(&self, event_type: EventType) -> &str {
        match (event_type, &self.error_chat_id) {
            (EventType::Error, Some(chat_id)) => chat_id,
            _ => &self.chat_id,
        }
    }
}

/// Telegram Notifier для отправки уведомлений через Telegram Bot API
pub struct TelegramNotifier {
    config: TelegramNotifierConfig,
    http_client: reqwest::Client,
    api_url: String,
    sender: Mutex<Option<mpsc::Sender<Event>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TelegramNotifier {
    /// Создает новый TelegramNotifier и запускает воркер очереди
    pub fn new(config: TelegramNotifierConfig) -> Result<Self, NotificationError> {
        if config.bot_token.is_empty() {
            return Err(NotificationError::new("bot_token is required"));
        }
        if config.chat_id.is_empty() {
            return Err(NotificationError::new("chat_id is required"));
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| NotificationError::new(format!("Failed to create HTTP client: {}", e)))?;

        let api_url = format!("{}{}", TELEGRAM_API_URL, config.bot_token);

        let (sender, receiver) = mpsc::channel(ASYNC_QUEUE_SIZE);
        let worker = Self::spawn_worker(receiver, config.clone(), http_client.clone(), api_url.clone());

        Ok(Self {
            config,
            http_client,
            api_url,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    fn spawn_worker(
        mut receiver: mpsc::Receiver<Event>,
        config: TelegramNotifierConfig,
        http_client: reqwest::Client,
        api_url: String,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            // Работает, пока не закрыт отправитель; остаток очереди дочитывается
            while let Some(event) = receiver.recv().await {
                let chat_id = config.chat_for(event.event_type);
                let text = format_event(&event);
                if let Err(e) = send_message(&http_client, &api_url, chat_id, &text).await {
                    error!(error = %e, event = %event.event_type, "Failed to send Telegram message");
                }
            }
        })
    }
}

async fn send_message(
    http_client: &reqwest::Client,
    api_url: &str,
    chat_id: &str,
    text: &str,
) -> Result<(), NotificationError> {
    // Обрезаем сообщение если превышает лимит Telegram
    let text = truncate_message(text, MAX_MESSAGE_LENGTH);

    let url = format!("{}/sendMessage", api_url);

    let payload = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
        "parse_mode": "Markdown"
    });

    let response = http_client
        .post(&url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| NotificationError::new(format!("HTTP request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(NotificationError::new(format!(
            "Telegram API error: {} - {}",
            status, body
        )));
    }

    Ok(())
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, event: &Event) -> Result<(), NotificationError> {
        if !self.is_enabled(event.event_type) {
            return Ok(());
        }

        let chat_id = self.config.chat_for(event.event_type);
        let text = format_event(event);
        send_message(&self.http_client, &self.api_url, chat_id, &text).await
    }

    fn send_async(&self, event: Event) {
        if !self.is_enabled(event.event_type) {
            return;
        }

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => {
                if let Err(e) = sender.try_send(event) {
                    error!(error = %e, "Failed to queue Telegram message");
                }
            }
            None => warn!("Telegram notifier is closed, message dropped"),
        }
    }

    fn is_enabled(&self, event_type: EventType) -> bool {
        match event_type {
            EventType::Startup | EventType::Shutdown => true,
            EventType::Opportunity => self.config.notify_opportunities,
            EventType::Error => self.config.notify_errors,
            EventType::Overview => self.config.notify_overview,
        }
    }

    async fn close(&self) -> Result<(), NotificationError> {
        // Закрываем очередь, воркер отправит оставшиеся сообщения
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(worker) = worker {
            match tokio::time::timeout(CLOSE_TIMEOUT, worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(NotificationError::new(format!("Telegram worker failed: {}", e)));
                }
                Err(_) => {
                    return Err(NotificationError::new("Timed out flushing Telegram queue"));
                }
            }
        }

        Ok(())
    }
}
