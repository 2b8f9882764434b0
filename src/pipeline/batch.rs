//! Notification batching and message formatting.

use std::sync::Arc;

use crate::models::{Entry, NotifyConfig};
use crate::services::Notifier;

/// How entries and failures are rendered into message text.
#[derive(Debug, Clone)]
pub struct MessageFormat {
    pub header: String,
    pub time_field: String,
    pub author_field: String,
    pub failure_message: String,
}

impl MessageFormat {
    /// Render one entry. Time and author lines appear only when present.
    pub fn entry(&self, entry: &Entry) -> String {
        let mut message = format!(
            "\u{1F4DD} 標題：{}\n\u{1F517} 連結：{}",
            entry.title, entry.url
        );

        if let Some(time) = entry.field(&self.time_field) {
            message.push_str(&format!("\n\u{1F552} 發布時間：{time}"));
        }
        if let Some(author) = entry.field(&self.author_field) {
            message.push_str(&format!("\n\u{270D}\u{FE0F} 作者：{author}"));
        }

        message
    }

    /// Render a batch: the header line, then entries separated by blank lines.
    pub fn batch(&self, entries: &[Entry]) -> String {
        let body = entries
            .iter()
            .map(|e| self.entry(e))
            .collect::<Vec<_>>()
            .join("\n\n");

        if self.header.is_empty() {
            body
        } else {
            format!("{}\n\n{}", self.header, body)
        }
    }

    /// Render a session failure.
    pub fn failure(&self, context: &str, error: &str) -> String {
        format!("{}\n{}\n{}", self.failure_message, context, error)
    }
}

impl From<&NotifyConfig> for MessageFormat {
    fn from(config: &NotifyConfig) -> Self {
        Self {
            header: config.header.clone(),
            time_field: config.time_field.clone(),
            author_field: config.author_field.clone(),
            failure_message: config.failure_message.clone(),
        }
    }
}

impl Default for MessageFormat {
    fn default() -> Self {
        Self::from(&NotifyConfig::default())
    }
}

/// Collects new entries and sends them in combined messages.
///
/// A message goes out as soon as `batch_size` entries are pending; whatever
/// remains is sent by [`NotificationBatcher::flush`] at session end. Delivery
/// failures are logged and the entries are dropped from the buffer.
pub struct NotificationBatcher {
    notifier: Arc<dyn Notifier>,
    recipient: String,
    format: MessageFormat,
    batch_size: usize,
    pending: Vec<Entry>,
    messages_sent: usize,
}

impl NotificationBatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        recipient: impl Into<String>,
        format: MessageFormat,
        batch_size: usize,
    ) -> Self {
        Self {
            notifier,
            recipient: recipient.into(),
            format,
            batch_size: batch_size.max(1),
            pending: Vec::new(),
            messages_sent: 0,
        }
    }

    /// Queue an entry, flushing once the batch is full.
    pub async fn push(&mut self, entry: Entry) {
        self.pending.push(entry);
        if self.pending.len() >= self.batch_size {
            self.flush().await;
        }
    }

    /// Send everything pending as one message. Nothing is sent when empty.
    pub async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.pending);
        let text = self.format.batch(&batch);
        match self.notifier.send(&self.recipient, &text).await {
            Ok(()) => {
                self.messages_sent += 1;
                log::info!("Notification sent for {} new entries", batch.len());
            }
            Err(e) => log::error!(
                "Notification for {} entries failed: {}",
                batch.len(),
                e
            ),
        }
    }

    /// Send a single failure message for an aborted session.
    pub async fn notify_failure(&self, context: &str, error: &str) {
        let text = self.format.failure(context, error);
        if let Err(e) = self.notifier.send(&self.recipient, &text).await {
            log::error!("Failure notification could not be sent: {}", e);
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn messages_sent(&self) -> usize {
        self.messages_sent
    }
}
