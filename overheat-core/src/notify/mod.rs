//! Alert formatting and delivery.
//!
//! Every [`AlertEvent`] is rendered once into a [`NotifyMessage`] and handed
//! independently to each registered [`Notifier`]. A failing channel is logged
//! and recorded, never propagated.

use crate::{classify::AlertKind, classify::Thresholds, error::NotifyError, record::AlertEvent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::{error, info, warn};

/// SMTP email channel.
pub mod email;

/// Short title & detailed body rendering.
pub mod format;

/// ServerChan push-to-WeChat channel.
pub mod serverchan;

pub use email::{EmailConfig, EmailNotifier};
pub use serverchan::{ServerChanConfig, ServerChanNotifier};

/// Rendered notification: a short title and a detailed plain-text body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NotifyMessage {
    pub title: String,
    pub body: String,
}

/// A delivery channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &NotifyMessage) -> Result<(), NotifyError>;

    fn name(&self) -> &str;
}

/// Result of handing one alert to one channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Delivery {
    pub symbol: SmolStr,
    pub kind: AlertKind,
    pub channel: String,
    pub error: Option<String>,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        self.error.is_none()
    }
}

pub struct NotificationDispatcher {
    channels: Vec<Box<dyn Notifier>>,
    thresholds: Thresholds,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field(
                "channels",
                &self.channels.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

impl NotificationDispatcher {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            channels: Vec::new(),
            thresholds,
        }
    }

    /// Register a delivery channel.
    pub fn with_channel(mut self, channel: Box<dyn Notifier>) -> Self {
        info!(channel = channel.name(), "registered notification channel");
        self.channels.push(channel);
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver every event on every channel, in order.
    pub async fn dispatch(&self, events: &[AlertEvent]) -> Vec<Delivery> {
        if events.is_empty() {
            return Vec::new();
        }
        if self.channels.is_empty() {
            warn!(
                alerts = events.len(),
                "no notification channel configured, skipping delivery"
            );
            return Vec::new();
        }

        let mut deliveries = Vec::with_capacity(events.len() * self.channels.len());
        for event in events {
            let message = format::render(event, &self.thresholds);
            for channel in &self.channels {
                let result = channel.send(&message).await;
                match &result {
                    Ok(()) => info!(
                        channel = channel.name(),
                        asset = %event.record.symbol,
                        kind = %event.kind,
                        "alert delivered"
                    ),
                    Err(error) => error!(
                        channel = channel.name(),
                        asset = %event.record.symbol,
                        kind = %event.kind,
                        %error,
                        "alert delivery failed"
                    ),
                }

                deliveries.push(Delivery {
                    symbol: event.record.symbol.clone(),
                    kind: event.kind,
                    channel: channel.name().to_string(),
                    error: result.err().map(|error| error.to_string()),
                });
            }
        }

        deliveries
    }
}
