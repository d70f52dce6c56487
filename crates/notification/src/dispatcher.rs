//! Background delivery of order notifications.
//!
//! [`NotificationDispatcher`] is the [`OrderNotifier`] handed to the order
//! service. It only enqueues; a [`NotificationWorker`] drains the queue and
//! sends the SMS and the email as two independent tasks, each retried with
//! exponential backoff. Outcomes are logged and counted, never returned.

use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use domain::{OrderNotifier, PlacedOrder};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinHandle, JoinSet};

use crate::email::EmailTransport;
use crate::error::{NotificationError, Result};
use crate::sms::{SmsGateway, normalize_phone_number};
use crate::templates::{order_email, order_sms};

/// Queue and retry settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Orders waiting for delivery before new ones are dropped.
    pub queue_capacity: usize,
    /// Retries after the first attempt, per channel.
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_retries: 3,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl DispatcherConfig {
    /// Reads `NOTIFICATION_QUEUE_CAPACITY` and `NOTIFICATION_MAX_RETRIES`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("NOTIFICATION_QUEUE_CAPACITY") {
            config.queue_capacity = raw.parse().map_err(|_| {
                NotificationError::Config(format!("invalid NOTIFICATION_QUEUE_CAPACITY: {raw}"))
            })?;
        }
        if let Ok(raw) = std::env::var("NOTIFICATION_MAX_RETRIES") {
            config.max_retries = raw.parse().map_err(|_| {
                NotificationError::Config(format!("invalid NOTIFICATION_MAX_RETRIES: {raw}"))
            })?;
        }
        Ok(config)
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_delays(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max;
        self
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// Enqueues committed orders for delivery. Never blocks, never fails.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<PlacedOrder>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher and the worker that drains its queue.
    pub fn new(channels: Channels, config: DispatcherConfig) -> (Self, NotificationWorker) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let worker = NotificationWorker {
            receiver,
            channels: Arc::new(channels),
            config,
        };
        (Self { sender }, worker)
    }

    /// Creates a dispatcher and spawns its worker on the current runtime.
    ///
    /// The worker stops once every dispatcher clone is dropped and in-flight
    /// deliveries have finished.
    pub fn spawn(channels: Channels, config: DispatcherConfig) -> (Self, JoinHandle<()>) {
        let (dispatcher, worker) = Self::new(channels, config);
        (dispatcher, tokio::spawn(worker.run()))
    }
}

impl OrderNotifier for NotificationDispatcher {
    fn notify(&self, order: &PlacedOrder) {
        match self.sender.try_send(order.clone()) {
            Ok(()) => {
                tracing::debug!(order_id = %order.order.id, "order queued for notification");
            }
            Err(TrySendError::Full(_)) => {
                metrics::counter!("notifications_total", "channel" => "queue", "outcome" => "dropped")
                    .increment(1);
                tracing::warn!(order_id = %order.order.id, "notification queue full; order dropped");
            }
            Err(TrySendError::Closed(_)) => {
                metrics::counter!("notifications_total", "channel" => "queue", "outcome" => "dropped")
                    .increment(1);
                tracing::warn!(order_id = %order.order.id, "notification worker stopped; order dropped");
            }
        }
    }
}

/// Where notifications go.
pub struct Channels {
    pub sms: Arc<dyn SmsGateway>,
    pub email: Arc<dyn EmailTransport>,
    /// Recipient of the order email.
    pub admin_email: String,
}

impl Channels {
    pub fn new(
        sms: Arc<dyn SmsGateway>,
        email: Arc<dyn EmailTransport>,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            sms,
            email,
            admin_email: admin_email.into(),
        }
    }
}

/// Drains the dispatcher queue.
pub struct NotificationWorker {
    receiver: mpsc::Receiver<PlacedOrder>,
    channels: Arc<Channels>,
    config: DispatcherConfig,
}

impl NotificationWorker {
    /// Runs until the queue is closed, then waits for in-flight deliveries.
    pub async fn run(mut self) {
        let mut tasks = JoinSet::new();

        while let Some(order) = self.receiver.recv().await {
            let order = Arc::new(order);

            let (channels, backoff, placed) =
                (self.channels.clone(), self.config.backoff(), order.clone());
            tasks.spawn(async move {
                let result = deliver_sms(&channels, &placed, backoff).await;
                record("sms", &placed, result);
            });

            let (channels, backoff) = (self.channels.clone(), self.config.backoff());
            tasks.spawn(async move {
                let result = deliver_email(&channels, &order, backoff).await;
                record("email", &order, result);
            });

            while tasks.try_join_next().is_some() {}
        }

        while tasks.join_next().await.is_some() {}
        tracing::debug!("notification worker stopped");
    }
}

/// Sends the order SMS to the phone on the order.
pub async fn deliver_sms(
    channels: &Channels,
    placed: &PlacedOrder,
    backoff: ExponentialBuilder,
) -> Result<()> {
    let phone = normalize_phone_number(placed.order.phone_number.as_deref().unwrap_or(""))?;
    let message = order_sms(placed);

    let receipt = (|| async { channels.sms.send(&phone, &message).await })
        .retry(backoff)
        .when(|e| e.is_retryable())
        .notify(|e, after| {
            tracing::debug!(order_id = %placed.order.id, error = %e, ?after, "retrying sms");
        })
        .await?;

    receipt.validate()?;
    if let Some(recipient) = receipt.data.recipients.first() {
        tracing::info!(
            order_id = %placed.order.id,
            number = %recipient.number,
            message_id = %recipient.message_id,
            cost = %recipient.cost,
            "sms sent"
        );
    }
    Ok(())
}

/// Sends the order email to the administrator.
pub async fn deliver_email(
    channels: &Channels,
    placed: &PlacedOrder,
    backoff: ExponentialBuilder,
) -> Result<()> {
    let message = order_email(placed, &channels.admin_email);
    message.validate()?;

    (|| async { channels.email.send(&message).await })
        .retry(backoff)
        .when(|e| e.is_retryable())
        .notify(|e, after| {
            tracing::debug!(order_id = %placed.order.id, error = %e, ?after, "retrying email");
        })
        .await?;

    tracing::info!(order_id = %placed.order.id, to = %channels.admin_email, "order email sent");
    Ok(())
}

fn record(channel: &'static str, placed: &PlacedOrder, result: Result<()>) {
    match result {
        Ok(()) => {
            metrics::counter!("notifications_total", "channel" => channel, "outcome" => "sent")
                .increment(1);
        }
        Err(e) => {
            metrics::counter!("notifications_total", "channel" => channel, "outcome" => "failed")
                .increment(1);
            tracing::error!(
                order_id = %placed.order.id,
                reference = %placed.order.reference_number,
                channel,
                error = %e,
                "order notification failed"
            );
        }
    }
}
