use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::broker::{Delivery, MessageProducer};
use crate::error::BrokerError;
use crate::metrics::{DELIVERIES_TOTAL, NOTIFICATIONS_SENT_TOTAL};
use crate::types::NotificationMessage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub delivered: usize,
    pub failed: usize,
    /// Sends still unresolved when the flush deadline passed; they are abandoned.
    pub pending: usize,
}

impl FlushSummary {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.pending == 0
    }
}

/// Fire-and-forget notification publisher.
///
/// `send` hands the payload to a background task and returns immediately;
/// each task reports its own delivery outcome. `flush` is the barrier that
/// waits for every outstanding send of the run. Dropping the publisher
/// without flushing aborts whatever is still in flight.
pub struct Publisher {
    producer: Arc<dyn MessageProducer>,
    in_flight: JoinSet<bool>,
}

impl Publisher {
    pub fn new(producer: Arc<dyn MessageProducer>) -> Self {
        Self {
            producer,
            in_flight: JoinSet::new(),
        }
    }

    pub fn send(&mut self, topic: &str, message: &NotificationMessage) -> Result<(), serde_json::Error> {
        let payload = serde_json::to_vec(message)?;
        info!(topic, payload = %String::from_utf8_lossy(&payload), "Message sent");
        NOTIFICATIONS_SENT_TOTAL.with_label_values(&[topic]).inc();

        let producer = self.producer.clone();
        let topic = topic.to_string();
        self.in_flight.spawn(async move {
            let result = producer.send(&topic, payload).await;
            delivery_report(&topic, &result);
            result.is_ok()
        });
        Ok(())
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub async fn flush(&mut self, timeout: Duration) -> FlushSummary {
        let deadline = Instant::now() + timeout;
        let mut summary = FlushSummary::default();
        loop {
            match timeout_at(deadline, self.in_flight.join_next()).await {
                Ok(Some(Ok(true))) => summary.delivered += 1,
                Ok(Some(Ok(false))) => summary.failed += 1,
                Ok(Some(Err(err))) => {
                    warn!(error = %err, "Delivery task did not complete");
                    summary.failed += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    summary.pending = self.in_flight.len();
                    warn!(pending = summary.pending, "Flush timed out with messages still in flight");
                    self.in_flight.abort_all();
                    break;
                }
            }
        }
        summary
    }
}

fn delivery_report(topic: &str, result: &Result<Delivery, BrokerError>) {
    match result {
        Ok(delivery) => {
            DELIVERIES_TOTAL.with_label_values(&[topic, "delivered"]).inc();
            info!(topic = %delivery.topic, offset = delivery.offset, "Message delivered");
        }
        Err(err) => {
            DELIVERIES_TOTAL.with_label_values(&[topic, "failed"]).inc();
            warn!(topic, error = %err, "Message delivery failed");
        }
    }
}
