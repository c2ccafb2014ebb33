use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

use crate::broker::{BrokerMessage, MessageConsumer, PollOutcome};
use crate::error::{BrokerError, DecodeError};
use crate::metrics::{DECODE_FAILURES_TOTAL, MESSAGES_RENDERED_TOTAL};
use crate::routing::status_from_topic;
use crate::types::{parse_period, NotificationMessage};

/// e.g. `June 20 at 12PM`
pub const DISPLAY_FORMAT: &str = "%B %d at %I%p";

/// Consumer-side view of one notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedNotification {
    pub status: String,
    pub region_id: String,
    pub region_name: String,
    pub period: DateTime<Utc>,
    pub total_energy: f64,
    pub clean_fraction: f64,
}

/// Decode a payload received on `topic`. The status word comes from the topic.
pub fn decode_message(topic: &str, payload: &[u8]) -> Result<DecodedNotification, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    let message: NotificationMessage = serde_json::from_str(text)?;

    let clean_fraction = message
        .pct_clean
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|fraction| (0.0..=1.0).contains(fraction))
        .ok_or_else(|| DecodeError::InvalidFraction(message.pct_clean.clone()))?;
    let period = parse_period(&message.period).ok_or_else(|| DecodeError::InvalidPeriod(message.period.clone()))?;

    Ok(DecodedNotification {
        status: status_from_topic(topic).to_string(),
        region_id: message.region_id,
        region_name: message.region_name,
        period,
        total_energy: message.total_energy,
        clean_fraction,
    })
}

pub fn render<Tz>(notification: &DecodedNotification, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let when = notification.period.with_timezone(tz).format(DISPLAY_FORMAT);
    format!(
        "The power was {:.0}% {} for {} customers on {}!",
        notification.clean_fraction * 100.0,
        notification.status,
        notification.region_name,
        when
    )
}

pub fn render_local(notification: &DecodedNotification) -> String {
    render(notification, &Local)
}

/// Where rendered notifications end up.
pub trait NotificationSink: Send {
    fn emit(&mut self, line: &str);
}

pub struct StdoutSink;

impl NotificationSink for StdoutSink {
    fn emit(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Poll loop for one classification topic.
///
/// Empty polls and end-of-partition signals keep polling, undecodable
/// payloads are logged and dropped, any other broker error ends the loop.
/// Shutdown is checked between polls so a poll already sent to the broker is
/// always completed; exit latency is bounded by the poll timeout.
/// The subscription is closed on every exit path.
pub struct NotifierService<C, S> {
    consumer: C,
    sink: S,
    poll_timeout: Duration,
    consumer_id: String,
}

impl<C, S> NotifierService<C, S>
where
    C: MessageConsumer,
    S: NotificationSink,
{
    pub fn new(consumer: C, sink: S, poll_timeout: Duration, consumer_id: String) -> Self {
        Self {
            consumer,
            sink,
            poll_timeout,
            consumer_id,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), BrokerError> {
        info!(
            consumer_id = %self.consumer_id,
            topics = %self.consumer.topics().join(", "),
            "Notifier subscribed"
        );
        let result = self.poll_loop(&mut shutdown).await;
        if let Err(err) = self.consumer.close().await {
            warn!(consumer_id = %self.consumer_id, error = %err, "Failed to release subscription");
        }
        info!(consumer_id = %self.consumer_id, "Notifier closed");
        result
    }

    async fn poll_loop(&mut self, shutdown: &mut broadcast::Receiver<()>) -> Result<(), BrokerError> {
        loop {
            match shutdown.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => {
                    info!(consumer_id = %self.consumer_id, "Notifier loop stopping");
                    return Ok(());
                }
            }

            let outcome = self.consumer.poll(self.poll_timeout).await;

            match outcome {
                PollOutcome::Empty => continue,
                PollOutcome::EndOfPartition => {
                    debug!(consumer_id = %self.consumer_id, "Reached end of partition");
                }
                PollOutcome::Error(err) => {
                    error!(consumer_id = %self.consumer_id, error = %err, "Broker error; stopping notifier");
                    return Err(err);
                }
                PollOutcome::Message(message) => {
                    self.handle_message(&message);
                }
            }
        }
    }

    /// Decode and render one message. Returns the rendered line, if any.
    pub fn handle_message(&mut self, message: &BrokerMessage) -> Option<String> {
        match decode_message(&message.topic, &message.payload) {
            Ok(notification) => {
                let line = render_local(&notification);
                MESSAGES_RENDERED_TOTAL
                    .with_label_values(&[notification.status.as_str()])
                    .inc();
                self.sink.emit(&line);
                Some(line)
            }
            Err(err) => {
                DECODE_FAILURES_TOTAL
                    .with_label_values(&[message.topic.as_str()])
                    .inc();
                warn!(
                    consumer_id = %self.consumer_id,
                    topic = %message.topic,
                    payload = %String::from_utf8_lossy(&message.payload),
                    error = %err,
                    "Unable to decode notification"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::FixedOffset;

    use super::*;
    use crate::aggregator::aggregate;
    use crate::broker::memory::MemoryBroker;
    use crate::types::GenerationRecord;

    const PAYLOAD: &str = r#"{"entity": "ABC", "name": "Alpha Grid", "period": "2024-06-20T12", "total_energy": 400.0, "pct_clean": "0.75"}"#;

    #[derive(Clone, Default)]
    struct VecSink(Arc<Mutex<Vec<String>>>);

    impl VecSink {
        fn lines(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl NotificationSink for VecSink {
        fn emit(&mut self, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    fn service(broker: &MemoryBroker, sink: VecSink) -> NotifierService<crate::broker::memory::MemoryConsumer, VecSink> {
        NotifierService::new(
            broker.consumer(&["clean-power"]),
            sink,
            Duration::from_millis(10),
            "notifier-test".to_string(),
        )
    }

    #[test]
    fn decodes_wire_payload() {
        let decoded = decode_message("clean-power", PAYLOAD.as_bytes()).unwrap();
        assert_eq!(decoded.status, "clean");
        assert_eq!(decoded.region_id, "ABC");
        assert_eq!(decoded.region_name, "Alpha Grid");
        assert_eq!(decoded.period, parse_period("2024-06-20T12").unwrap());
        assert_eq!(decoded.total_energy, 400.0);
        assert_eq!(decoded.clean_fraction, 0.75);
    }

    #[test]
    fn renders_in_utc() {
        let decoded = decode_message("clean-power", PAYLOAD.as_bytes()).unwrap();
        assert_eq!(
            render(&decoded, &Utc),
            "The power was 75% clean for Alpha Grid customers on June 20 at 12PM!"
        );
    }

    #[test]
    fn renders_in_a_shifted_zone() {
        let decoded = decode_message("dirty-power", PAYLOAD.as_bytes()).unwrap();
        let eastern = FixedOffset::west_opt(4 * 3600).unwrap();
        assert_eq!(
            render(&decoded, &eastern),
            "The power was 75% dirty for Alpha Grid customers on June 20 at 08AM!"
        );
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        assert!(render(&decoded, &tokyo).ends_with("on June 20 at 09PM!"));
    }

    #[test]
    fn percentage_rounds_to_whole_number() {
        let mut decoded = decode_message("clean-power", PAYLOAD.as_bytes()).unwrap();
        decoded.clean_fraction = 2.0 / 3.0;
        assert!(render(&decoded, &Utc).starts_with("The power was 67% clean"));
        decoded.clean_fraction = 1.0;
        assert!(render(&decoded, &Utc).starts_with("The power was 100% clean"));
    }

    #[test]
    fn malformed_payloads_are_decode_errors() {
        assert!(matches!(
            decode_message("clean-power", br#"{"entity": "ABC", "name""#),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode_message("clean-power", &[0xff, 0xfe]),
            Err(DecodeError::Utf8(_))
        ));
        assert!(matches!(
            decode_message("clean-power", br#"{"entity": "ABC"}"#),
            Err(DecodeError::Json(_))
        ));
        let bad_pct = PAYLOAD.replace("\"0.75\"", "\"lots\"");
        assert!(matches!(
            decode_message("clean-power", bad_pct.as_bytes()),
            Err(DecodeError::InvalidFraction(_))
        ));
        let bad_period = PAYLOAD.replace("2024-06-20T12", "noon");
        assert!(matches!(
            decode_message("clean-power", bad_period.as_bytes()),
            Err(DecodeError::InvalidPeriod(_))
        ));
    }

    #[test]
    fn summary_round_trips_through_the_wire() {
        let records = vec![
            GenerationRecord {
                region_id: "ABC".to_string(),
                region_name: "Alpha Grid".to_string(),
                fuel_type: "NUC".to_string(),
                timestamp: parse_period("2024-06-20T12").unwrap(),
                value: 1234.567,
            },
            GenerationRecord {
                region_id: "ABC".to_string(),
                region_name: "Alpha Grid".to_string(),
                fuel_type: "NG".to_string(),
                timestamp: parse_period("2024-06-20T12").unwrap(),
                value: 89.1011,
            },
        ];
        let summary = aggregate(&records).unwrap().summaries.remove(0);
        let payload = serde_json::to_vec(&NotificationMessage::from(&summary)).unwrap();
        let decoded = decode_message(summary.classification.topic(), &payload).unwrap();

        assert_eq!(decoded.region_id, summary.region_id);
        assert_eq!(decoded.region_name, summary.region_name);
        assert_eq!(decoded.period, summary.period);
        assert_eq!(decoded.total_energy, summary.total_energy);
        assert_eq!(decoded.clean_fraction, summary.clean_fraction);
        assert_eq!(decoded.status, "clean");
    }

    #[tokio::test]
    async fn bad_message_does_not_stall_the_loop() {
        let broker = MemoryBroker::new();
        broker.push_message("clean-power", b"{\"entity\": \"ABC\", \"na");
        broker.push_end_of_partition();
        broker.push_message("clean-power", PAYLOAD.as_bytes());
        broker.push_error("connection reset");

        let sink = VecSink::default();
        let (_tx, rx) = broadcast::channel(1);
        let result = service(&broker, sink.clone()).run(rx).await;

        assert!(matches!(result, Err(BrokerError::Connection(_))));
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("The power was 75% clean for Alpha Grid customers on "));
        assert!(broker.is_closed());
    }

    #[tokio::test]
    async fn shutdown_closes_the_subscription() {
        let broker = MemoryBroker::new();
        let sink = VecSink::default();
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(service(&broker, sink.clone()).run(rx));

        tx.send(()).unwrap();
        let result = handle.await.unwrap();

        assert!(result.is_ok());
        assert!(sink.lines().is_empty());
        assert!(broker.is_closed());
    }

    #[tokio::test]
    async fn shutdown_leaves_queued_messages_unconsumed() {
        let broker = MemoryBroker::new();
        broker.push_message("clean-power", PAYLOAD.as_bytes());
        let sink = VecSink::default();
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        let result = service(&broker, sink.clone()).run(rx).await;

        assert!(result.is_ok());
        assert!(sink.lines().is_empty());
        assert_eq!(broker.pending(), 1);
        assert!(broker.is_closed());
    }

    #[tokio::test]
    async fn dropped_shutdown_sender_stops_the_loop() {
        let broker = MemoryBroker::new();
        let (tx, rx) = broadcast::channel::<()>(1);
        drop(tx);

        let result = service(&broker, VecSink::default()).run(rx).await;

        assert!(result.is_ok());
        assert!(broker.is_closed());
    }

    #[test]
    fn handle_message_reports_the_rendered_line() {
        let broker = MemoryBroker::new();
        let sink = VecSink::default();
        let mut service = service(&broker, sink.clone());
        let good = BrokerMessage {
            topic: "clean-power".to_string(),
            payload: PAYLOAD.as_bytes().to_vec(),
        };
        let bad = BrokerMessage {
            topic: "clean-power".to_string(),
            payload: b"not json".to_vec(),
        };
        assert!(service.handle_message(&bad).is_none());
        assert!(service.handle_message(&good).is_some());
        assert_eq!(sink.lines().len(), 1);
    }
}
