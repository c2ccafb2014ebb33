use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrokerError;

/// Acknowledgement for a message the broker accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
pub enum PollOutcome {
    Message(BrokerMessage),
    /// Nothing arrived within the poll timeout.
    Empty,
    /// The subscribed topic has been drained; more may arrive later.
    EndOfPartition,
    Error(BrokerError),
}

#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<Delivery, BrokerError>;
}

#[async_trait]
pub trait MessageConsumer: Send {
    fn topics(&self) -> &[String];

    async fn poll(&mut self, timeout: Duration) -> PollOutcome;

    /// Release the subscription. Safe to call more than once.
    async fn close(&mut self) -> Result<(), BrokerError>;
}
