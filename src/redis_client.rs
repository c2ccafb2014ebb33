use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use tokio::sync::Mutex;
use tracing::info;

use crate::broker::{BrokerMessage, Delivery, MessageConsumer, MessageProducer, PollOutcome};
use crate::error::BrokerError;

/// Redis-backed broker. Each topic is a list: producers `RPUSH`, consumers `BLPOP`.
#[derive(Clone)]
pub struct RedisClient {
    inner: Arc<Mutex<ConnectionManager>>,
}

impl RedisClient {
    pub async fn new(url: &str) -> Result<Self, BrokerError> {
        let client = Client::open(url.to_string())?;
        let manager = client.get_tokio_connection_manager().await?;
        Ok(Self {
            inner: Arc::new(Mutex::new(manager)),
        })
    }

    pub async fn ensure_connection(&self) -> Result<(), BrokerError> {
        let mut conn = self.inner.lock().await;
        redis::cmd("PING").query_async::<_, ()>(&mut *conn).await?;
        Ok(())
    }

    /// Append to a topic; the new list length is the message's offset.
    pub async fn rpush(&self, key: &str, value: &[u8]) -> Result<u64, BrokerError> {
        let mut conn = self.inner.lock().await;
        let len: u64 = redis::cmd("RPUSH")
            .arg(key)
            .arg(value)
            .query_async(&mut *conn)
            .await?;
        Ok(len)
    }

    pub async fn blpop(&self, keys: &[String], timeout: Duration) -> Result<Option<(String, Vec<u8>)>, BrokerError> {
        let mut conn = self.inner.lock().await;
        let timeout_secs = timeout.as_secs().max(1) as usize;
        let result: Option<(String, Vec<u8>)> = redis::cmd("BLPOP")
            .arg(keys)
            .arg(timeout_secs)
            .query_async(&mut *conn)
            .await?;
        Ok(result)
    }

    pub fn subscribe(self, topics: Vec<String>) -> RedisConsumer {
        RedisConsumer {
            client: Some(self),
            topics,
        }
    }
}

#[async_trait]
impl MessageProducer for RedisClient {
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<Delivery, BrokerError> {
        let offset = self.rpush(topic, &payload).await?;
        Ok(Delivery {
            topic: topic.to_string(),
            offset,
        })
    }
}

pub struct RedisConsumer {
    client: Option<RedisClient>,
    topics: Vec<String>,
}

#[async_trait]
impl MessageConsumer for RedisConsumer {
    fn topics(&self) -> &[String] {
        &self.topics
    }

    async fn poll(&mut self, timeout: Duration) -> PollOutcome {
        let Some(client) = &self.client else {
            return PollOutcome::Error(BrokerError::Closed);
        };
        match client.blpop(&self.topics, timeout).await {
            Ok(Some((topic, payload))) => PollOutcome::Message(BrokerMessage { topic, payload }),
            Ok(None) => PollOutcome::Empty,
            Err(err) => PollOutcome::Error(err),
        }
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        if self.client.take().is_some() {
            info!(topics = %self.topics.join(", "), "Redis subscription released");
        }
        Ok(())
    }
}
