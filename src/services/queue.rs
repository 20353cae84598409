use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;
use uuid::Uuid;

use crate::models::event::QueueMessage;

const QUEUE_KEY: &str = "catalog:ingest";
const INFLIGHT_KEY: &str = "catalog:inflight";
const DEAD_LETTER_KEY: &str = "catalog:dead";

/// Outcome of a dequeue attempt.
#[derive(Debug)]
pub enum Dequeued {
    /// A message ready for processing, hidden from other consumers until its
    /// visibility deadline.
    Ready(QueueMessage),
    /// A message whose delivery would exceed the receive cap. It has been
    /// routed to the dead-letter list and will never be auto-retried; the
    /// caller should surface the failure (mark the catalog entry failed).
    DeadLettered(QueueMessage),
}

/// Redis-backed at-least-once delivery queue with a visibility window and a
/// dead-letter path.
///
/// Pending messages live on a list; dequeued messages move into a sorted set
/// scored by their visibility deadline. A message whose deadline lapses
/// without an ack is reclaimed onto the main list, unmodified, on a later
/// dequeue. List pops are atomic, so no two consumers hold the same message
/// inside one visibility window; redelivery after expiry is expected and the
/// catalog upsert downstream is idempotent.
pub struct IngestionQueue {
    client: redis::Client,
    max_receive_count: u32,
    visibility_timeout: Duration,
}

impl IngestionQueue {
    pub fn new(
        redis_url: &str,
        max_receive_count: u32,
        visibility_timeout: Duration,
    ) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            max_receive_count,
            visibility_timeout,
        })
    }

    async fn conn(&self) -> Result<MultiplexedConnection, QueueError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Enqueue a fresh message for an uploaded object. Called exactly once
    /// per successful object write (the trigger's responsibility).
    pub async fn enqueue(&self, object_key: &str) -> Result<QueueMessage, QueueError> {
        let message = QueueMessage {
            message_id: Uuid::new_v4(),
            object_key: object_key.to_string(),
            receive_count: 0,
            enqueued_at: Utc::now(),
        };
        let payload = serde_json::to_string(&message)?;

        let mut conn = self.conn().await?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, &payload).await?;
        Ok(message)
    }

    /// Pull the next message, if any. Reclaims expired in-flight messages
    /// first, then applies the receive cap: a delivery beyond
    /// `max_receive_count` is moved to the dead-letter list instead of being
    /// handed out again.
    pub async fn dequeue(&self) -> Result<Option<Dequeued>, QueueError> {
        let mut conn = self.conn().await?;
        self.reclaim_expired(&mut conn).await?;

        let popped: Option<String> = conn.rpop(QUEUE_KEY, None).await?;
        let payload = match popped {
            Some(p) => p,
            None => return Ok(None),
        };

        let mut message: QueueMessage = serde_json::from_str(&payload)?;
        message.receive_count += 1;

        if message.receive_count > self.max_receive_count {
            let dead = serde_json::to_string(&message)?;
            conn.lpush::<_, _, ()>(DEAD_LETTER_KEY, &dead).await?;
            metrics::counter!("catalog_dead_letters_total").increment(1);
            tracing::warn!(
                object_key = %message.object_key,
                receive_count = message.receive_count,
                "receive cap exceeded, message dead-lettered"
            );
            return Ok(Some(Dequeued::DeadLettered(message)));
        }

        let deadline = Utc::now().timestamp() + self.visibility_timeout.as_secs() as i64;
        let inflight = serde_json::to_string(&message)?;
        conn.zadd::<_, _, _, ()>(INFLIGHT_KEY, &inflight, deadline)
            .await?;
        Ok(Some(Dequeued::Ready(message)))
    }

    /// Permanently remove an acknowledged message.
    pub async fn ack(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let payload = serde_json::to_string(message)?;
        let mut conn = self.conn().await?;
        conn.zrem::<_, _, ()>(INFLIGHT_KEY, &payload).await?;
        Ok(())
    }

    /// Return a message for redelivery without waiting for its visibility
    /// deadline. A no-op if the deadline already lapsed and the message was
    /// reclaimed by another consumer.
    pub async fn nack(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let payload = serde_json::to_string(message)?;
        let mut conn = self.conn().await?;
        let removed: i64 = conn.zrem(INFLIGHT_KEY, &payload).await?;
        if removed == 1 {
            conn.lpush::<_, _, ()>(QUEUE_KEY, &payload).await?;
        }
        Ok(())
    }

    /// Move messages whose visibility window lapsed back onto the main list.
    /// Only the consumer that wins the ZREM requeues a given payload.
    async fn reclaim_expired(
        &self,
        conn: &mut MultiplexedConnection,
    ) -> Result<(), QueueError> {
        let now = Utc::now().timestamp();
        let expired: Vec<String> = conn.zrangebyscore(INFLIGHT_KEY, "-inf", now).await?;
        for payload in expired {
            let removed: i64 = conn.zrem(INFLIGHT_KEY, &payload).await?;
            if removed == 1 {
                conn.lpush::<_, _, ()>(QUEUE_KEY, &payload).await?;
                tracing::debug!("visibility window lapsed, message reclaimed");
            }
        }
        Ok(())
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Messages waiting on the main queue.
    pub async fn depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn().await?;
        Ok(conn.llen(QUEUE_KEY).await?)
    }

    /// Messages parked on the dead-letter list awaiting manual reprocessing.
    pub async fn dead_letter_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn().await?;
        Ok(conn.llen(DEAD_LETTER_KEY).await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    // ack/nack remove in-flight entries by exact payload, so serialization
    // of an unchanged message must be byte-stable across a round trip.
    #[test]
    fn message_payload_is_byte_stable() {
        let message = QueueMessage {
            message_id: Uuid::new_v4(),
            object_key: "private/u1/cat.jpg".to_string(),
            receive_count: 1,
            enqueued_at: Utc::now(),
        };
        let payload = serde_json::to_string(&message).unwrap();
        let reparsed: QueueMessage = serde_json::from_str(&payload).unwrap();
        assert_eq!(serde_json::to_string(&reparsed).unwrap(), payload);
    }
}
