use std::fmt::{Display, Formatter};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use lapin::{
    acker::Acker,
    message::Delivery,
    options::{BasicAckOptions, BasicRejectOptions},
    types::{AMQPValue, FieldTable},
};

/// Settles one delivery with the broker.
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    async fn ack(&self) -> Result<(), Error>;

    async fn reject(&self, requeue: bool) -> Result<(), Error>;
}

pub struct LapinAcker(Acker);

#[async_trait]
impl DeliveryAcker for LapinAcker {
    async fn ack(&self) -> Result<(), Error> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| anyhow!("Failed to acknowledge message: {}", e))
    }

    async fn reject(&self, requeue: bool) -> Result<(), Error> {
        self.0
            .reject(BasicRejectOptions { requeue })
            .await
            .map(|_| ())
            .map_err(|e| anyhow!("Failed to reject message: {}", e))
    }
}

/// Final verdict on a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Reject { requeue: bool },
}

impl Disposition {
    pub const REQUEUE: Disposition = Disposition::Reject { requeue: true };
    pub const DEAD_LETTER: Disposition = Disposition::Reject { requeue: false };
}

/// Why the broker dead-lettered a message, read from its `x-death` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// Rejected without requeue: a poison payload.
    Rejected,
    /// The queue's redelivery limit was exhausted.
    DeliveryLimit,
    Expired,
    MaxLength,
    Other(String),
}

impl DeadLetterReason {
    fn parse(reason: &str) -> Self {
        match reason {
            "rejected" => DeadLetterReason::Rejected,
            "delivery_limit" => DeadLetterReason::DeliveryLimit,
            "expired" => DeadLetterReason::Expired,
            "maxlen" => DeadLetterReason::MaxLength,
            other => DeadLetterReason::Other(other.to_string()),
        }
    }

    pub fn is_retry_exhaustion(&self) -> bool {
        matches!(
            self,
            DeadLetterReason::DeliveryLimit | DeadLetterReason::Expired
        )
    }
}

impl Display for DeadLetterReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DeadLetterReason::Rejected => write!(f, "rejected"),
            DeadLetterReason::DeliveryLimit => write!(f, "delivery_limit"),
            DeadLetterReason::Expired => write!(f, "expired"),
            DeadLetterReason::MaxLength => write!(f, "maxlen"),
            DeadLetterReason::Other(reason) => write!(f, "{}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterInfo {
    pub reason: DeadLetterReason,
    pub source_queue: Option<String>,
    pub count: Option<i64>,
}

impl DeadLetterInfo {
    /// Reads the most recent `x-death` entry, if the headers carry one.
    pub fn from_headers(headers: &FieldTable) -> Option<Self> {
        let deaths = match field(headers, "x-death")? {
            AMQPValue::FieldArray(array) => array,
            _ => return None,
        };

        let latest = match deaths.as_slice().first()? {
            AMQPValue::FieldTable(table) => table,
            _ => return None,
        };

        let reason = field(latest, "reason")
            .and_then(as_string)
            .map(|r| DeadLetterReason::parse(&r))?;

        let count = field(latest, "count").and_then(|value| match value {
            AMQPValue::LongLongInt(n) => Some(*n),
            AMQPValue::LongInt(n) => Some(i64::from(*n)),
            AMQPValue::LongUInt(n) => Some(i64::from(*n)),
            _ => None,
        });

        Some(Self {
            reason,
            source_queue: field(latest, "queue").and_then(as_string),
            count,
        })
    }
}

fn field<'a>(table: &'a FieldTable, key: &str) -> Option<&'a AMQPValue> {
    table
        .inner()
        .iter()
        .find(|(name, _)| name.as_str() == key)
        .map(|(_, value)| value)
}

fn as_string(value: &AMQPValue) -> Option<String> {
    match value {
        AMQPValue::LongString(s) => Some(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        AMQPValue::ShortString(s) => Some(s.as_str().to_string()),
        _ => None,
    }
}

/// A broker delivery tagged with the queue it came from.
///
/// Settling consumes the message, so it is acked or rejected at most once.
pub struct QueuedMessage {
    pub queue_name: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub payload: Vec<u8>,
    pub dead_letter: Option<DeadLetterInfo>,
    acker: Box<dyn DeliveryAcker>,
}

impl QueuedMessage {
    pub fn new(
        queue_name: impl Into<String>,
        delivery_tag: u64,
        redelivered: bool,
        payload: Vec<u8>,
        acker: impl DeliveryAcker + 'static,
    ) -> Self {
        Self {
            queue_name: queue_name.into(),
            delivery_tag,
            redelivered,
            payload,
            dead_letter: None,
            acker: Box::new(acker),
        }
    }

    pub fn with_dead_letter(mut self, dead_letter: Option<DeadLetterInfo>) -> Self {
        self.dead_letter = dead_letter;
        self
    }

    pub fn from_delivery(queue_name: &str, delivery: Delivery) -> Self {
        let dead_letter = delivery
            .properties
            .headers()
            .as_ref()
            .and_then(DeadLetterInfo::from_headers);

        Self::new(
            queue_name,
            delivery.delivery_tag,
            delivery.redelivered,
            delivery.data,
            LapinAcker(delivery.acker),
        )
        .with_dead_letter(dead_letter)
    }

    pub async fn settle(self, disposition: Disposition) -> Result<(), Error> {
        match disposition {
            Disposition::Ack => self.acker.ack().await,
            Disposition::Reject { requeue } => self.acker.reject(requeue).await,
        }
    }
}
