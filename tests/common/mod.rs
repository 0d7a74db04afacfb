#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use notify_service::{
    models::{
        message::NotificationMessage, notification::NewNotification, status::NotificationStatus,
    },
    rate_limiter::WindowCounter,
    service::Publisher,
    store::{NotificationStore, StoreError},
    worker::{
        delivery::{DeliveryAcker, Disposition, QueuedMessage},
        handler::ChannelHandler,
    },
};
use tokio::{sync::mpsc, time::Instant};

/// Store keeping every status written per id, oldest first.
#[derive(Default)]
pub struct InMemoryStore {
    next_id: AtomicI64,
    history: Mutex<HashMap<i64, Vec<NotificationStatus>>>,
    inserts: AtomicUsize,
    fail_updates: AtomicBool,
    fail_inserts: AtomicBool,
    update_delay: Mutex<Option<Duration>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Makes every status write take `delay` before it lands.
    pub fn delay_updates(&self, delay: Duration) {
        *self.update_delay.lock().unwrap() = Some(delay);
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn history(&self, id: i64) -> Vec<NotificationStatus> {
        self.history
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn insert_pending(&self) -> i64 {
        self.insert(&NewNotification::pending(
            "user_1".to_string(),
            "Title".to_string(),
            "hi".to_string(),
            "3".to_string(),
            notify_service::models::channel::ChannelType::Push,
        ))
        .await
        .unwrap()
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert(&self, notification: &NewNotification) -> Result<i64, StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout);
        }

        self.inserts.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        self.history
            .lock()
            .unwrap()
            .insert(id, vec![notification.status]);

        Ok(id)
    }

    async fn update_status(&self, id: i64, status: NotificationStatus) -> Result<(), StoreError> {
        let delay = *self.update_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout);
        }

        let mut history = self.history.lock().unwrap();
        let entry = history.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        entry.push(status);

        Ok(())
    }

    async fn get_status(&self, id: i64) -> Result<NotificationStatus, StoreError> {
        self.history
            .lock()
            .unwrap()
            .get(&id)
            .and_then(|statuses| statuses.last().copied())
            .ok_or(StoreError::NotFound(id))
    }
}

/// Counter whose keys lapse on tokio's clock, so paused time drives expiry.
#[derive(Default)]
pub struct InMemoryCounter {
    counters: Mutex<HashMap<String, (u64, Option<Instant>)>>,
    expiries_armed: AtomicUsize,
    fail: AtomicBool,
}

impl InMemoryCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn expiries_armed(&self) -> usize {
        self.expiries_armed.load(Ordering::SeqCst)
    }

    /// Drops the TTL of `key` while keeping its count, like `PERSIST`.
    pub fn strip_expiry(&self, key: &str) {
        if let Some(entry) = self.counters.lock().unwrap().get_mut(key) {
            entry.1 = None;
        }
    }

    pub fn has_expiry(&self, key: &str) -> bool {
        matches!(self.counters.lock().unwrap().get(key), Some((_, Some(_))))
    }
}

#[async_trait]
impl WindowCounter for InMemoryCounter {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }

        let mut counters = self.counters.lock().unwrap();
        let entry = counters.entry(key.to_string()).or_insert((0, None));

        if matches!(entry.1, Some(deadline) if Instant::now() >= deadline) {
            *entry = (0, None);
        }

        entry.0 += 1;

        if entry.1.is_none() {
            entry.1 = Some(Instant::now() + window);
            self.expiries_armed.fetch_add(1, Ordering::SeqCst);
        }

        Ok(entry.0)
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, NotificationMessage)> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(key, payload)| (key.clone(), NotificationMessage::from_slice(payload).unwrap()))
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("channel closed"));
        }

        self.published
            .lock()
            .unwrap()
            .push((routing_key.to_string(), payload.to_vec()));

        Ok(())
    }
}

/// Shared record of how each delivery was settled.
#[derive(Clone, Default)]
pub struct SettleLog(Arc<Mutex<Vec<Disposition>>>);

impl SettleLog {
    pub fn entries(&self) -> Vec<Disposition> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, disposition: Disposition) {
        self.0.lock().unwrap().push(disposition);
    }
}

pub struct RecordingAcker {
    log: SettleLog,
}

impl RecordingAcker {
    pub fn new(log: &SettleLog) -> Self {
        Self { log: log.clone() }
    }
}

#[async_trait]
impl DeliveryAcker for RecordingAcker {
    async fn ack(&self) -> Result<(), Error> {
        self.log.push(Disposition::Ack);
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), Error> {
        self.log.push(Disposition::Reject { requeue });
        Ok(())
    }
}

/// Acts like a broker queue: a requeue puts the same payload back into the
/// work queue flagged as redelivered.
#[derive(Clone)]
pub struct RedeliveringAcker {
    queue: String,
    payload: Vec<u8>,
    sender: mpsc::Sender<QueuedMessage>,
    log: SettleLog,
    delivery_tag: u64,
}

impl RedeliveringAcker {
    pub fn deliver(
        queue: &str,
        payload: Vec<u8>,
        sender: mpsc::Sender<QueuedMessage>,
        log: &SettleLog,
    ) -> QueuedMessage {
        let acker = Self {
            queue: queue.to_string(),
            payload: payload.clone(),
            sender,
            log: log.clone(),
            delivery_tag: 1,
        };

        QueuedMessage::new(queue, 1, false, payload, acker)
    }
}

#[async_trait]
impl DeliveryAcker for RedeliveringAcker {
    async fn ack(&self) -> Result<(), Error> {
        self.log.push(Disposition::Ack);
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), Error> {
        self.log.push(Disposition::Reject { requeue });

        if requeue {
            let mut acker = self.clone();
            acker.delivery_tag += 1;
            let message = QueuedMessage::new(
                self.queue.clone(),
                acker.delivery_tag,
                true,
                self.payload.clone(),
                acker,
            );
            self.sender
                .send(message)
                .await
                .map_err(|_| anyhow!("work queue closed"))?;
        }

        Ok(())
    }
}

/// Fails the first `failures` deliveries, then succeeds.
pub struct ScriptedHandler {
    failures: AtomicU32,
    calls: AtomicU32,
    delay: Option<Duration>,
}

impl ScriptedHandler {
    pub fn succeeding() -> Arc<Self> {
        Self::failing(0)
    }

    pub fn failing(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
            delay: None,
        })
    }

    pub fn hanging(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            delay: Some(delay),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelHandler for ScriptedHandler {
    async fn deliver(&self, _message: &NotificationMessage) -> Result<(), Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("provider unavailable"));
        }

        Ok(())
    }
}

pub fn push_payload(notification_id: i64) -> Vec<u8> {
    payload_of_type(notification_id, "push")
}

pub fn payload_of_type(notification_id: i64, notification_type: &str) -> Vec<u8> {
    NotificationMessage {
        notification_id,
        user_id: "user_1".to_string(),
        title: "Title".to_string(),
        priority: "3".to_string(),
        message: "hi".to_string(),
        notification_type: notification_type.to_string(),
    }
    .to_vec()
    .unwrap()
}
