use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{debug, error, info};

use crate::worker::{delivery::QueuedMessage, processor::MessageProcessor};

/// Capacity of the queue between subscriptions and workers.
pub const WORK_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub message_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            queue_capacity: WORK_QUEUE_CAPACITY,
            message_timeout: Duration::from_secs(5),
        }
    }
}

/// Fixed set of workers draining one bounded work queue.
///
/// Producers obtain a [`mpsc::Sender`] from [`WorkerPool::sender`]; a full
/// queue suspends them. The queue closes once the pool's own sender and
/// every handed-out clone are dropped, after which workers finish what is
/// buffered and exit.
pub struct WorkerPool {
    sender: Option<mpsc::Sender<QueuedMessage>>,
    workers: Vec<JoinHandle<()>>,
    processed: Arc<AtomicU64>,
}

impl WorkerPool {
    pub fn start(config: &WorkerConfig, processor: Arc<MessageProcessor>) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let processed = Arc::new(AtomicU64::new(0));

        let workers = (0..config.workers.max(1))
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&processor),
                    Arc::clone(&processed),
                ))
            })
            .collect::<Vec<_>>();

        info!(
            workers = workers.len(),
            queue_capacity = config.queue_capacity,
            "Worker pool started"
        );

        Self {
            sender: Some(sender),
            workers,
            processed,
        }
    }

    pub fn sender(&self) -> Option<mpsc::Sender<QueuedMessage>> {
        self.sender.clone()
    }

    /// Messages fully handled so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Closes the pool's side of the queue and waits for every worker to
    /// drain it. Senders handed out by [`WorkerPool::sender`] must be dropped
    /// first or this waits for them.
    pub async fn shutdown(mut self) -> u64 {
        self.sender.take();

        for (worker_id, worker) in self.workers.drain(..).enumerate() {
            if let Err(e) = worker.await {
                error!(worker_id, error = %e, "Worker terminated abnormally");
            }
        }

        let processed = self.processed();
        info!(processed, "Worker pool stopped");
        processed
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<QueuedMessage>>>,
    processor: Arc<MessageProcessor>,
    processed: Arc<AtomicU64>,
) {
    debug!(worker_id, "Worker started");

    loop {
        let next = receiver.lock().await.recv().await;

        let Some(message) = next else {
            break;
        };

        processor.handle(message).await;
        processed.fetch_add(1, Ordering::SeqCst);
    }

    debug!(worker_id, "Worker stopped");
}
