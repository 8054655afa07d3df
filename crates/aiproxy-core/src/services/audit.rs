//! Detached writer for the durable conversation copy

use std::sync::Arc;

use flume::{unbounded, Receiver, Sender};
use tracing::{error, info};

use crate::domain::AuditRecord;
use crate::repositories::ConversationStore;

/// Queue in front of the conversation store.
///
/// Records are drained by worker tasks that do not belong to any request, so
/// a cancelled or timed-out turn still gets recorded. Store failures are
/// logged and dropped.
#[derive(Clone)]
pub struct AuditWriter {
    sender: Sender<AuditRecord>,
}

impl AuditWriter {
    /// Spawns `workers` drain tasks on the current tokio runtime.
    pub fn spawn(store: Arc<dyn ConversationStore>, workers: usize) -> Self {
        let (sender, receiver) = unbounded();
        let workers = workers.max(1);

        info!("Initializing AuditWriter: workers={}", workers);

        for worker_id in 0..workers {
            let store = Arc::clone(&store);
            let receiver = receiver.clone();
            tokio::spawn(async move {
                Self::worker_loop(worker_id, store, receiver).await;
            });
        }

        Self { sender }
    }

    /// Enqueue without waiting.
    pub fn submit(&self, record: AuditRecord) {
        if let Err(e) = self.sender.send(record) {
            error!(user_id = %e.0.user_id, "Audit queue closed, dropping exchange");
        }
    }

    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    async fn worker_loop(
        worker_id: usize,
        store: Arc<dyn ConversationStore>,
        receiver: Receiver<AuditRecord>,
    ) {
        while let Ok(record) = receiver.recv_async().await {
            if let Err(e) = store.append_exchange(&record).await {
                error!(
                    worker_id,
                    user_id = %record.user_id,
                    error = %e,
                    "Failed to persist conversation exchange"
                );
            }
        }
        info!("Audit worker {} shutting down (channel closed)", worker_id);
    }
}
