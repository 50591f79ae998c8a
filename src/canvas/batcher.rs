use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    canvas::broadcaster::Broadcaster,
    models::{OutboundMessage, PixelEdit},
};
use tokio::sync::mpsc;

/// A validated edit on its way to the Applier, carrying the id of the
/// originating connection's Subscriber so a reject can be targeted back to
/// it. `None` once the connection has disconnected by the time this is
/// read back, in which case a reject is simply dropped.
#[derive(Clone)]
pub struct QueuedEdit {
    pub edit: PixelEdit,
    pub subscriber_id: Option<Uuid>,
    pub retries: u32,
}

impl QueuedEdit {
    pub fn new(edit: PixelEdit, subscriber_id: Option<Uuid>) -> Self {
        Self {
            edit,
            subscriber_id,
            retries: 0,
        }
    }
}

pub enum SubmitOutcome {
    Queued,
    Overloaded,
}

/// Sent over the Batcher -> Applier channel. `Shutdown` is always sent after
/// a final `flush_tick`, and FIFO ordering on the single sender guarantees
/// the Applier drains that last batch before it sees `Shutdown`.
pub enum ApplierCommand {
    Batch(Vec<QueuedEdit>),
    Shutdown,
}

/// Coalescing FIFO buffer. A fixed-interval ticker (owned by Lifecycle)
/// swaps the buffer for an empty one and hands the captured batch to the
/// Applier; ordering within a batch is arrival order, ordering across
/// batches is tick order.
pub struct Batcher {
    buffer: Mutex<Vec<QueuedEdit>>,
    to_applier: mpsc::Sender<ApplierCommand>,
    broadcaster: Arc<Broadcaster>,
    max_batch_size: usize,
}

impl Batcher {
    pub fn new(
        to_applier: mpsc::Sender<ApplierCommand>,
        broadcaster: Arc<Broadcaster>,
        max_batch_size: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            buffer: Mutex::new(Vec::new()),
            to_applier,
            broadcaster,
            max_batch_size,
        })
    }

    /// Queue one edit. Enforces the defensive global ceiling; edits beyond
    /// it are rejected as overloaded rather than queued unbounded. Per-user
    /// throughput is already bounded upstream by the two-tier limiter.
    pub async fn submit(&self, queued: QueuedEdit) -> SubmitOutcome {
        let mut buffer = self.buffer.lock().await;
        if buffer.len() >= self.max_batch_size {
            drop(buffer);
            if let Some(id) = queued.subscriber_id {
                let reject = OutboundMessage::reject("overloaded", Some(queued.edit.x), Some(queued.edit.y));
                self.broadcaster.send_to(id, &reject).await;
            }
            return SubmitOutcome::Overloaded;
        }
        buffer.push(queued);
        SubmitOutcome::Queued
    }

    /// Called by the flush ticker. Swaps the buffer and forwards a
    /// non-empty batch to the Applier. No-op when the buffer is empty.
    pub async fn flush_tick(&self) {
        let batch = {
            let mut buffer = self.buffer.lock().await;
            std::mem::take(&mut *buffer)
        };
        if batch.is_empty() {
            return;
        }
        if self.to_applier.send(ApplierCommand::Batch(batch)).await.is_err() {
            tracing::error!("Applier channel closed; dropping flushed batch");
        }
    }

    /// Tell the Applier to stop after draining whatever is already queued.
    /// Called once, after the final `flush_tick`, during shutdown.
    pub async fn shutdown_applier(&self) {
        let _ = self.to_applier.send(ApplierCommand::Shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tool;

    fn edit(x: u32, y: u32) -> PixelEdit {
        PixelEdit {
            x,
            y,
            color: "#000000".to_string(),
            tool: Tool::Brush,
            client_timestamp: chrono::Utc::now(),
            user_id: None,
        }
    }

    #[tokio::test]
    async fn flush_tick_forwards_a_non_empty_batch() {
        let (to_applier, mut from_batcher) = mpsc::channel(8);
        let batcher = Batcher::new(to_applier, Broadcaster::new(), 10);

        assert!(matches!(
            batcher.submit(QueuedEdit::new(edit(1, 1), None)).await,
            SubmitOutcome::Queued
        ));
        batcher.flush_tick().await;

        match from_batcher.try_recv() {
            Ok(ApplierCommand::Batch(batch)) => assert_eq!(batch.len(), 1),
            other => panic!("expected a batch, got something else: {}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn flush_tick_on_empty_buffer_sends_nothing() {
        let (to_applier, mut from_batcher) = mpsc::channel(8);
        let batcher = Batcher::new(to_applier, Broadcaster::new(), 10);

        batcher.flush_tick().await;
        assert!(from_batcher.try_recv().is_err());
    }

    #[tokio::test]
    async fn submit_rejects_once_buffer_is_at_capacity() {
        let (to_applier, _from_batcher) = mpsc::channel(8);
        let batcher = Batcher::new(to_applier, Broadcaster::new(), 1);

        assert!(matches!(
            batcher.submit(QueuedEdit::new(edit(0, 0), None)).await,
            SubmitOutcome::Queued
        ));
        let outcome = batcher.submit(QueuedEdit::new(edit(1, 1), None)).await;
        assert!(matches!(outcome, SubmitOutcome::Overloaded));
    }

    #[tokio::test]
    async fn shutdown_applier_sends_after_final_flush_in_order() {
        let (to_applier, mut from_batcher) = mpsc::channel(8);
        let batcher = Batcher::new(to_applier, Broadcaster::new(), 10);

        batcher.submit(QueuedEdit::new(edit(2, 2), None)).await;
        batcher.flush_tick().await;
        batcher.shutdown_applier().await;

        assert!(matches!(from_batcher.recv().await, Some(ApplierCommand::Batch(_))));
        assert!(matches!(from_batcher.recv().await, Some(ApplierCommand::Shutdown)));
    }
}
