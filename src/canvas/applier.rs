use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::mpsc;

use crate::{
    canvas::{
        batcher::{ApplierCommand, QueuedEdit},
        broadcaster::Broadcaster,
        lock_index::LockIndex,
    },
    models::{
        parse_hex_color, AppliedPixel, AuditEntry, Canvas, OutboundMessage, PixelBulkUpdateData, Tool,
        ERASER_COLOR,
    },
    services::{cache_service::keys, CacheService, Persistence},
};

const MAX_PERSIST_RETRIES: u32 = 3;

/// The sole mutator of the canvas bitmap. Owns a private `Canvas` and
/// consumes flushed batches from the Batcher one at a time; there is no
/// lock around the bitmap because there is exactly one task touching it.
pub struct Applier {
    persistence: Arc<dyn Persistence>,
    cache: CacheService,
    lock_index: Arc<LockIndex>,
    broadcaster: Arc<Broadcaster>,
    canvas: Canvas,
    cache_ttl: Duration,
}

fn to_hex(rgb: [u8; 3]) -> String {
    format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

impl Applier {
    /// Load the starting canvas: Cache, then Persistence, then (inside
    /// Persistence) a blank canvas if the store itself has never been
    /// written to.
    pub async fn bootstrap(
        persistence: Arc<dyn Persistence>,
        cache: CacheService,
        lock_index: Arc<LockIndex>,
        broadcaster: Arc<Broadcaster>,
        width: u32,
        height: u32,
        empty_fill: [u8; 3],
        cache_ttl: Duration,
    ) -> anyhow::Result<Self> {
        let canvas = match cache.get_canvas(&keys::canvas_state()).await {
            Some(canvas) => canvas,
            None => persistence.load_canvas(width, height, empty_fill).await?,
        };
        Ok(Self {
            persistence,
            cache,
            lock_index,
            broadcaster,
            canvas,
            cache_ttl,
        })
    }

    /// Drive the Applier from its command channel until it sees
    /// `ApplierCommand::Shutdown`, which the Batcher sends only after its
    /// final flush has already been enqueued on this same channel.
    pub async fn run(mut self, mut from_batcher: mpsc::Receiver<ApplierCommand>) {
        let mut carry_over: Vec<QueuedEdit> = Vec::new();
        while let Some(cmd) = from_batcher.recv().await {
            let mut batch = match cmd {
                ApplierCommand::Batch(batch) => batch,
                ApplierCommand::Shutdown => break,
            };
            if !carry_over.is_empty() {
                let mut combined = std::mem::take(&mut carry_over);
                combined.append(&mut batch);
                batch = combined;
            }
            if let Some(retry) = self.apply_batch(batch).await {
                carry_over = retry;
            }
        }
        tracing::info!("Applier stopped");
    }

    /// Apply one flushed batch. Returns `Some(edits)` to re-queue at the
    /// head of the next batch when the persistence write fails.
    async fn apply_batch(&mut self, batch: Vec<QueuedEdit>) -> Option<Vec<QueuedEdit>> {
        let snapshot = self.canvas.clone();
        let mut applied_pixels = Vec::with_capacity(batch.len());
        let mut applied_edits = Vec::with_capacity(batch.len());

        for queued in batch {
            if self.lock_index.is_locked(queued.edit.x, queued.edit.y).await {
                self.reject(&queued, "Position locked").await;
                continue;
            }
            if !self.canvas.in_bounds(queued.edit.x, queued.edit.y) {
                self.reject(&queued, "invalid").await;
                continue;
            }
            let rgb = match queued.edit.tool {
                Tool::Eraser => ERASER_COLOR,
                Tool::Brush => match parse_hex_color(&queued.edit.color) {
                    Some(rgb) => rgb,
                    None => {
                        self.reject(&queued, "invalid").await;
                        continue;
                    }
                },
            };

            self.canvas.set_pixel(queued.edit.x, queued.edit.y, rgb);
            if let Err(err) = self
                .persistence
                .append_audit(&AuditEntry::pixel_update(&queued.edit, None))
                .await
            {
                tracing::error!(error = %err, "audit append failed");
            }
            applied_pixels.push(AppliedPixel {
                x: queued.edit.x,
                y: queued.edit.y,
                color: to_hex(rgb),
            });
            applied_edits.push(queued);
        }

        if applied_pixels.is_empty() {
            return None;
        }

        self.canvas.rehash();

        match self.persistence.save_canvas(&self.canvas).await {
            Ok(()) => {
                if let Err(err) = self
                    .cache
                    .set_canvas(&keys::canvas_state(), &self.canvas, self.cache_ttl)
                    .await
                {
                    tracing::warn!(error = %err, "canvas cache refresh failed");
                }
                self.broadcaster
                    .publish(&OutboundMessage::PixelBulkUpdate {
                        data: PixelBulkUpdateData {
                            pixels: applied_pixels,
                            hash: self.canvas.hash.clone(),
                        },
                        timestamp: Utc::now(),
                    })
                    .await;
                None
            }
            Err(err) => {
                tracing::error!(error = %err, "canvas persist failed, rolling back batch");
                self.canvas = snapshot;
                Some(self.requeue_or_give_up(applied_edits).await)
            }
        }
    }

    async fn requeue_or_give_up(&self, edits: Vec<QueuedEdit>) -> Vec<QueuedEdit> {
        let mut retry = Vec::with_capacity(edits.len());
        for mut queued in edits {
            queued.retries += 1;
            if queued.retries > MAX_PERSIST_RETRIES {
                self.reject(&queued, "persist_failed").await;
            } else {
                retry.push(queued);
            }
        }
        retry
    }

    async fn reject(&self, queued: &QueuedEdit, reason: &str) {
        if let Some(id) = queued.subscriber_id {
            let event = OutboundMessage::reject(reason, Some(queued.edit.x), Some(queued.edit.y));
            self.broadcaster.send_to(id, &event).await;
        }
    }
}
