use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use sqlx::{FromRow, PgPool};
use std::io::{Read, Write};

use crate::models::{hash_bitmap, AuditEntry, Canvas, RegionLock};

/// Durable storage for canvas state, the audit trail, and region locks.
///
/// Kept as a trait (rather than a concrete struct, unlike most of the
/// teacher's services) because the storage backend is explicitly out of
/// scope as a collaborator: callers only ever see `Persistence`.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn load_canvas(&self, width: u32, height: u32, empty_fill: [u8; 3]) -> anyhow::Result<Canvas>;
    async fn save_canvas(&self, canvas: &Canvas) -> anyhow::Result<()>;
    async fn append_audit(&self, entry: &AuditEntry) -> anyhow::Result<()>;
    async fn list_locks(&self) -> anyhow::Result<Vec<RegionLock>>;
    async fn put_lock(&self, lock: &RegionLock) -> anyhow::Result<()>;
    async fn delete_lock(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgPersistence {
    pool: PgPool,
}

impl PgPersistence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct CanvasRow {
    width: i32,
    height: i32,
    bitmap: Vec<u8>,
    hash: String,
    last_updated: DateTime<Utc>,
}

#[derive(FromRow)]
struct LockRow {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    locked_by: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

fn compress(bitmap: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bitmap)?;
    Ok(encoder.finish()?)
}

fn decompress(compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(compressed);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[async_trait]
impl Persistence for PgPersistence {
    async fn load_canvas(&self, width: u32, height: u32, empty_fill: [u8; 3]) -> anyhow::Result<Canvas> {
        let row: Option<CanvasRow> = sqlx::query_as(
            "SELECT width, height, bitmap, hash, last_updated FROM canvas_state WHERE id = 'main'",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Canvas {
                width: row.width as u32,
                height: row.height as u32,
                bitmap: decompress(&row.bitmap)?,
                hash: row.hash,
                last_updated: row.last_updated,
            }),
            None => Ok(Canvas::blank(width, height, empty_fill)),
        }
    }

    async fn save_canvas(&self, canvas: &Canvas) -> anyhow::Result<()> {
        let compressed = compress(&canvas.bitmap)?;
        sqlx::query(
            r#"
            INSERT INTO canvas_state (id, width, height, bitmap, hash, last_updated)
            VALUES ('main', $1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                width = EXCLUDED.width,
                height = EXCLUDED.height,
                bitmap = EXCLUDED.bitmap,
                hash = EXCLUDED.hash,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(canvas.width as i32)
        .bind(canvas.height as i32)
        .bind(compressed)
        .bind(&canvas.hash)
        .bind(canvas.last_updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_audit(&self, entry: &AuditEntry) -> anyhow::Result<()> {
        let details = serde_json::to_value(&entry.details)?;
        sqlx::query(
            r#"
            INSERT INTO audit_log ("timestamp", user_id, action, details, ip)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.timestamp)
        .bind(&entry.user_id)
        .bind(&entry.action)
        .bind(details)
        .bind(&entry.ip)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_locks(&self) -> anyhow::Result<Vec<RegionLock>> {
        let rows: Vec<LockRow> = sqlx::query_as(
            "SELECT x1, y1, x2, y2, locked_by, reason, created_at FROM region_locks",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| RegionLock {
                x1: r.x1 as u32,
                y1: r.y1 as u32,
                x2: r.x2 as u32,
                y2: r.y2 as u32,
                locked_by: r.locked_by,
                reason: r.reason,
                created_at: r.created_at,
            })
            .collect())
    }

    async fn put_lock(&self, lock: &RegionLock) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO region_locks (x1, y1, x2, y2, locked_by, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (x1, y1, x2, y2) DO UPDATE SET
                locked_by = EXCLUDED.locked_by,
                reason = EXCLUDED.reason,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(lock.x1 as i32)
        .bind(lock.y1 as i32)
        .bind(lock.x2 as i32)
        .bind(lock.y2 as i32)
        .bind(&lock.locked_by)
        .bind(&lock.reason)
        .bind(lock.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_lock(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM region_locks WHERE x1 = $1 AND y1 = $2 AND x2 = $3 AND y2 = $4")
            .bind(x1 as i32)
            .bind(y1 as i32)
            .bind(x2 as i32)
            .bind(y2 as i32)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Re-verify a loaded canvas's stored hash matches its bytes; a mismatch
/// means the row was corrupted or hand-edited out of band.
pub fn verify_canvas_hash(canvas: &Canvas) -> bool {
    hash_bitmap(&canvas.bitmap) == canvas.hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_roundtrip_preserves_bytes() {
        let original = vec![1u8, 2, 3, 4, 5, 250, 251, 252, 0, 0, 0];
        let compressed = compress(&original).unwrap();
        let restored = decompress(&compressed).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn blank_canvas_passes_hash_verification() {
        let canvas = Canvas::blank(10, 10, [0, 0, 0]);
        assert!(verify_canvas_hash(&canvas));
    }
}
