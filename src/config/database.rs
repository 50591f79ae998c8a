#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Create the canvas schema if it does not already exist.
///
/// `canvas_state` holds a single row (`id = 'main'`) carrying the
/// gzip-compressed bitmap, its content hash, and the last-applied
/// timestamp. `audit_log` is append-only. `region_locks` is keyed by the
/// rectangle itself since two locks never share a key.
pub async fn init_schema(pool: &sqlx::PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Checking and creating canvas schema...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS canvas_state (
            id TEXT PRIMARY KEY,
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            bitmap BYTEA NOT NULL,
            hash TEXT NOT NULL,
            last_updated TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("ALTER TABLE canvas_state ADD COLUMN IF NOT EXISTS hash TEXT NOT NULL DEFAULT ''")
        .execute(pool)
        .await
        .ok();

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id BIGSERIAL PRIMARY KEY,
            "timestamp" TIMESTAMPTZ NOT NULL DEFAULT now(),
            user_id TEXT,
            action TEXT NOT NULL,
            details JSONB NOT NULL,
            ip TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS audit_log_timestamp_idx ON audit_log ("timestamp")"#)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS region_locks (
            x1 INTEGER NOT NULL,
            y1 INTEGER NOT NULL,
            x2 INTEGER NOT NULL,
            y2 INTEGER NOT NULL,
            locked_by TEXT NOT NULL,
            reason TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (x1, y1, x2, y2)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Canvas schema ready");
    Ok(())
}
