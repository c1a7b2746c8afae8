use anyhow::Result;
use sqlx::SqlitePool;

/// Create the job, transcript, and index tables. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Job queue. Rows are inserted by an external producer; this crate only
    // claims and transitions them.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcript_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            media_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            tries INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Materialized per-media outcome, upserted by media_id.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcripts (
            media_id TEXT PRIMARY KEY,
            storage_path TEXT NOT NULL,
            status TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Vector index: one row per chunk document, embedding stored as
    // little-endian f32 bytes.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_documents (
            id TEXT PRIMARY KEY,
            media_id TEXT NOT NULL,
            start_time REAL NOT NULL,
            timestamp_url TEXT,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON transcript_jobs(status, created_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_index_documents_media ON index_documents(media_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
