//! Job queue over the shared `transcript_jobs` table.
//!
//! Claiming is read-then-write, not a compare-and-swap: the deployment model
//! is one best-effort worker at a time, and two concurrent workers may race
//! to the same row. The queue is the sole writer of `status` and `tries`.
//! This module also owns the materialized `transcripts` row upsert.

use anyhow::{anyhow, Result};
use sqlx::{Row, SqlitePool};

use crate::models::{Job, JobStatus, TranscriptRow, TranscriptStatus};

/// Cap on persisted error messages, so stack traces don't grow the table.
const MAX_ERROR_LEN: usize = 2000;

pub struct SqliteJobQueue {
    pool: SqlitePool,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Claim the oldest pending job: move it to `running`, increment
    /// `tries`, clear `last_error`. Returns `None` when the queue is empty.
    pub async fn claim_one(&self) -> Result<Option<Job>> {
        let row = sqlx::query(
            r#"
            SELECT id, media_id, tries, created_at
            FROM transcript_jobs
            WHERE status = 'pending'
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row.get("id");
        let tries: i64 = row.get("tries");

        sqlx::query(
            "UPDATE transcript_jobs SET status = 'running', tries = ?, last_error = NULL WHERE id = ?",
        )
        .bind(tries + 1)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Some(Job {
            id,
            media_id: row.get("media_id"),
            status: JobStatus::Running,
            tries: tries + 1,
            last_error: None,
            created_at: row.get("created_at"),
        }))
    }

    /// Terminal success transition.
    pub async fn mark_done(&self, job_id: i64) -> Result<()> {
        self.set_status(job_id, JobStatus::Done, None).await
    }

    /// Terminal failure transition; `message` is truncated before persisting.
    pub async fn mark_error(&self, job_id: i64, message: &str) -> Result<()> {
        let truncated: String = message.chars().take(MAX_ERROR_LEN).collect();
        self.set_status(job_id, JobStatus::Error, Some(truncated))
            .await
    }

    async fn set_status(
        &self,
        job_id: i64,
        status: JobStatus,
        last_error: Option<String>,
    ) -> Result<()> {
        match last_error {
            Some(message) => {
                sqlx::query("UPDATE transcript_jobs SET status = ?, last_error = ? WHERE id = ?")
                    .bind(status.as_str())
                    .bind(message)
                    .bind(job_id)
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                sqlx::query("UPDATE transcript_jobs SET status = ? WHERE id = ?")
                    .bind(status.as_str())
                    .bind(job_id)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Fetch one job by id.
    pub async fn get(&self, job_id: i64) -> Result<Job> {
        let row = sqlx::query(
            "SELECT id, media_id, status, tries, last_error, created_at FROM transcript_jobs WHERE id = ?",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| anyhow!("no job with id {}", job_id))?;

        let status: String = row.get("status");
        Ok(Job {
            id: row.get("id"),
            media_id: row.get("media_id"),
            status: JobStatus::parse(&status)
                .ok_or_else(|| anyhow!("unknown job status '{}'", status))?,
            tries: row.get("tries"),
            last_error: row.get("last_error"),
            created_at: row.get("created_at"),
        })
    }

    /// Job counts by status, for operator visibility.
    pub async fn counts_by_status(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM transcript_jobs GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("status"), row.get("n")))
            .collect())
    }

    /// Last-write-wins upsert of the materialized per-media outcome row.
    pub async fn upsert_transcript_row(
        &self,
        media_id: &str,
        storage_path: &str,
        status: TranscriptStatus,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO transcripts (media_id, storage_path, status, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(media_id) DO UPDATE SET
                storage_path = excluded.storage_path,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(media_id)
        .bind(storage_path)
        .bind(status.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All materialized rows, optionally restricted to one status. Used by
    /// the batch reindex scan.
    pub async fn list_transcript_rows(
        &self,
        status: Option<TranscriptStatus>,
    ) -> Result<Vec<TranscriptRow>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT media_id, storage_path, status FROM transcripts WHERE status = ? ORDER BY media_id",
                )
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT media_id, storage_path, status FROM transcripts ORDER BY media_id",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter()
            .map(|row| {
                let status: String = row.get("status");
                Ok(TranscriptRow {
                    media_id: row.get("media_id"),
                    storage_path: row.get("storage_path"),
                    status: TranscriptStatus::parse(&status)
                        .ok_or_else(|| anyhow!("unknown transcript status '{}'", status))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use tempfile::TempDir;

    async fn test_pool() -> (TempDir, SqlitePool) {
        let tmp = TempDir::new().unwrap();
        let pool = crate::db::connect_path(&tmp.path().join("trx.sqlite"))
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (tmp, pool)
    }

    async fn insert_job(pool: &SqlitePool, media_id: &str, created_at: i64) -> i64 {
        let result = sqlx::query(
            "INSERT INTO transcript_jobs (media_id, status, tries, created_at) VALUES (?, 'pending', 0, ?)",
        )
        .bind(media_id)
        .bind(created_at)
        .execute(pool)
        .await
        .unwrap();
        result.last_insert_rowid()
    }

    #[tokio::test]
    async fn claim_returns_none_on_empty_queue() {
        let (_tmp, pool) = test_pool().await;
        let queue = SqliteJobQueue::new(pool);
        assert!(queue.claim_one().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_takes_oldest_pending_and_increments_tries() {
        let (_tmp, pool) = test_pool().await;
        let queue = SqliteJobQueue::new(pool.clone());

        insert_job(&pool, "newer", 200).await;
        let older_id = insert_job(&pool, "older", 100).await;

        let job = queue.claim_one().await.unwrap().unwrap();
        assert_eq!(job.id, older_id);
        assert_eq!(job.media_id, "older");
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.tries, 1);

        let stored = queue.get(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Running);
        assert_eq!(stored.tries, 1);
        assert!(stored.last_error.is_none());
    }

    #[tokio::test]
    async fn claim_skips_non_pending_jobs() {
        let (_tmp, pool) = test_pool().await;
        let queue = SqliteJobQueue::new(pool.clone());

        let id = insert_job(&pool, "abc", 100).await;
        queue.claim_one().await.unwrap().unwrap();
        queue.mark_done(id).await.unwrap();

        // Only non-pending rows remain.
        assert!(queue.claim_one().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_clears_previous_error() {
        let (_tmp, pool) = test_pool().await;
        let queue = SqliteJobQueue::new(pool.clone());

        let id = insert_job(&pool, "abc", 100).await;
        queue.claim_one().await.unwrap();
        queue.mark_error(id, "first failure").await.unwrap();

        // An external re-queue flips the job back to pending.
        sqlx::query("UPDATE transcript_jobs SET status = 'pending' WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        let job = queue.claim_one().await.unwrap().unwrap();
        assert_eq!(job.tries, 2);
        let stored = queue.get(id).await.unwrap();
        assert!(stored.last_error.is_none());
    }

    #[tokio::test]
    async fn mark_error_truncates_long_messages() {
        let (_tmp, pool) = test_pool().await;
        let queue = SqliteJobQueue::new(pool.clone());

        let id = insert_job(&pool, "abc", 100).await;
        queue.claim_one().await.unwrap();

        let long = "x".repeat(5000);
        queue.mark_error(id, &long).await.unwrap();

        let stored = queue.get(id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Error);
        assert_eq!(stored.last_error.unwrap().chars().count(), 2000);
    }

    #[tokio::test]
    async fn transcript_row_upsert_is_last_write_wins() {
        let (_tmp, pool) = test_pool().await;
        let queue = SqliteJobQueue::new(pool);

        queue
            .upsert_transcript_row("abc", "transcripts/abc.json", TranscriptStatus::Error)
            .await
            .unwrap();
        queue
            .upsert_transcript_row("abc", "transcripts/abc.json", TranscriptStatus::Present)
            .await
            .unwrap();

        let rows = queue.list_transcript_rows(None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, TranscriptStatus::Present);

        let present = queue
            .list_transcript_rows(Some(TranscriptStatus::Present))
            .await
            .unwrap();
        assert_eq!(present.len(), 1);
        let none = queue
            .list_transcript_rows(Some(TranscriptStatus::None))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn counts_by_status_groups_jobs() {
        let (_tmp, pool) = test_pool().await;
        let queue = SqliteJobQueue::new(pool.clone());

        insert_job(&pool, "a", 1).await;
        insert_job(&pool, "b", 2).await;
        insert_job(&pool, "c", 3).await;
        let first = queue.claim_one().await.unwrap().unwrap();
        queue.mark_done(first.id).await.unwrap();
        queue.claim_one().await.unwrap();

        let counts = queue.counts_by_status().await.unwrap();
        let get = |s: &str| {
            counts
                .iter()
                .find(|(status, _)| status == s)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };
        assert_eq!(get("pending"), 1);
        assert_eq!(get("running"), 1);
        assert_eq!(get("done"), 1);
    }
}
