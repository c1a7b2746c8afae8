//! Ingestion orchestration.
//!
//! Drives one media id through resolve → existence check → fetch → store →
//! chunk → index, and one claimed job through to a terminal status. The job
//! boundary here is the single place where collaborator failures are
//! absorbed: every error becomes a job status plus a truncated message, and
//! nothing propagates from one job's processing into another run.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::chunk::chunk_transcript;
use crate::config::Config;
use crate::db;
use crate::index::{documents_from_chunks, SqliteVectorIndex, VectorIndex};
use crate::media;
use crate::models::{Transcript, TranscriptStatus};
use crate::queue::SqliteJobQueue;
use crate::storage::{BucketStore, ObjectStore};
use crate::transcript::{FetchOutcome, HttpTranscriptSource, TranscriptSource};

/// Collaborator handles for one pipeline run, injected by the caller.
pub struct PipelineDeps<'a> {
    pub source: &'a dyn TranscriptSource,
    pub store: &'a dyn ObjectStore,
    pub index: &'a dyn VectorIndex,
}

/// What happened for one media id.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaOutcome {
    /// Transcript stored and indexed, or already stored and skipped.
    Present { url: Option<String>, chunks: usize },
    /// The source has no transcript; nothing was written.
    None,
}

/// Conventional object path for a media id.
pub fn storage_path(prefix: &str, media_id: &str) -> String {
    format!("{}/{}.json", prefix.trim_end_matches('/'), media_id)
}

/// Run the fetch → store → chunk → index pipeline for one media reference.
///
/// Honors `worker.skip_if_exists` (reuse the stored object, skip the
/// re-fetch and re-ingest) and `worker.upload_if_empty` (store an empty
/// transcript object when the source has nothing). Errors here are
/// operational faults; "no transcript" is a [`MediaOutcome::None`], not an
/// error.
pub async fn process_media(
    cfg: &Config,
    deps: &PipelineDeps<'_>,
    media_ref: &str,
) -> Result<MediaOutcome> {
    let media_id = media::resolve(media_ref)?;
    let path = storage_path(&cfg.storage.prefix, &media_id);

    if cfg.worker.skip_if_exists && deps.store.exists(&path).await {
        let url = deps.store.resolve_url(&path).await.ok();
        println!("- {}: already stored -> skip", media_id);
        return Ok(MediaOutcome::Present { url, chunks: 0 });
    }

    let outcome = deps
        .source
        .fetch(&media_id, &cfg.transcript.languages)
        .await
        .with_context(|| format!("transcript fetch failed for {}", media_id))?;

    let transcript = match outcome {
        FetchOutcome::Available(t) => t,
        FetchOutcome::Unavailable => {
            if !cfg.worker.upload_if_empty {
                println!("- {}: no transcript available -> skip", media_id);
                return Ok(MediaOutcome::None);
            }
            Transcript::new(&media_id, None, None, Vec::new())
        }
    };

    if transcript.segments.is_empty() && !cfg.worker.upload_if_empty {
        println!("- {}: 0 segments -> skip", media_id);
        return Ok(MediaOutcome::None);
    }

    let url = deps
        .store
        .write_json(&path, &serde_json::to_value(&transcript)?, true)
        .await
        .with_context(|| format!("storing transcript for {}", media_id))?;

    let chunks = chunk_transcript(&transcript, cfg.chunking.max_words);
    let documents = documents_from_chunks(&chunks);
    deps.index
        .ingest(&documents)
        .await
        .with_context(|| format!("indexing transcript for {}", media_id))?;

    println!("+ {}: stored and indexed {} chunks", media_id, documents.len());
    Ok(MediaOutcome::Present {
        url: Some(url),
        chunks: documents.len(),
    })
}

/// Drive one claimed job to a terminal status.
///
/// Every pipeline failure is converted into the job's `error` status; errors
/// returned from this function are bookkeeping faults only (the job table
/// itself was unreachable).
pub async fn process_job(
    cfg: &Config,
    deps: &PipelineDeps<'_>,
    queue: &SqliteJobQueue,
    job: &crate::models::Job,
) -> Result<()> {
    let path = storage_path(&cfg.storage.prefix, &job.media_id);

    match process_media(cfg, deps, &job.media_id).await {
        Ok(MediaOutcome::Present { url, .. }) => {
            queue
                .upsert_transcript_row(&job.media_id, &path, TranscriptStatus::Present)
                .await?;
            queue.mark_done(job.id).await?;
            println!(
                "[worker] done media={} url={}",
                job.media_id,
                url.unwrap_or_default()
            );
        }
        Ok(MediaOutcome::None) => {
            queue
                .upsert_transcript_row(&job.media_id, &path, TranscriptStatus::None)
                .await?;
            queue.mark_done(job.id).await?;
            println!(
                "[worker] no transcript for media={} -> marked none",
                job.media_id
            );
        }
        Err(e) => {
            queue
                .upsert_transcript_row(&job.media_id, &path, TranscriptStatus::Error)
                .await?;
            queue.mark_error(job.id, &format!("{:#}", e)).await?;
            println!("[worker] error media={}: {:#}", job.media_id, e);
        }
    }

    Ok(())
}

/// One worker invocation: claim at most one pending job, process it fully,
/// sleep the cooldown, exit.
pub async fn run_worker(cfg: &Config) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let queue = SqliteJobQueue::new(pool.clone());

    let Some(job) = queue.claim_one().await? else {
        println!("[worker] no pending job -> exit");
        pool.close().await;
        return Ok(());
    };

    println!(
        "[worker] processing job={} media={} (try {})",
        job.id, job.media_id, job.tries
    );

    let source = HttpTranscriptSource::new(&cfg.transcript)?;
    let store = BucketStore::from_config(&cfg.storage)?;
    let index = SqliteVectorIndex::new(pool.clone(), cfg.embedding.clone())?;
    let deps = PipelineDeps {
        source: &source,
        store: &store,
        index: &index,
    };

    process_job(cfg, &deps, &queue, &job).await?;

    tokio::time::sleep(Duration::from_secs(cfg.worker.sleep_after_secs)).await;
    pool.close().await;
    Ok(())
}

/// Run the pipeline directly for one media reference, outside the queue.
pub async fn run_ingest(cfg: &Config, media_ref: &str) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let source = HttpTranscriptSource::new(&cfg.transcript)?;
    let store = BucketStore::from_config(&cfg.storage)?;
    let index = SqliteVectorIndex::new(pool.clone(), cfg.embedding.clone())?;
    let deps = PipelineDeps {
        source: &source,
        store: &store,
        index: &index,
    };

    let queue = SqliteJobQueue::new(pool.clone());
    let media_id = media::resolve(media_ref)?;
    let path = storage_path(&cfg.storage.prefix, &media_id);

    match process_media(cfg, &deps, media_ref).await {
        Ok(MediaOutcome::Present { url, chunks }) => {
            queue
                .upsert_transcript_row(&media_id, &path, TranscriptStatus::Present)
                .await?;
            println!("ingest {}", media_id);
            println!("  chunks indexed: {}", chunks);
            if let Some(url) = url {
                println!("  url: {}", url);
            }
        }
        Ok(MediaOutcome::None) => {
            queue
                .upsert_transcript_row(&media_id, &path, TranscriptStatus::None)
                .await?;
            println!("ingest {}", media_id);
            println!("  no transcript available");
        }
        Err(e) => {
            queue
                .upsert_transcript_row(&media_id, &path, TranscriptStatus::Error)
                .await?;
            pool.close().await;
            return Err(e);
        }
    }

    pool.close().await;
    Ok(())
}

/// Rebuild the vector index from every stored transcript blob.
pub async fn run_reindex(cfg: &Config) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let queue = SqliteJobQueue::new(pool.clone());
    let store = BucketStore::from_config(&cfg.storage)?;
    let index = SqliteVectorIndex::new(pool.clone(), cfg.embedding.clone())?;

    reindex_all(cfg, &queue, &store, &index).await?;

    pool.close().await;
    Ok(())
}

/// Full-scan re-ingestion: download every `present` transcript, chunk it,
/// and upsert its documents. Idempotent thanks to deterministic ids.
pub async fn reindex_all(
    cfg: &Config,
    queue: &SqliteJobQueue,
    store: &dyn ObjectStore,
    index: &dyn VectorIndex,
) -> Result<()> {
    let rows = queue
        .list_transcript_rows(Some(TranscriptStatus::Present))
        .await?;
    println!("reindex: {} stored transcripts", rows.len());

    let mut media_indexed = 0u64;
    let mut chunks_ingested = 0u64;

    for row in &rows {
        let value = match store.download_json(&row.storage_path).await {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Warning: failed to download {}: {:#}", row.storage_path, e);
                continue;
            }
        };

        let transcript: Transcript = match serde_json::from_value(value) {
            Ok(t) => t,
            Err(e) => {
                eprintln!(
                    "Warning: stored object {} is not a transcript: {}",
                    row.storage_path, e
                );
                continue;
            }
        };

        let chunks = chunk_transcript(&transcript, cfg.chunking.max_words);
        let documents = documents_from_chunks(&chunks);
        index
            .ingest(&documents)
            .await
            .with_context(|| format!("indexing transcript for {}", row.media_id))?;

        println!("  {} -> {} chunks", row.media_id, documents.len());
        media_indexed += 1;
        chunks_ingested += documents.len() as u64;
    }

    println!("reindex done");
    println!("  media indexed: {}", media_indexed);
    println!("  chunks ingested: {}", chunks_ingested);
    println!("  documents in index: {}", index.count().await?);

    Ok(())
}
