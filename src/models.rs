//! Core data types flowing through the transcript pipeline.
//!
//! These types represent the transcripts, chunks, indexed documents, jobs,
//! and search results that move from the job queue through fetching,
//! chunking, and indexing to retrieval.

use serde::{Deserialize, Serialize};

use crate::media;

/// One time-aligned utterance unit from the transcript source.
///
/// Segments arrive ordered by `start` ascending and are treated as
/// non-overlapping; the pipeline never reorders them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    /// Offset from the start of the media, in seconds.
    pub start: f64,
    /// Length of the utterance, in seconds.
    pub duration: f64,
}

/// A fetched transcript, persisted verbatim as the storage object.
///
/// `full_text` is always the single-space join of the segment texts in
/// order; construct through [`Transcript::new`] to keep that invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub media_id: String,
    pub media_url: String,
    pub language: Option<String>,
    pub language_code: Option<String>,
    pub segments: Vec<TranscriptSegment>,
    pub full_text: String,
}

impl Transcript {
    /// Build a transcript, deriving `media_url` and `full_text`.
    ///
    /// An empty segment list yields `full_text == ""`.
    pub fn new(
        media_id: &str,
        language: Option<String>,
        language_code: Option<String>,
        segments: Vec<TranscriptSegment>,
    ) -> Self {
        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            media_id: media_id.to_string(),
            media_url: media::watch_url(media_id),
            language,
            language_code,
            segments,
            full_text,
        }
    }
}

/// Metadata attached to every chunk and carried into the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub media_id: String,
    /// Start of the chunk's first segment, in seconds.
    pub start_time: f64,
    /// Deep link into the media at `start_time`.
    pub timestamp_url: String,
}

/// A merged run of segments bounded by a word budget, used as the retrieval
/// granularity. Derived and disposable: recomputed from a [`Transcript`]
/// whenever the media is reingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// The persisted unit inside the vector index.
///
/// `id` is deterministically `{media_id}_{chunk_index}`, so reingesting the
/// same media upserts in place instead of growing the index.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Equality filter applied to document metadata during search.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub media_id: Option<String>,
}

/// A single semantic search hit, shaped for direct consumption by a
/// calling agent or tool layer.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub content: String,
    pub media_id: String,
    /// Start time of the matching chunk, in seconds.
    pub timestamp: f64,
    pub url: Option<String>,
}

/// Lifecycle status of a transcript-fetch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "done" => Some(JobStatus::Done),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }
}

/// A row from the shared job table.
///
/// Rows are created by an external producer; this crate only claims and
/// transitions them. The queue is the sole writer of `status` and `tries`.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub media_id: String,
    pub status: JobStatus,
    pub tries: i64,
    pub last_error: Option<String>,
    /// Unix timestamp (seconds); claim order is `created_at` ascending.
    pub created_at: i64,
}

/// Materialized outcome for one media id, independent of job history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptStatus {
    Present,
    None,
    Error,
}

impl TranscriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptStatus::Present => "present",
            TranscriptStatus::None => "none",
            TranscriptStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(TranscriptStatus::Present),
            "none" => Some(TranscriptStatus::None),
            "error" => Some(TranscriptStatus::Error),
            _ => None,
        }
    }
}

/// A row of the materialized `transcripts` table, upserted by media id
/// with last-write-wins semantics.
#[derive(Debug, Clone)]
pub struct TranscriptRow {
    pub media_id: String,
    pub storage_path: String,
    pub status: TranscriptStatus,
}
