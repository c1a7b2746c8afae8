//! Persistent vector index over transcript chunks.
//!
//! Documents are stored in SQLite with their embeddings as little-endian
//! f32 BLOBs; similarity is cosine, computed in Rust over the decoded
//! vectors. Document ids are deterministic (`{media_id}_{chunk_index}`) and
//! ingestion upserts by id, so reingesting the same media replaces its
//! documents instead of growing the index.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::config::EmbeddingConfig;
use crate::embedding::{self, EmbeddingProvider};
use crate::models::{Chunk, IndexedDocument, MetadataFilter, SearchResult};

/// Capability contract for the vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embed and upsert documents. No-op on empty input.
    async fn ingest(&self, documents: &[IndexedDocument]) -> Result<()>;

    /// Return the `k` nearest documents to `query`, restricted to documents
    /// whose metadata equals `filter` on every supplied key. Returns an
    /// empty vector (never an error) when nothing is indexed or nothing
    /// matches.
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Total number of indexed documents.
    async fn count(&self) -> Result<u64>;
}

/// Map chunks to their indexable form with deterministic ids.
pub fn documents_from_chunks(chunks: &[Chunk]) -> Vec<IndexedDocument> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| IndexedDocument {
            id: format!("{}_{}", c.metadata.media_id, i),
            text: c.text.clone(),
            metadata: c.metadata.clone(),
        })
        .collect()
}

/// SQLite-backed [`VectorIndex`].
pub struct SqliteVectorIndex {
    pool: SqlitePool,
    config: EmbeddingConfig,
    provider: Box<dyn EmbeddingProvider>,
}

impl SqliteVectorIndex {
    pub fn new(pool: SqlitePool, config: EmbeddingConfig) -> Result<Self> {
        let provider = embedding::create_provider(&config)?;
        Ok(Self {
            pool,
            config,
            provider,
        })
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn ingest(&self, documents: &[IndexedDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        for batch in documents.chunks(self.config.batch_size) {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let vectors = embedding::embed_texts(self.provider.as_ref(), &self.config, &texts)
                .await
                .context("embedding documents failed")?;

            for (doc, vec) in batch.iter().zip(vectors.iter()) {
                let blob = embedding::vec_to_blob(vec);
                sqlx::query(
                    r#"
                    INSERT INTO index_documents (id, media_id, start_time, timestamp_url, text, embedding)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        media_id = excluded.media_id,
                        start_time = excluded.start_time,
                        timestamp_url = excluded.timestamp_url,
                        text = excluded.text,
                        embedding = excluded.embedding
                    "#,
                )
                .bind(&doc.id)
                .bind(&doc.metadata.media_id)
                .bind(doc.metadata.start_time)
                .bind(&doc.metadata.timestamp_url)
                .bind(&doc.text)
                .bind(blob)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embedding::embed_query(self.provider.as_ref(), &self.config, query)
            .await
            .context("embedding query failed")?;

        let media_filter = filter.and_then(|f| f.media_id.as_deref());
        let rows = match media_filter {
            Some(media_id) => {
                sqlx::query(
                    "SELECT media_id, start_time, timestamp_url, text, embedding
                     FROM index_documents WHERE media_id = ?",
                )
                .bind(media_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT media_id, start_time, timestamp_url, text, embedding
                     FROM index_documents",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut scored: Vec<(f64, SearchResult)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = embedding::blob_to_vec(&blob);
                let similarity = embedding::cosine_similarity(&query_vec, &vec) as f64;
                let result = SearchResult {
                    content: row.get("text"),
                    media_id: row.get("media_id"),
                    timestamp: row.get("start_time"),
                    url: row.get("timestamp_url"),
                };
                (similarity, result)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, r)| r).collect())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
