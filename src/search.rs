//! Semantic search over the transcript index.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::index::{SqliteVectorIndex, VectorIndex};
use crate::models::MetadataFilter;

pub async fn run_search(
    cfg: &Config,
    query: &str,
    media: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    if !cfg.embedding.is_enabled() {
        bail!("Search requires embeddings. Set [embedding] provider in config.");
    }

    let pool = db::connect(cfg).await?;
    let index = SqliteVectorIndex::new(pool.clone(), cfg.embedding.clone())?;

    let k = limit.unwrap_or(cfg.retrieval.limit);
    let filter = media.map(|m| MetadataFilter {
        media_id: Some(m),
    });

    let results = index.search(query, k, filter.as_ref()).await?;

    if results.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. {} @ {}",
            i + 1,
            result.media_id,
            format_timestamp(result.timestamp)
        );
        if let Some(ref url) = result.url {
            println!("    url: {}", url);
        }
        println!("    excerpt: \"{}\"", excerpt(&result.content, 240));
        println!();
    }

    pool.close().await;
    Ok(())
}

/// Render seconds as `m:ss` or `h:mm:ss`.
fn format_timestamp(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
