//! Transcript source client.
//!
//! The transcript service is an external black box that returns time-aligned
//! text segments for a media id. The one distinction that matters to callers
//! is between "this media has no transcript" (an expected steady-state
//! outcome) and an operational fault (network, rate limit, auth); the
//! [`FetchOutcome`] tag keeps the two from being conflated.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::TranscriptConfig;
use crate::models::{Transcript, TranscriptSegment};

/// Result of asking the source for a transcript.
///
/// `Ok(Available)` carries the transcript, `Ok(Unavailable)` means the
/// source has no track for this media, and `Err(_)` is a transient fault
/// worth recording and retrying.
#[derive(Debug)]
pub enum FetchOutcome {
    Available(Transcript),
    Unavailable,
}

/// Capability contract for the transcript source.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch the transcript for `media_id`, preferring languages in the
    /// given order (first match wins, source-defined fallback within it).
    async fn fetch(&self, media_id: &str, languages: &[String]) -> Result<FetchOutcome>;
}

/// HTTP client for a transcript service.
pub struct HttpTranscriptSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTranscriptSource {
    pub fn new(config: &TranscriptConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[derive(Deserialize)]
struct TranscriptResponse {
    language: Option<String>,
    language_code: Option<String>,
    #[serde(default)]
    segments: Vec<SegmentResponse>,
}

#[derive(Deserialize)]
struct SegmentResponse {
    text: String,
    start: f64,
    duration: f64,
}

#[async_trait]
impl TranscriptSource for HttpTranscriptSource {
    async fn fetch(&self, media_id: &str, languages: &[String]) -> Result<FetchOutcome> {
        let url = format!(
            "{}/transcripts/{}?languages={}",
            self.base_url,
            media_id,
            languages.join(",")
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("transcript request failed for {}", media_id))?;

        let status = resp.status();

        // The service answers 404 when no track exists for the media in any
        // of the requested languages. That is data, not a fault.
        if status.as_u16() == 404 {
            return Ok(FetchOutcome::Unavailable);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "transcript source error {} for {}: {}",
                status,
                media_id,
                body
            );
        }

        let parsed: TranscriptResponse = resp
            .json()
            .await
            .with_context(|| format!("invalid transcript response for {}", media_id))?;

        let segments: Vec<TranscriptSegment> = parsed
            .segments
            .into_iter()
            .map(|s| TranscriptSegment {
                text: s.text,
                start: s.start,
                duration: s.duration,
            })
            .collect();

        Ok(FetchOutcome::Available(Transcript::new(
            media_id,
            parsed.language,
            parsed.language_code,
            segments,
        )))
    }
}
