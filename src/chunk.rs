//! Context-window transcript chunker.
//!
//! Folds time-aligned segments into chunks bounded by a configurable word
//! budget. A single segment is often too short to retrieve on its own, so
//! consecutive segments are merged until the budget would overflow. Each
//! chunk keeps the start time of its first segment, so search results can
//! deep-link back into the media.

use crate::media;
use crate::models::{Chunk, ChunkMetadata, Transcript};

/// Split a transcript into word-budgeted chunks, preserving segment order.
///
/// Deterministic and pure. The overflow check only fires when the buffer
/// already holds words, so a segment that alone exceeds `max_words` still
/// forms its own chunk; segments are never dropped or split. An empty
/// segment list yields an empty chunk list.
pub fn chunk_transcript(transcript: &Transcript, max_words: usize) -> Vec<Chunk> {
    let segments = &transcript.segments;
    if segments.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut word_count = 0usize;
    let mut buffer_start = segments[0].start;

    for seg in segments {
        let words = seg.text.split_whitespace().count();

        if word_count + words > max_words && word_count > 0 {
            chunks.push(make_chunk(&transcript.media_id, &buffer, buffer_start));
            buffer.clear();
            word_count = 0;
            buffer_start = seg.start;
        }

        buffer.push(' ');
        buffer.push_str(&seg.text);
        word_count += words;
    }

    if word_count > 0 {
        chunks.push(make_chunk(&transcript.media_id, &buffer, buffer_start));
    }

    chunks
}

fn make_chunk(media_id: &str, buffer: &str, start_time: f64) -> Chunk {
    Chunk {
        text: buffer.trim().to_string(),
        metadata: ChunkMetadata {
            media_id: media_id.to_string(),
            start_time,
            timestamp_url: media::timestamp_url(media_id, start_time),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TranscriptSegment;

    fn seg(text: &str, start: f64) -> TranscriptSegment {
        TranscriptSegment {
            text: text.to_string(),
            start,
            duration: 2.0,
        }
    }

    fn transcript(segments: Vec<TranscriptSegment>) -> Transcript {
        Transcript::new("abc123", None, None, segments)
    }

    #[test]
    fn empty_segments_yield_no_chunks() {
        let chunks = chunk_transcript(&transcript(Vec::new()), 120);
        assert!(chunks.is_empty());
    }

    #[test]
    fn flushes_when_budget_would_overflow() {
        // Two words fit; four more would exceed three, so the buffer flushes
        // before the second segment is appended.
        let t = transcript(vec![seg("hello world", 0.0), seg("this is a test", 2.0)]);
        let chunks = chunk_transcript(&t, 3);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].metadata.start_time, 0.0);
        assert_eq!(chunks[1].text, "this is a test");
        assert_eq!(chunks[1].metadata.start_time, 2.0);
    }

    #[test]
    fn merges_small_segments_under_budget() {
        let t = transcript(vec![
            seg("one two", 0.0),
            seg("three four", 2.0),
            seg("five six", 4.0),
        ]);
        let chunks = chunk_transcript(&t, 120);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "one two three four five six");
        assert_eq!(chunks[0].metadata.start_time, 0.0);
    }

    #[test]
    fn oversized_segment_forms_its_own_chunk() {
        let big = "w ".repeat(50).trim().to_string();
        let t = transcript(vec![seg("small", 0.0), seg(&big, 2.0), seg("tail", 4.0)]);
        let chunks = chunk_transcript(&t, 10);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "small");
        assert_eq!(chunks[1].text, big);
        assert_eq!(chunks[1].metadata.start_time, 2.0);
        assert_eq!(chunks[2].text, "tail");
    }

    #[test]
    fn concatenation_reproduces_every_word_once() {
        let t = transcript(vec![
            seg("alpha beta gamma", 0.0),
            seg("delta epsilon", 3.0),
            seg("zeta eta theta iota", 6.0),
            seg("kappa", 9.0),
        ]);
        let chunks = chunk_transcript(&t, 4);

        let rebuilt: Vec<&str> = chunks
            .iter()
            .flat_map(|c| c.text.split_whitespace())
            .collect();
        let original: Vec<&str> = t.full_text.split_whitespace().collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn word_budget_holds_except_for_oversized_segments() {
        let t = transcript(vec![
            seg("a b c", 0.0),
            seg("d e f g", 1.0),
            seg("h", 2.0),
            seg("i j k l m n o p q r s t", 3.0), // alone exceeds the budget
            seg("u v", 4.0),
        ]);
        let max_words = 6;
        let chunks = chunk_transcript(&t, max_words);

        for chunk in &chunks {
            let count = chunk.text.split_whitespace().count();
            let single_segment = t
                .segments
                .iter()
                .any(|s| s.text == chunk.text && s.text.split_whitespace().count() > max_words);
            assert!(
                count <= max_words || single_segment,
                "chunk over budget without being a lone oversized segment: '{}'",
                chunk.text
            );
        }
    }

    #[test]
    fn deterministic_across_calls() {
        let t = transcript(vec![
            seg("the quick brown fox", 0.0),
            seg("jumps over", 2.5),
            seg("the lazy dog", 4.0),
        ]);
        let a = chunk_transcript(&t, 5);
        let b = chunk_transcript(&t, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn every_chunk_carries_a_timestamp_url() {
        let t = transcript(vec![
            seg("one two three", 0.0),
            seg("four five six", 10.5),
            seg("seven eight nine", 20.9),
        ]);
        let chunks = chunk_transcript(&t, 3);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert_eq!(
                chunk.metadata.timestamp_url,
                media::timestamp_url("abc123", chunk.metadata.start_time)
            );
        }
        // Truncated to whole seconds, including on the final chunk.
        assert_eq!(chunks[2].metadata.timestamp_url, "https://youtu.be/abc123?t=20");
    }

    #[test]
    fn start_time_is_first_folded_segment() {
        let t = transcript(vec![
            seg("one two", 1.25),
            seg("three four", 3.5),
            seg("five six", 7.0),
        ]);
        let chunks = chunk_transcript(&t, 4);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.start_time, 1.25);
        assert_eq!(chunks[1].metadata.start_time, 7.0);
    }
}
