use crate::error::ConfigError;
use crate::models::Chunk;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
    lookback: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::InvalidChunking(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::InvalidChunking(format!(
                "chunk_overlap {chunk_overlap} must be smaller than chunk_size {chunk_size}"
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: Self::default_separators(),
            lookback: chunk_size / 5,
        })
    }

    pub fn default_separators() -> Vec<String> {
        vec!["\n\n".to_string(), "\n".to_string(), " ".to_string()]
    }

    /// Separators in priority order. Empty strings are ignored.
    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators
            .into_iter()
            .filter(|separator| !separator.is_empty())
            .collect();
        self
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    fn step_floor(&self, start: usize) -> usize {
        start + self.chunk_overlap + 1
    }
}

/// A piece of page text and the char offset where it begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub text: String,
}

// Lengths and offsets are in chars. Consecutive spans share exactly `chunk_overlap` chars.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<TextSpan> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::new();
    if chars.is_empty() {
        return spans;
    }

    let mut start = 0;
    loop {
        let hard_end = (start + config.chunk_size).min(chars.len());
        if hard_end == chars.len() {
            spans.push(span(&chars, start, hard_end));
            break;
        }

        let end = find_break(&chars, start, hard_end, config);
        spans.push(span(&chars, start, end));
        start = end - config.chunk_overlap;
    }

    spans
}

/// Returns the page's chunks and the ordinal the next page starts from.
pub fn split_page(
    page_text: &str,
    source: &str,
    page: u32,
    config: &ChunkingConfig,
    first_ordinal: u64,
) -> (Vec<Chunk>, u64) {
    let mut cursor = first_ordinal;
    let chunks = split_text(page_text, config)
        .into_iter()
        .map(|span| {
            let chunk = Chunk {
                chunk_id: make_chunk_id(source, page, cursor, &span.text),
                source: source.to_string(),
                page,
                ordinal: cursor,
                start: span.start,
                text: span.text,
            };
            cursor = cursor.saturating_add(1);
            chunk
        })
        .collect();

    (chunks, cursor)
}

fn span(chars: &[char], start: usize, end: usize) -> TextSpan {
    TextSpan {
        start,
        text: chars[start..end].iter().collect(),
    }
}

// The break must leave the next window starting after `start`, so the
// earliest acceptable end is `start + overlap + 1`.
fn find_break(chars: &[char], start: usize, hard_end: usize, config: &ChunkingConfig) -> usize {
    let earliest = config
        .step_floor(start)
        .max(hard_end.saturating_sub(config.lookback));
    if earliest > hard_end {
        return hard_end;
    }

    for separator in &config.separators {
        let needle: Vec<char> = separator.chars().collect();
        if let Some(end) = last_separator_end(chars, &needle, earliest, hard_end) {
            return end;
        }
    }

    hard_end
}

fn last_separator_end(chars: &[char], needle: &[char], earliest: usize, latest: usize) -> Option<usize> {
    (earliest..=latest).rev().find(|&end| {
        end >= needle.len() && chars[end - needle.len()..end] == *needle
    })
}

fn make_chunk_id(source: &str, page: u32, ordinal: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update(ordinal.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(spans: &[TextSpan], overlap: usize) -> String {
        let mut text = String::new();
        for (index, span) in spans.iter().enumerate() {
            let skip = if index == 0 { 0 } else { overlap };
            text.extend(span.text.chars().skip(skip));
        }
        text
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        assert!(ChunkingConfig::new(10, 10).is_err());
        assert!(ChunkingConfig::new(10, 11).is_err());
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert!(ChunkingConfig::new(10, 9).is_ok());
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let config = ChunkingConfig::new(10, 3).unwrap();
        assert!(split_text("", &config).is_empty());
    }

    #[test]
    fn hard_cuts_step_by_size_minus_overlap() {
        let config = ChunkingConfig::new(10, 3).unwrap();
        let text = "abcdefghijklmnopqrstuvwxy";
        assert_eq!(text.chars().count(), 25);

        let spans = split_text(text, &config);
        let starts: Vec<usize> = spans.iter().map(|span| span.start).collect();
        let lengths: Vec<usize> = spans.iter().map(|span| span.text.chars().count()).collect();

        assert_eq!(starts, vec![0, 7, 14, 21]);
        assert_eq!(lengths, vec![10, 10, 10, 4]);
        assert_eq!(spans[1].text, "hijklmnopq");
        assert_eq!(reconstruct(&spans, 3), text);
    }

    #[test]
    fn short_text_is_a_single_identical_chunk() {
        let config = ChunkingConfig::new(20, 5).unwrap();
        for text in ["a", "alpha beta gamma", "exactly twenty chars"] {
            let spans = split_text(text, &config);
            assert_eq!(spans.len(), 1);
            assert_eq!(spans[0].text, text);
            assert_eq!(spans[0].start, 0);
        }
    }

    #[test]
    fn prefers_separator_near_the_boundary() {
        let config = ChunkingConfig::new(12, 2).unwrap().with_lookback(6);
        let spans = split_text("one two\nthree four five", &config);

        assert_eq!(spans[0].text, "one two\n");
        assert!(spans[1].text.starts_with("o\n"));
    }

    #[test]
    fn paragraph_breaks_win_over_spaces() {
        let config = ChunkingConfig::new(16, 0).unwrap().with_lookback(10);
        let spans = split_text("aaaa\n\nbbbb cccc dddd", &config);
        assert_eq!(spans[0].text, "aaaa\n\n");
    }

    #[test]
    fn chunks_respect_size_overlap_and_reconstruct() {
        let texts = [
            "The quick brown fox jumps over the lazy dog.\nIt was not amused.\n\nThe end.",
            "no-separators-here-at-all-just-one-very-long-token-of-text",
            "ümlauts und ßpecial çhars spread across many words to split",
            "   leading and trailing whitespace survives   ",
        ];
        let configs = [(8, 0), (8, 3), (10, 9), (16, 4), (30, 10), (5, 1)];

        for (size, overlap) in configs {
            let config = ChunkingConfig::new(size, overlap).unwrap().with_lookback(size);
            for text in texts {
                let spans = split_text(text, &config);
                for pair in spans.windows(2) {
                    let left: Vec<char> = pair[0].text.chars().collect();
                    let right: Vec<char> = pair[1].text.chars().collect();
                    assert_eq!(left[left.len() - overlap..], right[..overlap]);
                }
                assert!(spans.iter().all(|span| span.text.chars().count() <= size));
                assert_eq!(reconstruct(&spans, overlap), text, "size={size} overlap={overlap}");
            }
        }
    }

    #[test]
    fn page_chunks_carry_source_page_and_ordinals() {
        let config = ChunkingConfig::new(10, 3).unwrap();
        let (chunks, next) = split_page("abcdefghijklmnopqrstuvwxy", "A.pdf", 2, &config, 5);

        assert_eq!(chunks.len(), 4);
        assert_eq!(next, 9);
        assert!(chunks.iter().all(|chunk| chunk.source == "A.pdf" && chunk.page == 2));
        assert_eq!(chunks[0].ordinal, 5);
        assert_eq!(chunks[3].ordinal, 8);
        assert_ne!(chunks[0].chunk_id, chunks[1].chunk_id);
    }
}
