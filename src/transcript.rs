use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::config::ParserConfig;
use crate::error::DeckError;

/// One timestamped block of the raw transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Text lines of the block, joined with single spaces
    pub text: String,
}

impl RawEntry {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Parser for timestamped transcript text
///
/// The input format is blocks of a `MM:SS-MM:SS` (or `H:MM:SS-H:MM:SS`)
/// range line followed by one or more text lines, separated by blank
/// lines. Lines may carry a `N→` line-number prefix which is stripped
/// before matching. Anything that doesn't fit the format is skipped.
pub struct TranscriptParser {
    config: ParserConfig,
    timestamp_re: Regex,
}

impl TranscriptParser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            timestamp_re: Regex::new(r"^(\d+:\d+(?::\d+)?)-(\d+:\d+(?::\d+)?)$")
                .expect("timestamp pattern is valid"),
        }
    }

    /// Parse a transcript file into filtered, time-ordered entries.
    /// A missing file is a configuration error and fatal.
    pub async fn parse_file(&self, path: &Path) -> Result<Vec<RawEntry>> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            DeckError::Configuration(format!("Cannot read transcript {}: {}", path.display(), e))
        })?;
        let entries = self.parse(&content);
        info!(
            "📜 Parsed {} entries from {}",
            entries.len(),
            path.display()
        );
        Ok(entries)
    }

    /// Parse transcript text into filtered entries
    pub fn parse(&self, content: &str) -> Vec<RawEntry> {
        let lines: Vec<&str> = content.trim().lines().collect();
        let mut entries = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = strip_line_prefix(lines[i].trim());

            let Some(caps) = self.timestamp_re.captures(line) else {
                i += 1;
                continue;
            };
            let (Some(start), Some(end)) = (
                parse_clock_time(&caps[1]),
                parse_clock_time(&caps[2]),
            ) else {
                i += 1;
                continue;
            };

            i += 1;
            let mut text_lines = Vec::new();
            while i < lines.len() {
                let text_line = strip_line_prefix(lines[i].trim());
                if text_line.is_empty() || self.timestamp_re.is_match(text_line) {
                    break;
                }
                text_lines.push(text_line);
                i += 1;
            }

            let text = text_lines.join(" ");
            if self.keep(start, &text) {
                entries.push(RawEntry { start, end, text });
            } else {
                debug!("Filtered entry at {:.0}s", start);
            }
        }

        entries
    }

    fn keep(&self, start: f64, text: &str) -> bool {
        if text.is_empty() || text.chars().count() <= self.config.min_chars {
            return false;
        }
        if self.config.drop_exact.iter().any(|d| d == text.trim()) {
            return false;
        }
        if self
            .config
            .excluded_ranges
            .iter()
            .any(|&(lo, hi)| lo <= start && start <= hi)
        {
            return false;
        }
        if self.config.exclude_foreign_script && is_mostly_ascii(text) {
            return false;
        }
        true
    }
}

/// Strip a leading `N→` line-number prefix, if present
fn strip_line_prefix(line: &str) -> &str {
    match line.split_once('→') {
        Some((_, rest)) => rest,
        None => line,
    }
}

/// Parse `MM:SS` or `H:MM:SS` clock time into seconds
pub fn parse_clock_time(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    let seconds = match parts.as_slice() {
        [m, s] => m.parse::<u64>().ok()? * 60 + s.parse::<u64>().ok()?,
        [h, m, s] => {
            h.parse::<u64>().ok()? * 3600 + m.parse::<u64>().ok()? * 60 + s.parse::<u64>().ok()?
        }
        _ => return None,
    };
    Some(seconds as f64)
}

/// True when more than half of the alphabetic characters are ASCII.
/// Used to spot English lines inside non-Latin-script transcripts.
pub fn is_mostly_ascii(text: &str) -> bool {
    let total = text.chars().filter(|c| c.is_alphabetic()).count();
    if total == 0 {
        return false;
    }
    let ascii = text
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .count();
    ascii * 2 > total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TranscriptParser {
        TranscriptParser::new(ParserConfig {
            drop_exact: vec!["はぁ".to_string()],
            min_chars: 0,
            excluded_ranges: vec![(0.0, 90.0)],
            exclude_foreign_script: true,
        })
    }

    #[test]
    fn test_parses_basic_blocks() {
        let parser = parser();
        let entries = parser.parse("02:10-02:12\nこんにちは\n\n02:13-02:14\nはい\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].start, 130.0);
        assert_eq!(entries[0].end, 132.0);
        assert_eq!(entries[0].text, "こんにちは");
        assert_eq!(entries[1].text, "はい");
    }

    #[test]
    fn test_joins_multiline_text() {
        let parser = parser();
        let entries = parser.parse("02:10-02:15\n一行目\n二行目\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "一行目 二行目");
    }

    #[test]
    fn test_strips_line_number_prefix() {
        let parser = parser();
        let entries = parser.parse("12→02:10-02:12\n13→テスト\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "テスト");
    }

    #[test]
    fn test_hours_timestamps() {
        let parser = parser();
        let entries = parser.parse("1:02:03-1:02:05\nセリフ\n");
        assert_eq!(entries[0].start, 3723.0);
        assert_eq!(entries[0].end, 3725.0);
    }

    #[test]
    fn test_filters() {
        let parser = parser();
        // Inside excluded range
        assert!(parser.parse("00:30-00:32\nオープニング\n").is_empty());
        // Drop set
        assert!(parser.parse("02:10-02:12\nはぁ\n").is_empty());
        // Mostly ASCII
        assert!(parser.parse("02:10-02:12\nNext Episode Preview\n").is_empty());
        // Empty text block
        assert!(parser.parse("02:10-02:12\n\n").is_empty());
    }

    #[test]
    fn test_min_chars_filter() {
        let mut config = ParserConfig {
            drop_exact: Vec::new(),
            min_chars: 2,
            excluded_ranges: Vec::new(),
            exclude_foreign_script: false,
        };
        let parser = TranscriptParser::new(config.clone());
        assert!(parser.parse("02:10-02:12\nY.\n").is_empty());

        config.min_chars = 0;
        let parser = TranscriptParser::new(config);
        assert_eq!(parser.parse("02:10-02:12\nY.\n").len(), 1);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let parser = parser();
        let entries = parser.parse("garbage\n02:10-02:12\nセリフ\n99:99\nその続き\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "セリフ 99:99 その続き");
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let parser = parser();
        let content = "02:10-02:12\nこんにちは\n\n02:13-02:14\nはい\n";
        assert_eq!(parser.parse(content), parser.parse(content));
    }

    #[test]
    fn test_mostly_ascii_detection() {
        assert!(is_mostly_ascii("Hello world"));
        assert!(!is_mostly_ascii("こんにちは"));
        assert!(!is_mostly_ascii("こんにちはAB"));
        assert!(!is_mostly_ascii("1234 ..."));
    }
}
