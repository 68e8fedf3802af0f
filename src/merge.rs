use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MergeConfig;
use crate::transcript::RawEntry;

/// Separator used when joining merged texts for display
pub const TEXT_JOIN: &str = " / ";

/// A finalized playback segment: merged time range plus joined text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Open accumulator while merging; `texts` keeps insertion order
#[derive(Debug, Clone)]
struct Accumulator {
    start: f64,
    end: f64,
    texts: Vec<String>,
}

impl Accumulator {
    fn seed(entry: &RawEntry) -> Self {
        Self {
            start: entry.start,
            end: entry.end,
            texts: vec![entry.text.clone()],
        }
    }

    fn duration(&self) -> f64 {
        self.end - self.start
    }

    fn absorb(&mut self, entry: &RawEntry) {
        self.end = entry.end;
        self.texts.push(entry.text.clone());
    }

    fn finalize(self) -> Segment {
        Segment {
            start: self.start,
            end: self.end,
            text: self.texts.join(TEXT_JOIN),
        }
    }
}

/// Greedy left-to-right merger of raw entries into playback segments
///
/// A single forward pass with one open accumulator and no backtracking.
/// Short segments absorb nearby followers, near-zero gaps always merge,
/// and optional content heuristics (questions, vocatives) widen the gap
/// tolerance. A merge never pushes a segment past
/// `max_merged_duration`.
pub struct SegmentMerger {
    config: MergeConfig,
}

impl SegmentMerger {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn merge(&self, entries: &[RawEntry]) -> Vec<Segment> {
        let Some(first) = entries.first() else {
            return Vec::new();
        };

        let mut merged = Vec::new();
        let mut current = Accumulator::seed(first);

        for entry in &entries[1..] {
            if self.should_merge(&current, entry) {
                // The merge is vetoed when it would blow the duration cap
                if entry.end - current.start <= self.config.max_merged_duration {
                    current.absorb(entry);
                } else {
                    merged.push(current.finalize());
                    current = Accumulator::seed(entry);
                }
            } else {
                if self.is_isolated_filler(&current) {
                    debug!("Dropping isolated filler: {:?}", current.texts[0]);
                    current = Accumulator::seed(entry);
                    continue;
                }
                merged.push(current.finalize());
                current = Accumulator::seed(entry);
            }
        }

        if !self.is_isolated_filler(&current) {
            merged.push(current.finalize());
        }

        info!("🧩 Merged {} entries into {} segments", entries.len(), merged.len());
        merged
    }

    fn should_merge(&self, current: &Accumulator, entry: &RawEntry) -> bool {
        let duration = current.duration();
        let gap = entry.start - current.end;

        if duration < self.config.min_segment_duration {
            if gap <= self.config.max_gap_to_merge {
                return true;
            }
            // Very short fragments tolerate a larger gap in narration
            if self.config.extend_very_short && gap <= 3.0 && duration < 1.0 {
                return true;
            }
        } else if gap <= 0.5 {
            // Near-zero gap means continuous speech
            return true;
        }

        if gap <= self.config.heuristic_gap {
            let last_text = current.texts.last().map(|t| t.trim()).unwrap_or("");
            if self
                .config
                .question_suffixes
                .iter()
                .any(|suffix| last_text.ends_with(suffix.as_str()))
            {
                return true;
            }
            if self.config.vocatives.iter().any(|v| v == last_text) {
                return true;
            }
        }

        false
    }

    /// An accumulator holding one filler interjection under a second is
    /// not worth keeping as its own clip
    fn is_isolated_filler(&self, current: &Accumulator) -> bool {
        current.texts.len() == 1
            && current.duration() < 1.0
            && self
                .config
                .drop_if_isolated
                .iter()
                .any(|d| d == current.texts[0].trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn entry(start: f64, end: f64, text: &str) -> RawEntry {
        RawEntry {
            start,
            end,
            text: text.to_string(),
        }
    }

    fn merger_with(f: impl FnOnce(&mut MergeConfig)) -> SegmentMerger {
        let mut config = Config::default().merge;
        f(&mut config);
        SegmentMerger::new(config)
    }

    #[test]
    fn test_short_segments_merge_within_gap() {
        // 2s segment with a 1s gap to the next entry merges
        let merger = merger_with(|c| {
            c.min_segment_duration = 3.0;
            c.max_gap_to_merge = 1.5;
        });
        let segments = merger.merge(&[
            entry(10.0, 12.0, "こんにちは"),
            entry(13.0, 14.0, "はい"),
        ]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 10.0);
        assert_eq!(segments[0].end, 14.0);
        assert_eq!(segments[0].text, "こんにちは / はい");
    }

    #[test]
    fn test_gap_over_cap_splits() {
        let merger = merger_with(|c| {
            c.min_segment_duration = 3.0;
            c.max_gap_to_merge = 0.5;
            c.extend_very_short = false;
        });
        let segments = merger.merge(&[
            entry(10.0, 12.0, "こんにちは"),
            entry(13.0, 14.0, "はい"),
        ]);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "こんにちは");
        assert_eq!(segments[1].text, "はい");
    }

    #[test]
    fn test_very_short_extension_rule() {
        // Under 1s tolerates a gap up to 3s when the rule is enabled
        let entries = [entry(10.0, 10.5, "えっ"), entry(13.0, 15.0, "何だって")];

        let merger = merger_with(|c| {
            c.max_gap_to_merge = 1.5;
            c.extend_very_short = true;
        });
        assert_eq!(merger.merge(&entries).len(), 1);

        let merger = merger_with(|c| {
            c.max_gap_to_merge = 1.5;
            c.extend_very_short = false;
        });
        assert_eq!(merger.merge(&entries).len(), 2);
    }

    #[test]
    fn test_near_zero_gap_merges_long_segments() {
        let merger = merger_with(|c| c.max_merged_duration = 12.0);
        let segments = merger.merge(&[
            entry(10.0, 15.0, "長いセリフ"),
            entry(15.3, 18.0, "続き"),
        ]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "長いセリフ / 続き");
    }

    #[test]
    fn test_duration_cap_vetoes_merge() {
        let merger = merger_with(|c| c.max_merged_duration = 8.0);
        let segments = merger.merge(&[
            entry(10.0, 15.0, "長いセリフ"),
            entry(15.2, 19.0, "続き"),
        ]);
        // 19.0 - 10.0 would exceed the cap
        assert_eq!(segments.len(), 2);
        for segment in &segments {
            assert!(segment.duration() <= 8.0);
        }
    }

    #[test]
    fn test_duration_cap_holds_over_many_entries() {
        let merger = merger_with(|c| c.max_merged_duration = 12.0);
        let entries: Vec<RawEntry> = (0..40)
            .map(|i| entry(i as f64 * 1.2, i as f64 * 1.2 + 1.0, "セリフ"))
            .collect();
        let segments = merger.merge(&entries);
        assert!(!segments.is_empty());
        for segment in &segments {
            assert!(segment.duration() <= 12.0);
        }
    }

    #[test]
    fn test_merge_never_reorders() {
        let merger = merger_with(|_| {});
        let entries: Vec<RawEntry> = (0..25)
            .map(|i| entry(i as f64 * 3.0, i as f64 * 3.0 + 2.0, "テキスト"))
            .collect();
        let segments = merger.merge(&entries);
        for pair in segments.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }

    #[test]
    fn test_question_heuristic() {
        let entries = [
            entry(10.0, 14.0, "どこに行くか"),
            entry(15.8, 17.0, "学校だ"),
        ];

        let merger = merger_with(|c| {
            c.question_suffixes = vec!["?".to_string(), "か".to_string()];
        });
        let segments = merger.merge(&entries);
        assert_eq!(segments.len(), 1);

        // Without the heuristic the 1.8s gap splits them
        let merger = merger_with(|_| {});
        assert_eq!(merger.merge(&entries).len(), 2);
    }

    #[test]
    fn test_vocative_heuristic() {
        let merger = merger_with(|c| {
            c.vocatives = vec!["シンジ君".to_string()];
        });
        let segments = merger.merge(&[
            entry(10.0, 13.5, "シンジ君"),
            entry(15.0, 17.0, "乗りなさい"),
        ]);
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_isolated_filler_dropped() {
        let merger = merger_with(|c| {
            c.drop_if_isolated = vec!["はい".to_string()];
            c.max_gap_to_merge = 1.5;
            c.extend_very_short = false;
        });
        // The filler is isolated (gap too large to merge either side)
        let segments = merger.merge(&[
            entry(10.0, 14.0, "これは長めのセリフです"),
            entry(20.0, 20.5, "はい"),
            entry(30.0, 34.0, "次のセリフ"),
        ]);
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.text != "はい"));
    }

    #[test]
    fn test_isolated_filler_kept_when_long() {
        let merger = merger_with(|c| {
            c.drop_if_isolated = vec!["はい".to_string()];
            c.extend_very_short = false;
        });
        // Over a second long, so it stays
        let segments = merger.merge(&[
            entry(10.0, 14.0, "これは長めのセリフです"),
            entry(20.0, 21.5, "はい"),
        ]);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn test_trailing_isolated_filler_dropped() {
        let merger = merger_with(|c| {
            c.drop_if_isolated = vec!["そう".to_string()];
            c.extend_very_short = false;
        });
        let segments = merger.merge(&[
            entry(10.0, 14.0, "これは長めのセリフです"),
            entry(20.0, 20.4, "そう"),
        ]);
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let merger = merger_with(|_| {});
        assert!(merger.merge(&[]).is_empty());
    }
}
