use anyhow::Result;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::audio::{clips_dir, AudioDecoder, ClipExtractor};
use crate::config::Config;
use crate::energy::EnergyProfile;
use crate::manifest::{self, ManifestEntry};
use crate::merge::{Segment, SegmentMerger};
use crate::refine::EndpointRefiner;
use crate::transcript::TranscriptParser;

/// Outcome of one deck build
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub segments: usize,
    pub failed_clips: usize,
    /// Segments still under 2s after refinement
    pub short: usize,
    /// Segments over 12s after refinement
    pub long: usize,
}

/// Runs the full pipeline: parse, merge, analyze, refine, cut, persist
pub struct DeckBuilder {
    config: Config,
}

impl DeckBuilder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build a deck from a transcript and its source audio. Clips land
    /// in `<output_dir>/clips/`, the manifest in
    /// `<output_dir>/segments.json`.
    pub async fn build(
        &self,
        transcript_path: &Path,
        audio_path: &Path,
        output_dir: &Path,
    ) -> Result<BuildSummary> {
        let started = Instant::now();
        tokio::fs::create_dir_all(output_dir).await?;

        let parser = TranscriptParser::new(self.config.parser.clone());
        let entries = parser.parse_file(transcript_path).await?;

        let merger = SegmentMerger::new(self.config.merge.clone());
        let segments = merger.merge(&entries);

        let decoder = AudioDecoder::new();
        let (samples, sample_rate) = decoder.decode_mono(audio_path).await?;
        let profile = EnergyProfile::compute(&samples, sample_rate);
        drop(samples);

        let refiner = EndpointRefiner::new(&profile, self.config.refine.clone());
        let refined = refiner.refine_all(&segments);

        let extractor = ClipExtractor::new(self.config.clip.clone());
        let (refined, failed_clips) = extractor
            .extract_all(
                refined,
                audio_path,
                &clips_dir(output_dir),
                self.config.performance.max_workers,
            )
            .await?;

        let rows: Vec<ManifestEntry> = refined.iter().map(ManifestEntry::from_refined).collect();
        manifest::write_manifest(&output_dir.join("segments.json"), &rows).await?;

        let summary = BuildSummary {
            segments: refined.len(),
            failed_clips,
            short: refined.iter().filter(|s| s.duration() < 2.0).count(),
            long: refined.iter().filter(|s| s.duration() > 12.0).count(),
        };

        info!(
            "🎉 Built {} segments in {:.1}s (short: {}, long: {})",
            summary.segments,
            started.elapsed().as_secs_f64(),
            summary.short,
            summary.long
        );
        if summary.failed_clips > 0 {
            warn!("{} clips failed to extract", summary.failed_clips);
        }

        Ok(summary)
    }

    /// Parse and merge only, without touching the audio; used to tune
    /// merge settings before committing to a full build
    pub async fn preview(&self, transcript_path: &Path) -> Result<Vec<Segment>> {
        let parser = TranscriptParser::new(self.config.parser.clone());
        let entries = parser.parse_file(transcript_path).await?;

        let merger = SegmentMerger::new(self.config.merge.clone());
        let segments = merger.merge(&entries);

        for (i, segment) in segments.iter().enumerate() {
            let flag = if segment.duration() < 2.0 {
                " [SHORT]"
            } else if segment.duration() > 12.0 {
                " [LONG]"
            } else {
                ""
            };
            info!(
                "[{:03}] {}-{} ({:.1}s){} {:.60}",
                i + 1,
                manifest::seconds_to_mmss(segment.start),
                manifest::seconds_to_mmss(segment.end),
                segment.duration(),
                flag,
                segment.text
            );
        }

        Ok(segments)
    }
}
