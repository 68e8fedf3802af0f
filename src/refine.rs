use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RefineConfig;
use crate::energy::EnergyProfile;
use crate::merge::Segment;

/// A segment with waveform-refined boundaries, ready for clip cutting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    /// Attached by the clip extractor; relative filename
    pub audio_file: Option<String>,
}

impl RefinedSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Refines nominal transcript boundaries against the energy profile
///
/// Each segment is handled independently: the inputs are the shared
/// read-only profile, the segment's own nominal bounds, and the
/// neighbors' NOMINAL bounds. The reference behavior deliberately reads
/// nominal rather than already-refined neighbor boundaries, which also
/// makes per-segment refinement order-independent.
pub struct EndpointRefiner<'a> {
    profile: &'a EnergyProfile,
    config: RefineConfig,
}

impl<'a> EndpointRefiner<'a> {
    pub fn new(profile: &'a EnergyProfile, config: RefineConfig) -> Self {
        Self { profile, config }
    }

    /// Refine every segment, preserving order
    pub fn refine_all(&self, segments: &[Segment]) -> Vec<RefinedSegment> {
        let refined: Vec<RefinedSegment> = segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                let prev_end = i.checked_sub(1).map(|p| segments[p].end);
                let next_start = segments.get(i + 1).map(|s| s.start);

                let start = if self.config.refine_starts {
                    self.refine_start(segment.start, prev_end)
                } else {
                    segment.start
                };
                let end = self.refine_end(segment.end, next_start);

                RefinedSegment {
                    start,
                    end,
                    text: segment.text.clone(),
                    audio_file: None,
                }
            })
            .collect();

        info!("🎯 Refined {} segment boundaries", refined.len());
        refined
    }

    /// Forward search: first qualifying silence run after the nominal
    /// end, never earlier than the guaranteed minimum extension.
    pub fn refine_end(&self, nominal_end: f64, next_start: Option<f64>) -> f64 {
        let c = &self.config;
        let search_start = nominal_end + c.min_extension;
        let mut search_end = search_start + c.search_window;

        // Never search into the next segment or past the audio
        if let Some(next) = next_start {
            search_end = search_end.min(next - c.safety_margin);
        }
        search_end = search_end.min(self.profile.duration());

        let fallback = match next_start {
            Some(next) => next - c.safety_margin,
            None => nominal_end + c.fallback_buffer,
        };

        // A zero global max means there is no signal to measure against
        if self.profile.global_max() == 0.0 {
            return fallback;
        }

        if search_start >= search_end {
            return fallback;
        }

        let first = self.profile.frame_at(search_start);
        let last = self.profile.frame_at(search_end);
        let run = self.profile.frames_for(c.min_silence_duration).max(1);
        if last.saturating_sub(first) < run {
            return fallback;
        }

        for i in first..=(last - run) {
            if self.is_silence_run(i, run) {
                let mut end =
                    (self.profile.frame_time(i) + c.end_buffer).max(nominal_end + c.min_extension);
                // end_buffer may reach past the clipped window, so the
                // successor clearance binds the found end too
                if let Some(next) = next_start {
                    end = end.min(next - c.safety_margin);
                }
                debug!("Silence onset at {:.2}s for end {:.2}s", end, nominal_end);
                return end;
            }
        }

        fallback
    }

    /// Backward search: the last silence-to-speech transition before
    /// the nominal start, floored at the previous segment's end.
    pub fn refine_start(&self, nominal_start: f64, prev_end: Option<f64>) -> f64 {
        let c = &self.config;
        let earliest = prev_end.map(|p| p + c.safety_margin).unwrap_or(0.0);
        let search_start = earliest.max(nominal_start - c.start_search_window);

        if search_start >= nominal_start {
            return nominal_start;
        }

        let first = self.profile.frame_at(search_start);
        let last = self.profile.frame_at(nominal_start);
        let run = self.profile.frames_for(c.min_silence_duration).max(1);
        if last.saturating_sub(first) < run {
            return nominal_start;
        }

        // Walk backward looking for speech preceded by a full silence run
        for i in ((first + run)..last).rev() {
            let speech = self.profile.normalized(i) >= c.silence_threshold;
            if speech && self.is_silence_run(i - run, run) {
                let start = self.profile.frame_time(i) - c.start_buffer;
                debug!(
                    "Speech onset at {:.2}s for start {:.2}s",
                    start, nominal_start
                );
                return start.max(earliest);
            }
        }

        (nominal_start - 0.15).max(earliest)
    }

    fn is_silence_run(&self, from: usize, run: usize) -> bool {
        (from..from + run).all(|i| self.profile.normalized(i) < self.config.silence_threshold)
    }
}
