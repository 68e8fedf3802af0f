use tracing::info;

/// Frame length for short-time energy, in seconds (25ms)
const FRAME_SECS: f64 = 0.025;
/// Hop between frames, in seconds (10ms)
const HOP_SECS: f64 = 0.010;

/// Short-time RMS energy profile of one audio file
///
/// Computed exactly once per file, O(samples), then shared read-only by
/// every endpoint search. Normalization always divides by the single
/// loudest frame of the whole file: a quiet window in a music-heavy
/// recording must not look "loud" relative to itself, or silence would
/// become undetectable.
#[derive(Debug, Clone)]
pub struct EnergyProfile {
    rms: Vec<f32>,
    global_max: f32,
    sample_rate: u32,
    hop_len: usize,
    num_samples: usize,
}

impl EnergyProfile {
    /// Compute the profile over decoded mono samples
    pub fn compute(samples: &[f32], sample_rate: u32) -> Self {
        let frame_len = ((FRAME_SECS * sample_rate as f64).round() as usize).max(1);
        let hop_len = ((HOP_SECS * sample_rate as f64).round() as usize).max(1);

        let mut rms = Vec::with_capacity(samples.len() / hop_len + 1);
        let mut i = 0;
        while i < samples.len() {
            let frame = &samples[i..(i + frame_len).min(samples.len())];
            let mean_sq: f64 =
                frame.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / frame.len() as f64;
            rms.push(mean_sq.sqrt() as f32);
            i += hop_len;
        }

        let global_max = rms.iter().cloned().fold(0.0f32, f32::max);
        info!(
            "🔊 Energy profile: {} frames over {:.1}s, global max {:.4}",
            rms.len(),
            samples.len() as f64 / sample_rate as f64,
            global_max
        );

        Self {
            rms,
            global_max,
            sample_rate,
            hop_len,
            num_samples: samples.len(),
        }
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.rms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rms.is_empty()
    }

    /// Loudest raw RMS frame across the whole file
    pub fn global_max(&self) -> f32 {
        self.global_max
    }

    /// Total audio duration in seconds
    pub fn duration(&self) -> f64 {
        self.num_samples as f64 / self.sample_rate as f64
    }

    /// Frame energy normalized by the global max (0 when the file is
    /// all-silent)
    pub fn normalized(&self, index: usize) -> f32 {
        if self.global_max > 0.0 {
            self.rms[index] / self.global_max
        } else {
            0.0
        }
    }

    /// Frame index whose window starts at or after `time` seconds
    pub fn frame_at(&self, time: f64) -> usize {
        let sample = (time.max(0.0) * self.sample_rate as f64) as usize;
        sample.div_ceil(self.hop_len).min(self.rms.len())
    }

    /// Start time of a frame in seconds
    pub fn frame_time(&self, index: usize) -> f64 {
        (index * self.hop_len) as f64 / self.sample_rate as f64
    }

    /// A silence-run length in frames for the given duration in seconds
    pub fn frames_for(&self, seconds: f64) -> usize {
        ((seconds * self.sample_rate as f64) / self.hop_len as f64) as usize
    }
}

/// Test signal builder: loud/silent stretches as (amplitude, seconds)
#[cfg(test)]
pub(crate) fn synth(sample_rate: u32, pattern: &[(f32, f64)]) -> Vec<f32> {
    let mut samples = Vec::new();
    for &(amplitude, seconds) in pattern {
        let n = (seconds * sample_rate as f64) as usize;
        // Square-ish wave so RMS equals the amplitude
        for k in 0..n {
            let sign = if (k / 16) % 2 == 0 { 1.0 } else { -1.0 };
            samples.push(amplitude * sign);
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_shape() {
        let samples = synth(16000, &[(0.5, 1.0)]);
        let profile = EnergyProfile::compute(&samples, 16000);
        // 10ms hop over 1s of audio
        assert!(profile.len() >= 99 && profile.len() <= 101);
        assert!((profile.duration() - 1.0).abs() < 0.01);
        assert!(profile.global_max() > 0.0);
    }

    #[test]
    fn test_normalization_distinguishes_loud_and_silent() {
        let samples = synth(16000, &[(0.5, 1.0), (0.0, 1.0)]);
        let profile = EnergyProfile::compute(&samples, 16000);

        let loud = profile.frame_at(0.5);
        let silent = profile.frame_at(1.5);
        assert!(profile.normalized(loud) > 0.9);
        assert!(profile.normalized(silent) < 0.01);
    }

    #[test]
    fn test_normalization_is_scale_invariant() {
        let samples = synth(16000, &[(0.4, 0.5), (0.0, 0.5), (0.2, 0.5)]);
        let scaled: Vec<f32> = samples.iter().map(|&s| s * 3.0).collect();

        let a = EnergyProfile::compute(&samples, 16000);
        let b = EnergyProfile::compute(&scaled, 16000);

        assert_eq!(a.len(), b.len());
        for i in 0..a.len() {
            assert!((a.normalized(i) - b.normalized(i)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_all_silent_file_normalizes_to_zero() {
        let samples = synth(16000, &[(0.0, 0.5)]);
        let profile = EnergyProfile::compute(&samples, 16000);
        assert_eq!(profile.global_max(), 0.0);
        assert_eq!(profile.normalized(0), 0.0);
    }

    #[test]
    fn test_frame_time_round_trip() {
        let samples = synth(16000, &[(0.3, 2.0)]);
        let profile = EnergyProfile::compute(&samples, 16000);
        let index = profile.frame_at(1.0);
        assert!((profile.frame_time(index) - 1.0).abs() < 0.011);
    }

    #[test]
    fn test_frames_for_duration() {
        let samples = synth(16000, &[(0.3, 1.0)]);
        let profile = EnergyProfile::compute(&samples, 16000);
        // 150ms of silence spans 15 hops of 10ms
        assert_eq!(profile.frames_for(0.15), 15);
    }
}
