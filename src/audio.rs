use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::ClipConfig;
use crate::error::DeckError;
use crate::refine::RefinedSegment;

/// Decodes source media to mono samples via ffmpeg
///
/// Decoding is an external concern: ffmpeg writes 16-bit mono WAV into a
/// scratch directory and `hound` reads the samples back, so any input
/// container ffmpeg understands works here.
pub struct AudioDecoder;

impl AudioDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode an audio file to mono f32 samples at its native rate
    pub async fn decode_mono(&self, path: &Path) -> Result<(Vec<f32>, u32)> {
        if !path.exists() {
            return Err(
                DeckError::Configuration(format!("Audio file not found: {}", path.display()))
                    .into(),
            );
        }

        let scratch = tempfile::tempdir().context("Cannot create scratch directory")?;
        let wav_path = scratch.path().join("decoded.wav");

        info!("🎵 Decoding audio: {}", path.display());

        let status = tokio::process::Command::new("ffmpeg")
            .args([
                "-i",
                path.to_str().unwrap_or_default(),
                "-vn",
                "-acodec",
                "pcm_s16le",
                "-ac",
                "1",
                "-f",
                "wav",
                "-y",
                wav_path.to_str().unwrap_or_default(),
            ])
            .output()
            .await
            .context("Failed to run ffmpeg (is it installed?)")?;

        if !status.status.success() {
            return Err(DeckError::ExternalTool(format!(
                "ffmpeg decode failed for {}",
                path.display()
            ))
            .into());
        }

        let reader = hound::WavReader::open(&wav_path)
            .with_context(|| format!("Cannot read decoded WAV for {}", path.display()))?;
        let sample_rate = reader.spec().sample_rate;
        let samples: Vec<f32> = reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<std::result::Result<_, _>>()?;

        info!(
            "✅ Decoded {:.1}s at {}Hz",
            samples.len() as f64 / sample_rate as f64,
            sample_rate
        );
        Ok((samples, sample_rate))
    }
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Cuts one clip per refined segment with ffmpeg
pub struct ClipExtractor {
    config: ClipConfig,
}

impl ClipExtractor {
    pub fn new(config: ClipConfig) -> Self {
        Self { config }
    }

    /// Deterministic clip filename for a segment index
    pub fn clip_filename(&self, index: usize) -> String {
        format!("clip_{:03}.{}", index, self.config.extension)
    }

    /// Extract all clips with a bounded worker pool. Each segment gets
    /// its filename attached whether or not its cut succeeded; failures
    /// are logged and counted, never fatal for the batch. Returns the
    /// segments (original order) and the failure count.
    pub async fn extract_all(
        &self,
        mut segments: Vec<RefinedSegment>,
        source: &Path,
        clips_dir: &Path,
        max_workers: usize,
    ) -> Result<(Vec<RefinedSegment>, usize)> {
        tokio::fs::create_dir_all(clips_dir).await?;

        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
        let mut tasks = Vec::with_capacity(segments.len());

        for (index, segment) in segments.iter_mut().enumerate() {
            let filename = self.clip_filename(index);
            segment.audio_file = Some(filename.clone());

            let permit_pool = Arc::clone(&semaphore);
            let source = source.to_path_buf();
            let output = clips_dir.join(&filename);
            let config = self.config.clone();
            let (start, end) = (segment.start, segment.end);

            tasks.push(tokio::spawn(async move {
                let _permit = permit_pool.acquire_owned().await.expect("semaphore open");
                extract_clip(&config, &source, start, end, &output).await
            }));
        }

        let mut failed = 0;
        for (index, joined) in futures::future::join_all(tasks).await.into_iter().enumerate() {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("❌ Clip {:03} failed: {}", index, e);
                    failed += 1;
                }
                Err(e) => {
                    error!("❌ Clip {:03} task panicked: {}", index, e);
                    failed += 1;
                }
            }
        }

        info!(
            "✂️ Extracted {} clips to {} ({} failed)",
            segments.len() - failed,
            clips_dir.display(),
            failed
        );
        Ok((segments, failed))
    }
}

/// One ffmpeg invocation per clip, with a timeout so a hung encoder
/// cannot stall the whole run
async fn extract_clip(
    config: &ClipConfig,
    source: &Path,
    start: f64,
    end: f64,
    output: &Path,
) -> Result<()> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        source.to_string_lossy().into_owned(),
        "-ss".into(),
        ffmpeg_timestamp(start),
        "-to".into(),
        ffmpeg_timestamp(end),
    ];
    if config.codec == "copy" {
        args.extend(["-c".into(), "copy".into()]);
    } else {
        args.extend(["-c:a".into(), config.codec.clone()]);
        if let Some(quality) = &config.quality {
            args.extend(["-q:a".into(), quality.clone()]);
        }
    }
    args.push(output.to_string_lossy().into_owned());

    let result = tokio::time::timeout(
        Duration::from_secs(config.timeout_seconds),
        tokio::process::Command::new("ffmpeg").args(&args).output(),
    )
    .await;

    match result {
        Ok(Ok(out)) if out.status.success() => Ok(()),
        Ok(Ok(out)) => Err(anyhow!(
            "ffmpeg exited with {} for {}",
            out.status,
            output.display()
        )),
        Ok(Err(e)) => Err(anyhow!("ffmpeg failed to start: {}", e)),
        Err(_) => {
            warn!("Timed out cutting {}", output.display());
            Err(anyhow!(
                "ffmpeg timed out after {}s",
                config.timeout_seconds
            ))
        }
    }
}

/// Format seconds as an ffmpeg `HH:MM:SS.ff` timestamp
pub fn ffmpeg_timestamp(seconds: f64) -> String {
    // Work in centiseconds so rounding can't produce ":60.00"
    let total = (seconds.max(0.0) * 100.0).round() as u64;
    let h = total / 360_000;
    let m = (total % 360_000) / 6_000;
    let s = (total % 6_000) as f64 / 100.0;
    format!("{:02}:{:02}:{:05.2}", h, m, s)
}

/// Output path helper shared by the pipeline and the CLI
pub fn clips_dir(output_dir: &Path) -> PathBuf {
    output_dir.join("clips")
}
