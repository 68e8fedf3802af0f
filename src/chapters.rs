use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::audio::ffmpeg_timestamp;
use crate::manifest::seconds_to_mmss;
use crate::transcript::{parse_clock_time, RawEntry};

/// One chapter boundary of a long recording
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    /// Start time in seconds; the chapter runs to the next entry's
    /// start or the end of the recording
    pub start: f64,
    pub name: String,
}

/// Parse a chapter listing: one `H:MM:SS name` (or `MM:SS name`) per
/// line, blank lines and `#` comments skipped
pub fn parse_chapter_list(content: &str) -> Result<Vec<Chapter>> {
    let mut chapters = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (time, name) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| anyhow!("Malformed chapter line: {}", line))?;
        let start =
            parse_clock_time(time).ok_or_else(|| anyhow!("Bad chapter time: {}", time))?;
        chapters.push(Chapter {
            start,
            name: name.trim().to_string(),
        });
    }
    if chapters.is_empty() {
        return Err(anyhow!("Chapter list is empty"));
    }
    Ok(chapters)
}

/// Splits a long source recording and its transcript by chapters, so
/// each chapter can be built into its own deck
pub struct ChapterSplitter;

impl ChapterSplitter {
    pub fn new() -> Self {
        Self
    }

    /// Cut the source audio per chapter with stream copy (no re-encode)
    pub async fn split_audio(
        &self,
        source: &Path,
        chapters: &[Chapter],
        output_dir: &Path,
    ) -> Result<()> {
        tokio::fs::create_dir_all(output_dir).await?;
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3");

        for (i, chapter) in chapters.iter().enumerate() {
            let output = output_dir.join(format!("{}.{}", chapter.name, extension));
            let mut args: Vec<String> = vec![
                "-y".into(),
                "-i".into(),
                source.to_string_lossy().into_owned(),
                "-ss".into(),
                ffmpeg_timestamp(chapter.start),
            ];
            if let Some(next) = chapters.get(i + 1) {
                args.extend(["-to".into(), ffmpeg_timestamp(next.start)]);
            }
            args.extend(["-c".into(), "copy".into()]);
            args.push(output.to_string_lossy().into_owned());

            info!("✂️ Extracting chapter: {}", chapter.name);
            let status = tokio::process::Command::new("ffmpeg")
                .args(&args)
                .output()
                .await
                .context("Failed to run ffmpeg")?;
            if !status.status.success() {
                warn!("Chapter cut failed: {}", chapter.name);
            }
        }

        info!("✅ Audio split into {} chapters", chapters.len());
        Ok(())
    }

    /// Split parsed transcript entries per chapter, rebasing timestamps
    /// to the chapter start. Output is the same block format the
    /// transcript parser reads.
    pub fn split_transcript(
        &self,
        entries: &[RawEntry],
        chapters: &[Chapter],
    ) -> Vec<(String, String)> {
        chapters
            .iter()
            .enumerate()
            .map(|(i, chapter)| {
                let chapter_end = chapters.get(i + 1).map(|c| c.start).unwrap_or(f64::MAX);
                let mut content = String::new();
                for entry in entries
                    .iter()
                    .filter(|e| e.start >= chapter.start && e.start < chapter_end)
                {
                    content.push_str(&format!(
                        "{}-{}\n{}\n\n",
                        seconds_to_mmss(entry.start - chapter.start),
                        seconds_to_mmss(entry.end - chapter.start),
                        entry.text
                    ));
                }
                (chapter.name.clone(), content)
            })
            .collect()
    }

    /// Write per-chapter transcripts next to the audio chapters
    pub async fn write_transcripts(
        &self,
        entries: &[RawEntry],
        chapters: &[Chapter],
        output_dir: &Path,
    ) -> Result<()> {
        tokio::fs::create_dir_all(output_dir).await?;
        for (name, content) in self.split_transcript(entries, chapters) {
            let path = output_dir.join(format!("{}.txt", name));
            tokio::fs::write(&path, content).await?;
        }
        info!("📜 Transcripts split into {}", output_dir.display());
        Ok(())
    }
}

impl Default for ChapterSplitter {
    fn default() -> Self {
        Self::new()
    }
}
