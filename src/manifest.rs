use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::refine::RefinedSegment;

/// One segment row of the deck manifest (`segments.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Display start, `MM:SS`
    pub start: String,
    /// Display end, `MM:SS`, truncated to whole seconds
    pub end: String,
    /// Joined segment text (may contain the ` / ` separator)
    pub text: String,
    /// Clip filename relative to the clips directory
    pub audio_file: String,
}

impl ManifestEntry {
    pub fn from_refined(segment: &RefinedSegment) -> Self {
        Self {
            start: seconds_to_mmss(segment.start),
            end: seconds_to_mmss(segment.end.trunc()),
            text: segment.text.clone(),
            audio_file: segment.audio_file.clone().unwrap_or_default(),
        }
    }
}

/// One vocabulary item of an annotated segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabItem {
    pub word: String,
    pub reading: String,
    pub meaning: String,
}

/// A manifest entry with its annotation fields merged on (`data.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedEntry {
    pub start: String,
    pub end: String,
    pub text: String,
    pub audio_file: String,
    pub translation: String,
    pub vocabulary: Vec<VocabItem>,
    pub grammar: Option<String>,
}

/// Serialize and write the whole manifest. Always a full-file rewrite,
/// so an interrupted run never leaves a truncated array behind the next
/// complete write.
pub async fn write_manifest<T: Serialize>(path: &Path, entries: &[T]) -> Result<()> {
    let json = serde_json::to_string_pretty(entries)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Cannot write manifest {}", path.display()))?;
    info!("💾 Wrote {} entries to {}", entries.len(), path.display());
    Ok(())
}

/// Read a previously written manifest
pub async fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("Cannot read manifest {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&content)?)
}

/// Format seconds as `MM:SS` display time
pub fn seconds_to_mmss(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Parse `MM:SS` display time back to seconds
pub fn mmss_to_seconds(s: &str) -> Option<f64> {
    let (m, sec) = s.split_once(':')?;
    Some((m.parse::<u64>().ok()? * 60 + sec.parse::<u64>().ok()?) as f64)
}

/// Previously generated annotations, keyed by segment text
///
/// Loaded once from an existing output file and consulted before each
/// LLM call so reruns only pay for segments that are new or previously
/// failed (empty translation).
#[derive(Debug, Default)]
pub struct AnnotationCache {
    by_text: HashMap<String, AnnotatedEntry>,
}

impl AnnotationCache {
    /// Load from an existing annotated output; a missing file is an
    /// empty cache, not an error.
    pub async fn load(path: &Path) -> Self {
        let Ok(content) = tokio::fs::read_to_string(path).await else {
            return Self::default();
        };
        let Ok(entries) = serde_json::from_str::<Vec<AnnotatedEntry>>(&content) else {
            return Self::default();
        };

        let by_text: HashMap<String, AnnotatedEntry> = entries
            .into_iter()
            .filter(|e| !e.translation.is_empty())
            .map(|e| (e.text.clone(), e))
            .collect();
        info!("📦 Loaded {} cached annotations", by_text.len());
        Self { by_text }
    }

    pub fn get(&self, text: &str) -> Option<&AnnotatedEntry> {
        self.by_text.get(text)
    }

    pub fn len(&self) -> usize {
        self.by_text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_text.is_empty()
    }
}
