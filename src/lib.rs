//! Clipdeck - spaced-repetition deck builder
//!
//! Turns timestamped transcripts of foreign-language audio into
//! per-segment audio clips plus a JSON manifest, with segment boundaries
//! refined against the actual waveform so clips don't cut off speech.

pub mod annotate;
pub mod audio;
pub mod error;
pub mod chapters;
pub mod config;
pub mod energy;
pub mod manifest;
pub mod merge;
pub mod pipeline;
pub mod refine;
pub mod transcript;

// Re-export main types for easy access
pub use crate::annotate::{AnnotationClient, Breakdown};
pub use crate::error::DeckError;
pub use crate::audio::{AudioDecoder, ClipExtractor};
pub use crate::chapters::{Chapter, ChapterSplitter};
pub use crate::config::{Config, MergeConfig, ParserConfig, RefineConfig};
pub use crate::energy::EnergyProfile;
pub use crate::manifest::{AnnotatedEntry, AnnotationCache, ManifestEntry};
pub use crate::merge::{Segment, SegmentMerger};
pub use crate::pipeline::{BuildSummary, DeckBuilder};
pub use crate::refine::{EndpointRefiner, RefinedSegment};
pub use crate::transcript::{RawEntry, TranscriptParser};
