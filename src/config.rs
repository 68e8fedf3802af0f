use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the deck builder
///
/// Every tuning constant lives here; components receive their section by
/// value and hold no process-wide state. Different content sources
/// (narration, dialogue, anime with constant background music) ship as
/// named profiles with different constants over the same algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transcript parsing and filtering
    pub parser: ParserConfig,

    /// Segment merging rules
    pub merge: MergeConfig,

    /// Audio-based endpoint refinement
    pub refine: RefineConfig,

    /// Clip extraction settings
    pub clip: ClipConfig,

    /// LLM annotation settings
    pub llm: LlmConfig,

    /// Performance and resource settings
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Exact texts to drop entirely (filler phrases, sound effects)
    pub drop_exact: Vec<String>,

    /// Drop entries whose text is at most this many characters
    pub min_chars: usize,

    /// Time ranges (start, end) in seconds to skip, e.g. theme songs
    pub excluded_ranges: Vec<(f64, f64)>,

    /// Drop entries whose alphabetic characters are mostly ASCII.
    /// Catches English contamination in non-Latin-script transcripts;
    /// must be disabled for Latin-script target languages.
    pub exclude_foreign_script: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Segments shorter than this eagerly absorb the next entry
    pub min_segment_duration: f64,

    /// Maximum gap for the eager merge of short segments
    pub max_gap_to_merge: f64,

    /// Hard cap on a merged segment's duration
    pub max_merged_duration: f64,

    /// Allow very short segments (<1s) to merge across gaps up to 3s
    pub extend_very_short: bool,

    /// Gap tolerance for the question/vocative heuristics below
    pub heuristic_gap: f64,

    /// Merge when the last text ends with one of these (questions
    /// usually get an answer right after)
    pub question_suffixes: Vec<String>,

    /// Merge when the last text is exactly one of these short address
    /// terms (names, titles) that precede a continuing reply
    pub vocatives: Vec<String>,

    /// Single-entry segments with exactly this text and duration under
    /// 1s are discarded rather than finalized
    pub drop_if_isolated: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Always extend the end by at least this much before searching
    pub min_extension: f64,

    /// How far past the minimum extension to search for silence
    pub search_window: f64,

    /// Normalized RMS below this counts as silence (0-1 scale)
    pub silence_threshold: f32,

    /// Minimum length of a qualifying silence run, in seconds
    pub min_silence_duration: f64,

    /// End extension when no silence run is found
    pub fallback_buffer: f64,

    /// Added after a detected silence onset
    pub end_buffer: f64,

    /// Also refine segment starts against the waveform
    pub refine_starts: bool,

    /// Subtracted before a detected speech onset
    pub start_buffer: f64,

    /// How far before the nominal start to search for the speech onset
    pub start_search_window: f64,

    /// Clearance kept from a neighbor segment's nominal boundary
    pub safety_margin: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipConfig {
    /// ffmpeg audio codec, or "copy" for stream copy
    pub codec: String,

    /// ffmpeg `-q:a` quality (ignored for stream copy)
    pub quality: Option<String>,

    /// Output clip file extension
    pub extension: String,

    /// Per-invocation timeout so a hung encoder can't stall the batch
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat-completions endpoint
    pub endpoint: String,

    /// API key (if the endpoint requires one)
    pub api_key: Option<String>,

    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Delay between requests to avoid rate limiting (milliseconds)
    pub request_delay_ms: u64,

    /// Write a checkpoint of the output after this many segments
    pub checkpoint_interval: usize,

    /// Short description of the content, interpolated into the prompt
    pub content_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum number of concurrent clip extraction workers
    pub max_workers: usize,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load_file(path: &std::path::Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read config file {}: {}", path.display(), e))?;
        let config: Config = toml::from_str(&config_str)?;
        config.validate()?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Look up a built-in tuning profile by name
    pub fn profile(name: &str) -> Result<Self> {
        match name {
            "narration" => Ok(Self::narration()),
            "dialogue" => Ok(Self::dialogue()),
            "anime" => Ok(Self::anime()),
            other => Err(anyhow!(
                "Unknown profile '{}' (expected narration, dialogue or anime)",
                other
            )),
        }
    }

    /// Audiobook-style narration: single speaker, clean pauses,
    /// Latin-script target language.
    pub fn narration() -> Self {
        let mut config = Self::default();
        config.parser.exclude_foreign_script = false;
        config.parser.min_chars = 2;
        // Transcription artifacts that show up as standalone fragments
        config.parser.drop_exact = [
            "Y.",
            "Eso.",
            "Por.",
            "Comillas.",
            "Dijo.",
            "El juego.",
            "Tío.",
            "Agatín.",
            "Side.",
            "Lado.",
            "Mediante.",
            "Dijo el.",
            "Ganso.",
            "Él.",
            "A él.",
            "Dándole.",
            "Cabriole.",
        ]
        .map(String::from)
        .to_vec();
        config.merge.max_merged_duration = 15.0;
        config.refine = RefineConfig {
            min_extension: 0.3,
            search_window: 2.0,
            silence_threshold: 0.12,
            min_silence_duration: 0.12,
            fallback_buffer: 0.5,
            end_buffer: 0.03,
            refine_starts: false,
            start_buffer: 0.10,
            start_search_window: 1.0,
            safety_margin: 0.05,
        };
        config
    }

    /// Game or drama dialogue: multiple speakers, short lines, little
    /// background music.
    pub fn dialogue() -> Self {
        let mut config = Self::default();
        config.parser.drop_exact = ["目標に前段命中!", "せーの!", "はぁ", "じゃ", "父さん", "頼む"]
            .map(String::from)
            .to_vec();
        config.merge.extend_very_short = true;
        config.merge.question_suffixes = ["?", "か"].map(String::from).to_vec();
        config.merge.vocatives = ["イカリシンジ君", "シンジ君", "レイ", "冬月", "副司令"]
            .map(String::from)
            .to_vec();
        config.merge.drop_if_isolated = ["はい", "そう", "そうね"].map(String::from).to_vec();
        config.refine = RefineConfig {
            min_extension: 0.5,
            search_window: 2.5,
            silence_threshold: 0.15,
            min_silence_duration: 0.15,
            fallback_buffer: 0.8,
            end_buffer: 0.03,
            refine_starts: false,
            start_buffer: 0.10,
            start_search_window: 1.0,
            safety_margin: 0.05,
        };
        config
    }

    /// Anime: near-constant background music, so thresholds and buffers
    /// are more generous and starts are refined too.
    pub fn anime() -> Self {
        let mut config = Self::default();
        config.parser.drop_exact = ["うん", "ああ", "はぁ", "えっ"].map(String::from).to_vec();
        // Opening theme runs to 1:30 in every episode
        config.parser.excluded_ranges = vec![(0.0, 90.0)];
        config.merge.extend_very_short = false;
        config.refine = RefineConfig {
            min_extension: 0.7,
            search_window: 2.0,
            silence_threshold: 0.15,
            min_silence_duration: 0.15,
            fallback_buffer: 0.9,
            end_buffer: 0.35,
            refine_starts: true,
            start_buffer: 0.10,
            start_search_window: 1.0,
            safety_margin: 0.05,
        };
        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.performance.max_workers == 0 {
            return Err(anyhow!("max_workers must be greater than 0"));
        }

        if self.merge.max_merged_duration <= 0.0 {
            return Err(anyhow!("max_merged_duration must be positive"));
        }

        if self.merge.min_segment_duration > self.merge.max_merged_duration {
            return Err(anyhow!(
                "min_segment_duration cannot exceed max_merged_duration"
            ));
        }

        if !(0.0..=1.0).contains(&self.refine.silence_threshold) {
            return Err(anyhow!("silence_threshold must be within 0.0..=1.0"));
        }

        if self.refine.min_silence_duration <= 0.0 {
            return Err(anyhow!("min_silence_duration must be positive"));
        }

        for (start, end) in &self.parser.excluded_ranges {
            if end < start {
                return Err(anyhow!("excluded range {}..{} is inverted", start, end));
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parser: ParserConfig {
                drop_exact: Vec::new(),
                min_chars: 0,
                excluded_ranges: Vec::new(),
                exclude_foreign_script: true,
            },
            merge: MergeConfig {
                min_segment_duration: 3.0,
                max_gap_to_merge: 1.5,
                max_merged_duration: 12.0,
                extend_very_short: true,
                heuristic_gap: 2.0,
                question_suffixes: Vec::new(),
                vocatives: Vec::new(),
                drop_if_isolated: Vec::new(),
            },
            refine: RefineConfig {
                min_extension: 0.5,
                search_window: 2.5,
                silence_threshold: 0.15,
                min_silence_duration: 0.15,
                fallback_buffer: 0.8,
                end_buffer: 0.03,
                refine_starts: false,
                start_buffer: 0.10,
                start_search_window: 1.0,
                safety_margin: 0.05,
            },
            clip: ClipConfig {
                codec: "libmp3lame".to_string(),
                quality: Some("2".to_string()),
                extension: "mp3".to_string(),
                timeout_seconds: 60,
            },
            llm: LlmConfig {
                endpoint: "http://localhost:1234/v1/chat/completions".to_string(),
                api_key: None,
                model: "local-model".to_string(),
                max_tokens: 1024,
                temperature: 0.2,
                timeout_seconds: 120,
                request_delay_ms: 300,
                checkpoint_interval: 10,
                content_hint: None,
            },
            performance: PerformanceConfig {
                max_workers: num_cpus::get().min(4),
            },
        }
    }
}
