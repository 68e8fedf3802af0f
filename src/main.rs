use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

mod annotate;
mod audio;
mod error;
mod chapters;
mod config;
mod energy;
mod manifest;
mod merge;
mod pipeline;
mod refine;
mod transcript;

use crate::annotate::AnnotationClient;
use crate::chapters::{parse_chapter_list, ChapterSplitter};
use crate::config::Config;
use crate::manifest::AnnotationCache;
use crate::pipeline::DeckBuilder;
use crate::transcript::TranscriptParser;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("clipdeck=info,warn")),
        )
        .init();

    let matches = Command::new("clipdeck")
        .version("0.1.0")
        .about("Build spaced-repetition listening decks from transcribed audio")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .global(true),
        )
        .arg(
            Arg::new("profile")
                .short('p')
                .long("profile")
                .value_name("NAME")
                .help("Built-in tuning profile: narration, dialogue or anime")
                .global(true),
        )
        .subcommand(
            Command::new("build")
                .about("Parse, merge, refine and cut clips, then write the manifest")
                .arg(transcript_arg())
                .arg(
                    Arg::new("audio")
                        .short('a')
                        .long("audio")
                        .value_name("FILE")
                        .help("Source audio file")
                        .required(true),
                )
                .arg(output_dir_arg())
                .arg(
                    Arg::new("workers")
                        .short('w')
                        .long("workers")
                        .value_name("NUM")
                        .help("Concurrent clip extraction workers"),
                ),
        )
        .subcommand(
            Command::new("preview")
                .about("Show merged segments without touching the audio")
                .arg(transcript_arg()),
        )
        .subcommand(
            Command::new("annotate")
                .about("Annotate a built manifest with translations via an LLM")
                .arg(
                    Arg::new("manifest")
                        .short('m')
                        .long("manifest")
                        .value_name("FILE")
                        .help("segments.json produced by build")
                        .required(true),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Annotated output file (also used for resume)")
                        .default_value("data.json"),
                )
                .arg(
                    Arg::new("fresh")
                        .long("fresh")
                        .help("Ignore previous annotations instead of resuming")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("split")
                .about("Split a long recording and transcript by chapters")
                .arg(transcript_arg())
                .arg(
                    Arg::new("audio")
                        .short('a')
                        .long("audio")
                        .value_name("FILE")
                        .help("Source audio file")
                        .required(true),
                )
                .arg(
                    Arg::new("chapters")
                        .long("chapters")
                        .value_name("FILE")
                        .help("Chapter list: one 'H:MM:SS name' per line")
                        .required(true),
                )
                .arg(output_dir_arg()),
        )
        .subcommand_required(true)
        .get_matches();

    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("build", sub)) => run_build(config, sub).await,
        Some(("preview", sub)) => run_preview(config, sub).await,
        Some(("annotate", sub)) => run_annotate(config, sub).await,
        Some(("split", sub)) => run_split(config, sub).await,
        _ => unreachable!("subcommand is required"),
    }
}

fn transcript_arg() -> Arg {
    Arg::new("transcript")
        .short('t')
        .long("transcript")
        .value_name("FILE")
        .help("Timestamped transcript file")
        .required(true)
}

fn output_dir_arg() -> Arg {
    Arg::new("output-dir")
        .short('o')
        .long("output-dir")
        .value_name("DIR")
        .help("Output directory")
        .default_value("./output")
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let config = if let Some(path) = matches.get_one::<String>("config") {
        Config::load_file(Path::new(path))?
    } else if let Some(profile) = matches.get_one::<String>("profile") {
        info!("🔧 Using profile: {}", profile);
        Config::profile(profile)?
    } else {
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

async fn run_build(mut config: Config, matches: &ArgMatches) -> Result<()> {
    let transcript = PathBuf::from(matches.get_one::<String>("transcript").unwrap());
    let audio = PathBuf::from(matches.get_one::<String>("audio").unwrap());
    let output_dir = PathBuf::from(matches.get_one::<String>("output-dir").unwrap());

    if let Some(workers) = matches.get_one::<String>("workers") {
        config.performance.max_workers = workers.parse()?;
    }

    info!("🚀 Building deck from {}", transcript.display());
    let builder = DeckBuilder::new(config);
    let summary = builder.build(&transcript, &audio, &output_dir).await?;

    info!("✅ {} segments written to {}", summary.segments, output_dir.display());
    if summary.failed_clips > 0 {
        // The deck is usable, but the run must not report success
        error!("{} clips failed; rerun or inspect ffmpeg output", summary.failed_clips);
        return Err(error::DeckError::ClipFailures {
            failed: summary.failed_clips,
            total: summary.segments,
        }
        .into());
    }
    Ok(())
}

async fn run_preview(config: Config, matches: &ArgMatches) -> Result<()> {
    let transcript = PathBuf::from(matches.get_one::<String>("transcript").unwrap());
    let builder = DeckBuilder::new(config);
    let segments = builder.preview(&transcript).await?;

    let short = segments.iter().filter(|s| s.duration() < 2.0).count();
    let long = segments.iter().filter(|s| s.duration() > 12.0).count();
    info!(
        "📊 {} segments (short: {}, long: {})",
        segments.len(),
        short,
        long
    );
    Ok(())
}

async fn run_annotate(config: Config, matches: &ArgMatches) -> Result<()> {
    let manifest_path = PathBuf::from(matches.get_one::<String>("manifest").unwrap());
    let output_path = PathBuf::from(matches.get_one::<String>("output").unwrap());
    let fresh = matches.get_flag("fresh");

    let segments = manifest::read_manifest(&manifest_path).await?;
    info!("📖 Loaded {} segments", segments.len());

    let cache = if fresh {
        AnnotationCache::default()
    } else {
        AnnotationCache::load(&output_path).await
    };
    if !cache.is_empty() {
        info!("Resuming: {} segments already annotated", cache.len());
    }

    let client = AnnotationClient::new(config.llm)?;
    let results = client
        .annotate_manifest(&segments, &cache, &output_path)
        .await?;

    let missing = results.iter().filter(|r| r.translation.is_empty()).count();
    info!("✅ Annotated {} segments to {}", results.len(), output_path.display());
    if missing > 0 {
        warn!("{} segments have no translation (failed requests); rerun to retry", missing);
    }
    Ok(())
}

async fn run_split(config: Config, matches: &ArgMatches) -> Result<()> {
    let transcript = PathBuf::from(matches.get_one::<String>("transcript").unwrap());
    let audio = PathBuf::from(matches.get_one::<String>("audio").unwrap());
    let chapters_path = PathBuf::from(matches.get_one::<String>("chapters").unwrap());
    let output_dir = PathBuf::from(matches.get_one::<String>("output-dir").unwrap());

    let chapter_text = tokio::fs::read_to_string(&chapters_path).await?;
    let chapters = parse_chapter_list(&chapter_text)?;
    info!("📑 {} chapters", chapters.len());

    // Chapter splitting reads the raw entries unfiltered, so every line
    // survives into the per-chapter transcripts
    let mut parser_config = config.parser.clone();
    parser_config.drop_exact.clear();
    parser_config.excluded_ranges.clear();
    parser_config.exclude_foreign_script = false;
    parser_config.min_chars = 0;
    let parser = TranscriptParser::new(parser_config);
    let entries = parser.parse_file(&transcript).await?;

    let splitter = ChapterSplitter::new();
    splitter.split_audio(&audio, &chapters, &output_dir).await?;
    splitter
        .write_transcripts(&entries, &chapters, &output_dir)
        .await?;

    info!("✅ Chapters written to {}", output_dir.display());
    Ok(())
}
