use clipdeck::config::Config;
use clipdeck::energy::EnergyProfile;
use clipdeck::manifest::{self, ManifestEntry};
use clipdeck::merge::SegmentMerger;
use clipdeck::refine::EndpointRefiner;
use clipdeck::transcript::TranscriptParser;

/// Loud/silent stretches as (amplitude, seconds), square-ish wave so
/// the RMS of a stretch equals its amplitude
fn synth(sample_rate: u32, pattern: &[(f32, f64)]) -> Vec<f32> {
    let mut samples = Vec::new();
    for &(amplitude, seconds) in pattern {
        let n = (seconds * sample_rate as f64) as usize;
        for k in 0..n {
            let sign = if (k / 16) % 2 == 0 { 1.0 } else { -1.0 };
            samples.push(amplitude * sign);
        }
    }
    samples
}

const TRANSCRIPT: &str = "\
00:01-00:03
おはようございます

00:04-00:05
はい

00:08-00:11
今日はいい天気ですね

00:14-00:16
そうですね
";

#[test]
fn test_core_pipeline_end_to_end() {
    let config = Config::dialogue();

    let parser = TranscriptParser::new(config.parser.clone());
    let entries = parser.parse(TRANSCRIPT);
    assert_eq!(entries.len(), 4);

    let merger = SegmentMerger::new(config.merge.clone());
    let segments = merger.merge(&entries);
    // First two merge (2s duration, 1s gap), the rest stand alone
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].text, "おはようございます / はい");

    // Speech bursts roughly matching the transcript, silence between
    let samples = synth(
        16000,
        &[
            (0.0, 1.0),
            (0.5, 4.2),
            (0.0, 2.6),
            (0.5, 3.4),
            (0.0, 1.8),
            (0.5, 2.2),
            (0.0, 2.0),
        ],
    );
    let profile = EnergyProfile::compute(&samples, 16000);
    let refiner = EndpointRefiner::new(&profile, config.refine.clone());
    let refined = refiner.refine_all(&segments);

    assert_eq!(refined.len(), segments.len());
    for (nominal, refined) in segments.iter().zip(&refined) {
        // End always extends by at least the configured minimum
        assert!(refined.end >= nominal.end + config.refine.min_extension - 1e-9);
    }
    // Refinement never crosses a successor's nominal start
    for i in 0..refined.len() - 1 {
        assert!(refined[i].end <= segments[i + 1].start);
    }
    // Original order survives refinement
    for pair in refined.windows(2) {
        assert!(pair[0].start <= pair[1].start);
    }
}

#[test]
fn test_merge_duration_cap_across_profiles() {
    for config in [Config::narration(), Config::dialogue(), Config::anime()] {
        let parser = TranscriptParser::new({
            let mut p = config.parser.clone();
            p.exclude_foreign_script = false;
            p.min_chars = 0;
            p.excluded_ranges.clear();
            p
        });
        // Dense entries that would merge forever without the cap
        let mut transcript = String::new();
        for i in 0..60 {
            let start = i * 2;
            transcript.push_str(&format!(
                "{:02}:{:02}-{:02}:{:02}\nセリフその{}\n\n",
                start / 60,
                start % 60,
                (start + 1) / 60,
                (start + 1) % 60,
                i
            ));
        }
        let entries = parser.parse(&transcript);
        assert_eq!(entries.len(), 60);

        let merger = SegmentMerger::new(config.merge.clone());
        for segment in merger.merge(&entries) {
            assert!(segment.duration() <= config.merge.max_merged_duration);
        }
    }
}

#[tokio::test]
async fn test_manifest_survives_rewrite_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("segments.json");

    let entries = vec![
        ManifestEntry {
            start: "00:10".to_string(),
            end: "00:14".to_string(),
            text: "こんにちは / はい".to_string(),
            audio_file: "clip_000.mp3".to_string(),
        },
        ManifestEntry {
            start: "00:20".to_string(),
            end: "00:25".to_string(),
            text: "さようなら".to_string(),
            audio_file: "clip_001.mp3".to_string(),
        },
    ];

    // Whole-file rewrites: repeating the write never corrupts the set
    manifest::write_manifest(&path, &entries).await.unwrap();
    manifest::write_manifest(&path, &entries).await.unwrap();

    let read_back = manifest::read_manifest(&path).await.unwrap();
    assert_eq!(read_back, entries);
}
