//! Offline alignment tool.
//!
//! Analyzes one or more target WAV files against a reference WAV and prints
//! the offset/polarity/correlation table the engine computes, optionally
//! writing a JSON report. `--synthetic` runs the same pipeline on generated
//! captures with known ground truth, useful as a smoke check without any
//! fixture files.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use phasor_core::{
    analyze_all, AlignmentResult, AudioCapture, CancelToken, DEFAULT_MAX_OFFSET_SAMPLES,
};

#[derive(Debug)]
struct Args {
    reference: Option<PathBuf>,
    targets: Vec<PathBuf>,
    max_offset_samples: usize,
    json: Option<PathBuf>,
    synthetic: bool,
}

#[derive(Debug, Clone, Serialize)]
struct Report {
    reference: String,
    max_offset_samples: usize,
    elapsed_ms: f64,
    results: Vec<AlignmentResult>,
}

/// Ground truth for one synthetic target.
#[derive(Debug)]
struct Expectation {
    target_id: String,
    offset_samples: i64,
    flip_polarity: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phasor_core=info".parse().unwrap()),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("align failed: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = parse_args()?;

    let (reference, targets, expectations) = if args.synthetic {
        let (reference, targets, expectations) = synthetic_captures();
        (reference, targets, Some(expectations))
    } else {
        let Some(reference_path) = args.reference.as_deref() else {
            bail!("--reference is required unless --synthetic is given (try --help)");
        };
        if args.targets.is_empty() {
            bail!("at least one --target is required unless --synthetic is given");
        }
        let reference = read_wav_capture(reference_path)?;
        let targets = args
            .targets
            .iter()
            .map(|p| read_wav_capture(p))
            .collect::<Result<Vec<_>>>()?;
        (reference, targets, None)
    };

    println!(
        "Aligning {} target(s) against '{}' ({} Hz, {} ch, {:.2} s), max offset {} samples",
        targets.len(),
        reference.id,
        reference.sample_rate,
        reference.channel_count.max(1),
        reference.duration_secs(),
        args.max_offset_samples
    );

    let started = Instant::now();
    let results = analyze_all(
        &reference,
        &targets,
        args.max_offset_samples,
        &CancelToken::new(),
    )?;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    print_table(&results);
    if let Some(expectations) = &expectations {
        print_expectations(&results, expectations);
    }
    println!("Analyzed {} target(s) in {elapsed_ms:.1} ms", results.len());

    if let Some(out) = &args.json {
        let report = Report {
            reference: reference.id.clone(),
            max_offset_samples: args.max_offset_samples,
            elapsed_ms,
            results,
        };
        let json = serde_json::to_string_pretty(&report).context("serialize report")?;
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        std::fs::write(out, json).with_context(|| format!("write {}", out.display()))?;
        println!("Wrote alignment report: {}", out.display());
    }

    Ok(())
}

fn parse_args() -> Result<Args> {
    let mut reference: Option<PathBuf> = None;
    let mut targets: Vec<PathBuf> = Vec::new();
    let mut max_offset_samples = DEFAULT_MAX_OFFSET_SAMPLES;
    let mut json: Option<PathBuf> = None;
    let mut synthetic = false;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--reference" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --reference");
                };
                reference = Some(PathBuf::from(v));
            }
            "--target" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --target");
                };
                targets.push(PathBuf::from(v));
            }
            "--max-offset" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --max-offset");
                };
                max_offset_samples = v
                    .parse::<usize>()
                    .context("invalid value for --max-offset")?;
            }
            "--json" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --json");
                };
                json = Some(PathBuf::from(v));
            }
            "--synthetic" => {
                synthetic = true;
            }
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p phasor-core --bin align -- \\
  --reference <file.wav> --target <file.wav> [--target <file.wav> ...] \\
  [--max-offset <samples>] [--json <report.json>]
       cargo run -p phasor-core --bin align -- --synthetic"
                );
                std::process::exit(0);
            }
            other => {
                bail!("unknown argument: {other}");
            }
        }
    }

    Ok(Args {
        reference,
        targets,
        max_offset_samples,
        json,
        synthetic,
    })
}

/// Reads a WAV file into a capture, keeping channels interleaved; the
/// engine does its own mono reduction.
fn read_wav_capture(path: &Path) -> Result<AudioCapture> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("open {}", path.display()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("read {}", path.display()))?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample <= 16 {
                reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .with_context(|| format!("read {}", path.display()))?
            } else {
                let max = ((1_i64 << (spec.bits_per_sample - 1)) - 1) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .with_context(|| format!("read {}", path.display()))?
            }
        }
    };

    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(AudioCapture::new(
        id,
        interleaved,
        spec.sample_rate,
        spec.channels,
    ))
}

/// Two seconds of seeded noise plus three derived targets with known
/// offsets and polarities.
fn synthetic_captures() -> (AudioCapture, Vec<AudioCapture>, Vec<Expectation>) {
    let sample_rate = 44_100u32;
    let mut rng = StdRng::seed_from_u64(2024);
    let base: Vec<f32> = (0..2 * sample_rate as usize)
        .map(|_| rng.gen_range(-0.8f32..0.8))
        .collect();

    let delayed = |delay: usize| -> Vec<f32> {
        let mut out = vec![0.0f32; delay];
        out.extend_from_slice(&base);
        out
    };

    let mut noisy = delayed(37);
    for s in &mut noisy {
        *s = (*s + rng.gen_range(-0.05f32..0.05)).clamp(-1.0, 1.0);
    }
    let leading_inverted: Vec<f32> = base[98..].iter().map(|s| -s).collect();

    let reference = AudioCapture::new("synthetic-reference", base.clone(), sample_rate, 1);
    let targets = vec![
        AudioCapture::new("delayed-210", delayed(210), sample_rate, 1),
        AudioCapture::new("leading-98-inverted", leading_inverted, sample_rate, 1),
        AudioCapture::new("noisy-delayed-37", noisy, sample_rate, 1),
    ];
    let expectations = vec![
        Expectation {
            target_id: "delayed-210".into(),
            offset_samples: -210,
            flip_polarity: false,
        },
        Expectation {
            target_id: "leading-98-inverted".into(),
            offset_samples: 98,
            flip_polarity: true,
        },
        Expectation {
            target_id: "noisy-delayed-37".into(),
            offset_samples: -37,
            flip_polarity: false,
        },
    ];
    (reference, targets, expectations)
}

fn print_table(results: &[AlignmentResult]) {
    println!(
        "{:<24} {:>10} {:>10} {:>9} {:>6}  {}",
        "target", "offset", "offset ms", "corr", "flip", "status"
    );
    for r in results {
        if !r.success {
            println!(
                "{:<24} {:>10} {:>10} {:>9} {:>6}  analysis failed",
                r.target_id, "-", "-", "-", "-"
            );
            continue;
        }
        println!(
            "{:<24} {:>10} {:>10.3} {:>9.4} {:>6}  {}",
            r.target_id,
            r.offset_samples,
            r.offset_ms,
            r.correlation,
            if r.flip_polarity { "yes" } else { "no" },
            r.status()
        );
    }
}

fn print_expectations(results: &[AlignmentResult], expectations: &[Expectation]) {
    for expected in expectations {
        let Some(result) = results.iter().find(|r| r.target_id == expected.target_id) else {
            println!("{}: MISSING from results", expected.target_id);
            continue;
        };
        let matches = result.offset_samples == expected.offset_samples
            && result.flip_polarity == expected.flip_polarity;
        println!(
            "{}: expected offset {} flip {} -> {}",
            expected.target_id,
            expected.offset_samples,
            expected.flip_polarity,
            if matches { "ok" } else { "MISMATCH" }
        );
    }
}
