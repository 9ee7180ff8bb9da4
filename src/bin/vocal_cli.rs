use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use vocal_rhythm::analysis::{note_name, PitchEstimator, PitchSample};
use vocal_rhythm::audio::{CaptureConfig, FrameStatus, SampleSource, ToneSegment, ToneSource, WavSource};
use vocal_rhythm::config::AppConfig;
use vocal_rhythm::engine::{EngineHandle, EngineOptions};
use vocal_rhythm::game::{ChartGenerator, ChartParams, GameEvent, GameSession, Note, SessionStatus};

#[derive(Parser, Debug)]
#[command(
    name = "vocal_cli",
    about = "Chart, pitch-tracking and simulation harness for the vocal rhythm core"
)]
struct Cli {
    /// Configuration file (defaults to assets/game_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log verbosity on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the chart for a difficulty as JSON
    Chart {
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        difficulty: i32,
        /// Override game.chart_seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the nearest note name for a frequency
    NoteName { frequency: f32 },
    /// Pitch-track a WAV file, one JSON line per frame
    Track {
        #[arg(long)]
        wav: PathBuf,
        /// Also print frames without a confident pitch
        #[arg(long)]
        all: bool,
    },
    /// Play a chart offline against a synthetic singer and print the summary
    Simulate {
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        difficulty: i32,
        #[arg(long)]
        seed: Option<u64>,
        /// Offset added to every sung pitch
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        detune_hz: f32,
        /// Print every game event as a JSON line
        #[arg(long)]
        events: bool,
    },
    /// Play live with the default microphone, streaming events as JSON lines
    Play {
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        difficulty: i32,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 120)]
        max_seconds: u64,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Chart { difficulty, seed } => run_chart(&config, difficulty, seed),
        Commands::NoteName { frequency } => run_note_name(frequency),
        Commands::Track { wav, all } => run_track(&config, wav, all),
        Commands::Simulate {
            difficulty,
            seed,
            detune_hz,
            events,
        } => run_simulate(config, difficulty, seed, detune_hz, events),
        Commands::Play {
            difficulty,
            max_seconds,
        } => run_play(config, difficulty, max_seconds),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Serialize)]
struct ChartReport<'a> {
    params: ChartParams,
    seed: u64,
    notes: &'a [Note],
}

fn run_chart(config: &AppConfig, difficulty: i32, seed: Option<u64>) -> Result<ExitCode> {
    let seed = seed.unwrap_or(config.game.chart_seed);
    let notes = ChartGenerator::new(config.game.lane_count, seed).generate(difficulty);
    let report = ChartReport {
        params: ChartParams::for_difficulty(difficulty),
        seed,
        notes: &notes,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_note_name(frequency: f32) -> Result<ExitCode> {
    match note_name(frequency) {
        Some(name) => {
            println!("{}", name);
            Ok(ExitCode::from(0))
        }
        None => {
            eprintln!("{} Hz has no note name", frequency);
            Ok(ExitCode::from(2))
        }
    }
}

#[derive(Serialize)]
struct TrackLine {
    frame: u64,
    time_ms: u64,
    frequency: Option<f32>,
    confidence: Option<f32>,
    note: Option<String>,
}

fn run_track(config: &AppConfig, path: PathBuf, all: bool) -> Result<ExitCode> {
    let mut source = WavSource::from_path(&path)
        .with_context(|| format!("reading WAV file {}", path.display()))?;
    let capture = CaptureConfig {
        sample_rate: source.sample_rate(),
        ..CaptureConfig::from(&config.audio)
    };
    let mut estimator = PitchEstimator::new(
        capture.sample_rate,
        capture.buffer_size,
        config.pitch.clone(),
    )
    .context("configuring pitch estimator")?;
    source.open(&capture)?;

    let mut frame = vec![0.0; capture.buffer_size];
    let mut index = 0u64;
    while source.next_frame(&mut frame)? == FrameStatus::Filled {
        let time_ms = index * capture.hop_size as u64 * 1000 / capture.sample_rate as u64;
        let estimate = estimator.estimate(&frame, capture.sample_rate)?;
        if all || estimate.is_some() {
            let line = TrackLine {
                frame: index,
                time_ms,
                frequency: estimate.map(|e| e.frequency),
                confidence: estimate.map(|e| e.confidence),
                note: estimate
                    .and_then(|e| note_name(e.frequency))
                    .map(|n| n.to_string()),
            };
            println!("{}", serde_json::to_string(&line)?);
        }
        index += 1;
    }
    source.close()?;
    Ok(ExitCode::from(0))
}

/// Deterministic offline run: the session clock is the stream position of each frame
fn run_simulate(
    mut config: AppConfig,
    difficulty: i32,
    seed: Option<u64>,
    detune_hz: f32,
    print_events: bool,
) -> Result<ExitCode> {
    if let Some(seed) = seed {
        config.game.chart_seed = seed;
    }
    let capture = CaptureConfig::from(&config.audio);
    let mut session = GameSession::new(&config.game);
    session.set_difficulty(difficulty);
    session.start_game();

    let segments: Vec<ToneSegment> = session
        .notes()
        .iter()
        .map(|note| ToneSegment {
            start_ms: note.target_time_ms,
            end_ms: note.target_time_ms + note.duration_ms,
            frequency: note.frequency + detune_hz,
        })
        .collect();
    let mut singer = ToneSource::melody(segments, capture.sample_rate);
    let mut estimator = PitchEstimator::new(
        capture.sample_rate,
        capture.buffer_size,
        config.pitch.clone(),
    )?;
    singer.open(&capture)?;

    let mut frame = vec![0.0; capture.buffer_size];
    let mut index = 0u64;
    let mut clock_ms = 0u64;
    while session.status() == SessionStatus::Playing
        && singer.next_frame(&mut frame)? == FrameStatus::Filled
    {
        clock_ms = index * capture.hop_size as u64 * 1000 / capture.sample_rate as u64;
        session.update_time(clock_ms);
        let sample = estimator
            .estimate(&frame, capture.sample_rate)?
            .map(|estimate| PitchSample::from_estimate(estimate, clock_ms));
        session.update_pitch(sample);
        emit_events(&mut session, print_events)?;
        index += 1;
    }
    singer.close()?;

    // Let the clock run out so unsung notes are missed
    if session.status() == SessionStatus::Playing {
        let end = session
            .notes()
            .iter()
            .map(|n| n.target_time_ms + n.duration_ms)
            .max()
            .unwrap_or(clock_ms);
        session.update_time(end + config.game.timing.grace_ms + 1);
        emit_events(&mut session, print_events)?;
    }

    println!("{}", serde_json::to_string_pretty(&session.summary())?);
    Ok(ExitCode::from(0))
}

fn emit_events(session: &mut GameSession, print: bool) -> Result<()> {
    for event in session.drain_events() {
        if print {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    Ok(())
}

fn run_play(config: AppConfig, difficulty: i32, max_seconds: u64) -> Result<ExitCode> {
    let engine = EngineHandle::spawn(config, EngineOptions::default());
    let mut events = engine.subscribe_events()?;

    engine.set_difficulty(difficulty)?;
    engine.start_game()?;
    engine
        .start_microphone()
        .context("opening the default microphone")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("creating runtime")?;

    runtime.block_on(async {
        let deadline = tokio::time::sleep(Duration::from_secs(max_seconds));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        println!("{}", serde_json::to_string(&event)?);
                        if matches!(event, GameEvent::SessionEnded { .. }) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("[vocal_cli] Skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = &mut deadline => {
                    log::info!("[vocal_cli] Time limit reached");
                    break;
                }
            }
        }
        Ok::<(), anyhow::Error>(())
    })?;

    if let Err(err) = engine.stop_recording() {
        log::warn!("[vocal_cli] {}", err);
    }
    let summary = engine.snapshot().summary();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    engine.shutdown()?;
    Ok(ExitCode::from(0))
}
