//! # Pitch Trainer - terminal host
//!
//! Drives the headless trainer core from a terminal:
//! - **Audio thread**: microphone capture and per-frame analysis
//! - **Main thread**: ~60 Hz loop ticking the round scheduler and
//!   redrawing a one-line status display
//! - **Stdin thread**: line-based commands (pause, tempo, mode)
//!
//! Communication is crossbeam channels throughout; every piece of
//! mutable state lives on exactly one thread.

use std::io::{BufRead, Write as _};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};
use trainer_core::{
    DetectionFrame, audio, notes,
    config::{TrainerConfig, TrainingMode},
    pitch,
    scheduler::{Flash, Frame, Outcome, Phase, RoundScheduler, TickReport},
    spectrum::SpectrumAnalyzer,
};

/// Main loop cadence, roughly one display refresh.
const TICK: Duration = Duration::from_millis(16);

/// Number of low-frequency bins shown in the spectrum strip.
const SPECTRUM_BARS: usize = 24;

/// Default config file, next to the binary's working directory.
const CONFIG_PATH: &str = "trainer_config.json";

/// Commands parsed off stdin.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    /// Start the session, or toggle pause once running.
    Toggle,
    Bpm(u32),
    Mode(TrainingMode),
    Save,
    Quit,
}

/// Handle to the dedicated audio thread.
struct AudioWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
    analysis_rx: Receiver<DetectionFrame>,
}

fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = load_config(&config_path)?;

    eprintln!("[MAIN] Starting pitch trainer (mode: {:?}, {} BPM)", config.mode, config.bpm);
    println!("Commands: <enter> start/pause | bpm <40-240> | mode notes|chords | save | q");

    let command_rx = spawn_stdin_thread();
    let mut scheduler = RoundScheduler::new(config);
    let mut worker: Option<AudioWorker> = None;
    let mut latest_frame: Option<DetectionFrame> = None;

    loop {
        let tick_started = Instant::now();

        // --- Commands first, so a quit never waits on audio ---
        let mut quit = false;
        while let Ok(command) = command_rx.try_recv() {
            match command {
                Command::Toggle => {
                    if scheduler.phase() == Phase::Idle {
                        // First start, or a retry after a failed capture.
                        match start_audio_worker() {
                            Ok(started) => {
                                scheduler.start(Instant::now());
                                worker = Some(started);
                            }
                            Err(e) => {
                                eprintln!("[MAIN] Audio unavailable: {e:#}");
                                println!("Microphone unavailable - press <enter> to retry.");
                            }
                        }
                    } else {
                        scheduler.toggle_pause(Instant::now());
                    }
                }
                Command::Bpm(bpm) => scheduler.set_bpm(bpm),
                Command::Mode(mode) => scheduler.set_mode(mode),
                Command::Save => match save_config(&config_path, scheduler.config()) {
                    Ok(()) => eprintln!("[MAIN] Config saved to {config_path}"),
                    Err(e) => eprintln!("[MAIN] Error saving config: {e:#}"),
                },
                Command::Quit => quit = true,
            }
        }
        if quit {
            break;
        }

        // --- Drain analysis, keep only the newest frame ---
        if let Some(worker) = &worker {
            while let Ok(frame) = worker.analysis_rx.try_recv() {
                latest_frame = Some(frame);
            }
        }

        let frame = latest_frame.as_ref().map(|f| Frame {
            samples: &f.samples,
            sample_rate: f.sample_rate,
        });
        let report = scheduler.tick(Instant::now(), frame);
        render(&report, latest_frame.as_ref());

        if let Some(remaining) = TICK.checked_sub(tick_started.elapsed()) {
            thread::sleep(remaining);
        }
    }

    println!();
    if let Some(worker) = worker.take() {
        shutdown_audio_worker(worker);
    }
    eprintln!("[MAIN] Goodbye");
    Ok(())
}

/// Spawns the audio thread and waits for capture to come up.
///
/// The cpal stream is built on the worker thread (stream handles are not
/// sendable everywhere), so readiness comes back over a one-shot channel.
/// A capture failure is returned to the caller and the thread exits; the
/// session stays idle until the user retries.
fn start_audio_worker() -> Result<AudioWorker> {
    let (analysis_tx, analysis_rx) = crossbeam_channel::unbounded();
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

    let thread_handle = thread::spawn(move || {
        eprintln!("[AUDIO-THREAD] Starting capture...");
        let (raw_tx, raw_rx) = crossbeam_channel::unbounded::<Vec<f32>>();
        let (stream, sample_rate) = match audio::start_capture(raw_tx) {
            Ok(pair) => {
                let _ = ready_tx.send(Ok(pair.1));
                pair
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        let analyzer = SpectrumAnalyzer::new(audio::FRAME_SIZE);
        let silence_threshold = TrainerConfig::default().silence_threshold;

        loop {
            crossbeam_channel::select! {
                recv(raw_rx) -> msg => match msg {
                    Ok(samples) => {
                        // A panic in analysis must not kill the thread;
                        // the frame degrades to a silent one.
                        let frame = panic::catch_unwind(AssertUnwindSafe(|| {
                            analyze(samples.clone(), sample_rate, &analyzer, silence_threshold)
                        }))
                        .unwrap_or_else(|_| {
                            eprintln!("[AUDIO-THREAD] Analysis panicked; sending empty frame");
                            DetectionFrame {
                                samples,
                                sample_rate,
                                frequency: None,
                                note: None,
                                spectrum: Vec::new(),
                            }
                        });
                        if analysis_tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(_) => {
                        eprintln!("[AUDIO-THREAD] Capture channel closed");
                        break;
                    }
                },
                recv(shutdown_rx) -> _ => {
                    eprintln!("[AUDIO-THREAD] Shutdown requested");
                    break;
                }
            }
        }

        if let Err(e) = stream.pause() {
            eprintln!("[AUDIO-THREAD] Error pausing stream: {e}");
        }
        drop(stream);
        eprintln!("[AUDIO-THREAD] Finished");
    });

    let sample_rate = ready_rx
        .recv()
        .context("audio thread died before reporting readiness")??;
    eprintln!("[MAIN] Capture live at {sample_rate} Hz");

    Ok(AudioWorker {
        shutdown_tx,
        thread_handle: Some(thread_handle),
        analysis_rx,
    })
}

fn shutdown_audio_worker(mut worker: AudioWorker) {
    eprintln!("[MAIN] Shutting down audio worker...");
    let _ = worker.shutdown_tx.send(());
    if let Some(handle) = worker.thread_handle.take() {
        let _ = handle.join();
    }
}

/// Builds the per-frame analysis product on the audio thread.
fn analyze(
    samples: Vec<f32>,
    sample_rate: u32,
    analyzer: &SpectrumAnalyzer,
    silence_threshold: f32,
) -> DetectionFrame {
    let spectrum = analyzer.magnitudes(&samples);
    let frequency = pitch::detect_pitch(&samples, sample_rate, silence_threshold);
    let note = frequency.and_then(notes::NoteName::from_frequency);
    DetectionFrame {
        samples,
        sample_rate,
        frequency,
        note,
        spectrum,
    }
}

/// Redraws the one-line status display.
///
/// Layout: beat dots, target, round progress, sensor flash, detected
/// note, then a short strip of low-spectrum bars.
fn render(report: &TickReport, frame: Option<&DetectionFrame>) {
    let mut line = String::with_capacity(96);

    for i in 0..4u8 {
        line.push(if i == report.beat { '●' } else { '·' });
        line.push(' ');
    }

    match report.phase {
        Phase::Idle => line.push_str("| press <enter> to start"),
        Phase::Paused => line.push_str("| PAUSED"),
        _ => {
            let target = report
                .target
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "--".into());
            line.push_str(&format!("| {target:>4} "));

            let filled = (report.progress * 10.0).round() as usize;
            line.push('[');
            for i in 0..10 {
                line.push(if i < filled { '=' } else { ' ' });
            }
            line.push(']');

            line.push_str(match report.outcome {
                Outcome::Correct => " OK!  ",
                Outcome::Timeout => " Oops!",
                Outcome::Pending => match report.flash {
                    Some(Flash::Hit) => " +    ",
                    Some(Flash::Miss) => " -    ",
                    None => "      ",
                },
            });

            let detected = report
                .detected
                .map(|n| n.to_string())
                .unwrap_or_else(|| "--".into());
            line.push_str(&format!(" {detected:>2} "));

            if let Some(frame) = frame {
                line.push_str(&spectrum_strip(&frame.spectrum));
            }
        }
    }

    print!("\r{line:<70}");
    let _ = std::io::stdout().flush();
}

/// Renders the first few spectrum bins as unicode block bars.
fn spectrum_strip(spectrum: &[f32]) -> String {
    const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let bins = &spectrum[..SPECTRUM_BARS.min(spectrum.len())];
    let max = bins.iter().copied().fold(f32::MIN_POSITIVE, f32::max);
    bins.iter()
        .map(|&m| {
            let level = ((m / max) * 7.0).round() as usize;
            LEVELS[level.min(7)]
        })
        .collect()
}

/// Reads stdin line by line and forwards parsed commands.
fn spawn_stdin_thread() -> Receiver<Command> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(line.trim()) {
                Some(command) => {
                    let quit = command == Command::Quit;
                    if tx.send(command).is_err() || quit {
                        return;
                    }
                }
                None => eprintln!("[MAIN] Unrecognised command: {line:?}"),
            }
        }
        // Stdin closed: treat as quit so a piped run terminates.
        let _ = tx.send(Command::Quit);
    });
    rx
}

fn parse_command(line: &str) -> Option<Command> {
    match line {
        "" | "p" => return Some(Command::Toggle),
        "q" | "quit" => return Some(Command::Quit),
        "save" => return Some(Command::Save),
        _ => {}
    }
    let (keyword, value) = line.split_once(' ')?;
    match keyword {
        "bpm" => value.parse().ok().map(Command::Bpm),
        "mode" => match value {
            "notes" => Some(Command::Mode(TrainingMode::Notes)),
            "chords" => Some(Command::Mode(TrainingMode::Chords)),
            _ => None,
        },
        _ => None,
    }
}

/// Loads the session config, falling back to defaults when the file does
/// not exist. A file that exists but fails to parse is a hard error -
/// silently discarding someone's settings would be worse.
fn load_config(path: &str) -> Result<TrainerConfig> {
    match std::fs::read_to_string(path) {
        Ok(data) => {
            let config: TrainerConfig = serde_json::from_str(&data)
                .with_context(|| format!("malformed config file {path}"))?;
            Ok(config.sanitized())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TrainerConfig::default()),
        Err(e) => Err(e).with_context(|| format!("reading config file {path}")),
    }
}

fn save_config(path: &str, config: &TrainerConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json).with_context(|| format!("writing config file {path}"))?;
    Ok(())
}
