//! # Round Scheduler Module
//!
//! The training state machine: picks targets, runs the metronome, feeds
//! audio frames through pitch detection and decides round outcomes. All
//! state lives in [`RoundScheduler`]; the host owns one instance and
//! drives it from a single loop via [`RoundScheduler::tick`], so there is
//! no shared mutable state to coordinate.
//!
//! Policy decisions where the source material disagreed with itself:
//! beat 0 is the downbeat, and a round is won after `required_hits`
//! matching detections rather than on the first match.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::chords::{CHORDS, Chord};
use crate::config::{MAX_BPM, MIN_BPM, TrainerConfig, TrainingMode};
use crate::notes::{NATURALS, NoteName};
use crate::pitch::{self, NoteSmoother};

/// Beats per bar; the counter wraps modulo this.
pub const BEATS_PER_BAR: u8 = 4;

/// What the player is being asked to produce this round.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Note(NoteName),
    Chord(&'static Chord),
}

impl Target {
    /// Whether a detected pitch class satisfies this target. Chords
    /// accept any of their tones; octaves never matter.
    pub fn matches(&self, note: NoteName) -> bool {
        match self {
            Target::Note(target) => *target == note,
            Target::Chord(chord) => chord.contains(note),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Note(note) => write!(f, "{note}"),
            Target::Chord(chord) => f.write_str(chord.name),
        }
    }
}

/// Round outcome. Only ever moves `Pending -> Correct` or
/// `Pending -> Timeout` within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Correct,
    Timeout,
}

/// Scheduler lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the user to start (also the capture-failed state).
    Idle,
    /// A round is running: timer live, detections evaluated.
    Active,
    /// A result is on display before the next round starts.
    Showing,
    /// Frozen; beat phase and round clock preserved for resume.
    Paused,
}

/// Per-tick sensor feedback for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    Hit,
    Miss,
}

/// The newest audio frame, borrowed for the duration of one tick.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub samples: &'a [f32],
    pub sample_rate: u32,
}

/// Everything the host needs to render after one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub phase: Phase,
    pub target: Option<Target>,
    pub outcome: Outcome,
    /// Current beat, 0..4; 0 is the downbeat.
    pub beat: u8,
    /// True when at least one beat edge fired during this tick.
    pub beat_advanced: bool,
    /// True when the beat counter wrapped to 0 during this tick.
    pub downbeat: bool,
    /// Round progress in [0, 1]; 1.0 once the round is decided.
    pub progress: f32,
    pub flash: Option<Flash>,
    pub detected: Option<NoteName>,
}

/// The round/metronome state machine.
pub struct RoundScheduler {
    config: TrainerConfig,
    rng: SmallRng,
    smoother: Option<NoteSmoother>,

    phase: Phase,
    target: Option<Target>,
    outcome: Outcome,
    hits: u32,

    beat: u8,
    last_beat_at: Instant,
    round_started_at: Instant,
    result_until: Instant,
    /// Set while a finished result waits for its (possibly downbeat-
    /// aligned) next round.
    start_pending: bool,

    // Elapsed offsets captured at pause time, re-applied on resume so
    // beat phase and round clock continue instead of resetting.
    paused_phase: Phase,
    paused_beat_elapsed: Duration,
    paused_round_elapsed: Duration,
    paused_result_remaining: Duration,
}

impl RoundScheduler {
    pub fn new(config: TrainerConfig) -> RoundScheduler {
        Self::with_rng(config, SmallRng::from_os_rng())
    }

    /// Deterministic construction for tests and replays.
    pub fn with_seed(config: TrainerConfig, seed: u64) -> RoundScheduler {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: TrainerConfig, rng: SmallRng) -> RoundScheduler {
        let config = config.sanitized();
        let now = Instant::now();
        let smoother = match config.smoothing {
            0 => None,
            n => Some(NoteSmoother::new(n)),
        };
        RoundScheduler {
            config,
            rng,
            smoother,
            phase: Phase::Idle,
            target: None,
            outcome: Outcome::Pending,
            hits: 0,
            beat: 0,
            last_beat_at: now,
            round_started_at: now,
            result_until: now,
            start_pending: false,
            paused_phase: Phase::Idle,
            paused_beat_elapsed: Duration::ZERO,
            paused_round_elapsed: Duration::ZERO,
            paused_result_remaining: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// Starts the first round. Only meaningful from `Idle`; the host
    /// calls this once capture is confirmed live, and again after a
    /// failed capture attempt has been retried by the user.
    pub fn start(&mut self, now: Instant) {
        if self.phase != Phase::Idle {
            return;
        }
        self.beat = 0;
        self.last_beat_at = now;
        self.begin_round(now);
    }

    /// Freezes or resumes the session. Pausing keeps the elapsed offsets
    /// so resuming continues the beat phase and round clock instead of
    /// restarting them; the microphone stays open throughout (that is the
    /// host's resource, not ours).
    pub fn toggle_pause(&mut self, now: Instant) {
        match self.phase {
            Phase::Active | Phase::Showing => {
                self.paused_phase = self.phase;
                self.paused_beat_elapsed = now.duration_since(self.last_beat_at);
                self.paused_round_elapsed = now.duration_since(self.round_started_at);
                self.paused_result_remaining = self.result_until.saturating_duration_since(now);
                self.phase = Phase::Paused;
            }
            Phase::Paused => {
                self.last_beat_at = now - self.paused_beat_elapsed;
                self.round_started_at = now - self.paused_round_elapsed;
                self.result_until = now + self.paused_result_remaining;
                self.phase = self.paused_phase;
            }
            Phase::Idle => {}
        }
    }

    /// Sets the tempo, clamped to the supported range. Takes effect from
    /// the next beat edge.
    pub fn set_bpm(&mut self, bpm: u32) {
        self.config.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    }

    /// Switches between note and chord training. The new pool applies
    /// from the next round; the running round keeps its target.
    pub fn set_mode(&mut self, mode: TrainingMode) {
        self.config.mode = mode;
    }

    /// Advances the state machine by one host tick.
    ///
    /// Order per the control flow of the system: metronome first, then
    /// pending round starts, then detection against the current target,
    /// then the timeout check.
    pub fn tick(&mut self, now: Instant, frame: Option<Frame<'_>>) -> TickReport {
        if matches!(self.phase, Phase::Idle | Phase::Paused) {
            return self.report(now, false, false, None, None);
        }

        // --- Metronome: step by exact beat durations so phase never
        // drifts, catching up if the host stalled ---
        let beat_duration = Duration::from_millis(self.config.beat_duration_ms());
        let mut beat_advanced = false;
        let mut downbeat = false;
        while now.duration_since(self.last_beat_at) >= beat_duration {
            self.last_beat_at += beat_duration;
            self.beat = (self.beat + 1) % BEATS_PER_BAR;
            beat_advanced = true;
            if self.beat == 0 {
                downbeat = true;
            }
        }

        // --- Result display over: queue (or perform) the next round ---
        if self.phase == Phase::Showing {
            if now >= self.result_until {
                self.start_pending = true;
            }
            if self.start_pending && (!self.config.start_on_downbeat || downbeat) {
                self.begin_round(now);
            }
        }

        // --- Detection against the target ---
        let mut flash = None;
        let mut detected = None;
        if self.phase == Phase::Active {
            if let Some(frame) = frame {
                if let Some(note) = self.detect(frame) {
                    detected = Some(note);
                    let matched = self
                        .target
                        .as_ref()
                        .is_some_and(|target| target.matches(note));
                    if matched {
                        self.hits += 1;
                        flash = Some(Flash::Hit);
                        if self.hits >= self.config.required_hits {
                            self.finish_round(now, Outcome::Correct);
                        }
                    } else {
                        flash = Some(Flash::Miss);
                    }
                }
            }

            // --- Timeout: the round ran its full duration undecided ---
            if self.phase == Phase::Active
                && now.duration_since(self.round_started_at).as_secs_f32()
                    >= self.config.round_secs
            {
                self.finish_round(now, Outcome::Timeout);
            }
        }

        self.report(now, beat_advanced, downbeat, flash, detected)
    }

    /// Runs pitch detection on a frame. A panic anywhere below is
    /// swallowed and treated as a silent frame so the host loop survives.
    fn detect(&mut self, frame: Frame<'_>) -> Option<NoteName> {
        let threshold = self.config.silence_threshold;
        let raw = panic::catch_unwind(AssertUnwindSafe(|| {
            pitch::detect_note(frame.samples, frame.sample_rate, threshold)
        }))
        .unwrap_or_else(|_| {
            eprintln!("[SCHEDULER] Detection panicked; treating tick as silence");
            None
        })?;
        Some(match &mut self.smoother {
            Some(smoother) => smoother.push(raw),
            None => raw,
        })
    }

    fn begin_round(&mut self, now: Instant) {
        self.target = Some(self.pick_target());
        self.outcome = Outcome::Pending;
        self.hits = 0;
        self.round_started_at = now;
        self.start_pending = false;
        self.phase = Phase::Active;
    }

    fn finish_round(&mut self, now: Instant, outcome: Outcome) {
        self.outcome = outcome;
        self.result_until = now + Duration::from_millis(self.config.result_display_ms);
        self.phase = Phase::Showing;
    }

    /// Uniform pick from the active pool, rejecting the previous target
    /// so the same prompt never appears twice in a row.
    fn pick_target(&mut self) -> Target {
        loop {
            let candidate = match self.config.mode {
                TrainingMode::Notes => {
                    Target::Note(NATURALS[self.rng.random_range(0..NATURALS.len())])
                }
                TrainingMode::Chords => {
                    let chords = once_cell::sync::Lazy::force(&CHORDS);
                    Target::Chord(&chords[self.rng.random_range(0..chords.len())])
                }
            };
            if self.target.as_ref() != Some(&candidate) {
                return candidate;
            }
        }
    }

    fn report(
        &self,
        now: Instant,
        beat_advanced: bool,
        downbeat: bool,
        flash: Option<Flash>,
        detected: Option<NoteName>,
    ) -> TickReport {
        let progress = match self.phase {
            Phase::Idle => 0.0,
            Phase::Showing => 1.0,
            Phase::Active | Phase::Paused => {
                let elapsed = match self.phase {
                    Phase::Paused => self.paused_round_elapsed,
                    _ => now.duration_since(self.round_started_at),
                };
                (elapsed.as_secs_f32() / self.config.round_secs).clamp(0.0, 1.0)
            }
        };
        TickReport {
            phase: self.phase,
            target: self.target.clone(),
            outcome: self.outcome,
            beat: self.beat,
            beat_advanced,
            downbeat,
            progress,
            flash,
            detected,
        }
    }

    #[cfg(test)]
    fn force_target(&mut self, target: Target) {
        self.target = Some(target);
    }
}
