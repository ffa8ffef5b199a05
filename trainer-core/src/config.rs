//! # Configuration Module
//!
//! Runtime settings for a training session. Everything is serde-derived
//! so the host can persist a session profile as JSON and reload it later;
//! missing fields fall back to the defaults below.

use serde::{Deserialize, Serialize};

/// Metronome tempo bounds, beats per minute.
pub const MIN_BPM: u32 = 40;
pub const MAX_BPM: u32 = 240;

/// What the trainer asks for each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingMode {
    /// Single natural notes (C D E F G A B).
    Notes,
    /// Chords from the full formula table; any chord tone counts.
    Chords,
}

/// Settings for a training session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Metronome tempo; clamped to [`MIN_BPM`]..=[`MAX_BPM`].
    pub bpm: u32,
    /// Round length in seconds before a timeout is declared.
    pub round_secs: f32,
    /// How long a Correct/Timeout result stays on screen, milliseconds.
    pub result_display_ms: u64,
    /// RMS gate below which a frame counts as silence.
    pub silence_threshold: f32,
    /// Correct detections required before a round is won.
    pub required_hits: u32,
    /// Majority-vote window for detection smoothing; 0 disables it.
    pub smoothing: usize,
    /// Defer new rounds to the next downbeat instead of starting
    /// immediately after the result interval.
    pub start_on_downbeat: bool,
    pub mode: TrainingMode,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            bpm: 80,
            round_secs: 10.0,
            result_display_ms: 1000,
            silence_threshold: 0.02,
            required_hits: 3,
            smoothing: 7,
            start_on_downbeat: false,
            mode: TrainingMode::Chords,
        }
    }
}

impl TrainerConfig {
    /// Returns a copy with every field forced into its valid range.
    /// Applied once after loading a profile; runtime setters clamp on
    /// their own.
    pub fn sanitized(&self) -> TrainerConfig {
        let mut cfg = self.clone();
        cfg.bpm = cfg.bpm.clamp(MIN_BPM, MAX_BPM);
        cfg.round_secs = if cfg.round_secs.is_finite() && cfg.round_secs > 0.0 {
            cfg.round_secs
        } else {
            Self::default().round_secs
        };
        cfg.silence_threshold = if cfg.silence_threshold.is_finite() && cfg.silence_threshold >= 0.0
        {
            cfg.silence_threshold
        } else {
            Self::default().silence_threshold
        };
        cfg.required_hits = cfg.required_hits.max(1);
        cfg
    }

    /// Duration of one metronome beat in milliseconds.
    pub fn beat_duration_ms(&self) -> u64 {
        60_000 / self.bpm.clamp(MIN_BPM, MAX_BPM) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_range() {
        let cfg = TrainerConfig::default();
        let clean = cfg.sanitized();
        assert_eq!(clean.bpm, cfg.bpm);
        assert_eq!(clean.required_hits, cfg.required_hits);
    }

    #[test]
    fn bpm_is_clamped_both_ways() {
        let mut cfg = TrainerConfig::default();
        cfg.bpm = 10;
        assert_eq!(cfg.sanitized().bpm, MIN_BPM);
        cfg.bpm = 999;
        assert_eq!(cfg.sanitized().bpm, MAX_BPM);
    }

    #[test]
    fn nonsense_floats_fall_back_to_defaults() {
        let mut cfg = TrainerConfig::default();
        cfg.round_secs = -3.0;
        cfg.silence_threshold = f32::NAN;
        cfg.required_hits = 0;
        let clean = cfg.sanitized();
        assert_eq!(clean.round_secs, TrainerConfig::default().round_secs);
        assert_eq!(
            clean.silence_threshold,
            TrainerConfig::default().silence_threshold
        );
        assert_eq!(clean.required_hits, 1);
    }

    #[test]
    fn beat_duration_follows_bpm() {
        let mut cfg = TrainerConfig::default();
        cfg.bpm = 80;
        assert_eq!(cfg.beat_duration_ms(), 750);
        cfg.bpm = 120;
        assert_eq!(cfg.beat_duration_ms(), 500);
    }
}
