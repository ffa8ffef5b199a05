// trainer-core/src/lib.rs

//! The core logic for the ear-training game.
//! This crate is responsible for audio capture, pitch detection, the
//! chord/note tables and the round/metronome scheduler. It is completely
//! headless and contains no terminal or rendering code.

pub mod audio;
pub mod chords;
pub mod config;
pub mod notes;
pub mod pitch;
pub mod scheduler;
pub mod spectrum;

use notes::NoteName;

/// The per-frame analysis product the audio worker ships to the host:
/// the raw samples for the scheduler, plus derived display data.
#[derive(Debug, Clone)]
pub struct DetectionFrame {
    /// The raw time-domain samples the frame was built from.
    pub samples: Vec<f32>,
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Estimated fundamental, if the frame carried one.
    pub frequency: Option<f32>,
    /// Pitch class of the estimate.
    pub note: Option<NoteName>,
    /// Magnitude spectrum for the display strip.
    pub spectrum: Vec<f32>,
}
