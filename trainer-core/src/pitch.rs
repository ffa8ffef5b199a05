//! # Pitch Detection Module
//!
//! Time-domain autocorrelation pitch detection for the trainer.
//!
//! The detector favours robustness over precision: an RMS gate rejects
//! the noise floor, and the lag scan is bounded to the range a voice or
//! guitar actually produces (roughly 44 Hz to 1.1 kHz at 44.1 kHz). The
//! result is quantised to the nearest lag, which keeps the estimate
//! within a semitone across the training range.

use std::collections::VecDeque;

use crate::notes::NoteName;

/// Smallest lag considered by the autocorrelation scan, in samples.
/// At 44.1 kHz this caps detection at about 1.1 kHz.
pub const MIN_LAG: usize = 40;

/// Largest lag considered (exclusive). About 44 Hz at 44.1 kHz.
pub const MAX_LAG: usize = 1000;

/// Fraction of the global correlation maximum a peak must reach to be
/// accepted as the fundamental.
const PEAK_FRACTION: f32 = 0.95;

/// Estimates the fundamental frequency of a buffer of time-domain samples.
///
/// Returns `None` when the signal energy is below `silence_threshold`
/// (RMS gate) or when no lag in the search range produces a positive
/// correlation. Buffers too short for the minimum lag degrade to `None`
/// rather than fault; buffers shorter than twice the maximum lag simply
/// truncate the search range.
pub fn detect_pitch(samples: &[f32], sample_rate: u32, silence_threshold: f32) -> Option<f32> {
    if sample_rate == 0 {
        return None;
    }
    // Lags past half the frame leave too little overlap to trust.
    let max_lag = MAX_LAG.min(samples.len() / 2);
    if max_lag <= MIN_LAG {
        return None;
    }

    // --- Noise gate: skip the scan entirely on silence ---
    let rms = (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt();
    if rms < silence_threshold {
        return None;
    }

    // --- Autocorrelation over the lag range, mean per overlap sample so
    // short and long lags compare on equal footing ---
    let mut correlations = Vec::with_capacity(max_lag - MIN_LAG);
    for lag in MIN_LAG..max_lag {
        let overlap = samples.len() - lag;
        let mut sum = 0.0f32;
        for i in 0..overlap {
            sum += samples[i] * samples[i + lag];
        }
        correlations.push(sum / overlap as f32);
    }

    let best = correlations.iter().copied().fold(f32::MIN, f32::max);
    if best <= 0.0 {
        return None;
    }

    // The global maximum alone is unreliable: integer multiples of the
    // true period score within noise of each other. Take the first peak
    // that comes close to the maximum instead, then climb to its crest.
    let threshold = PEAK_FRACTION * best;
    let mut i = 0;
    while correlations[i] < threshold {
        i += 1;
    }
    while i + 1 < correlations.len() && correlations[i + 1] > correlations[i] {
        i += 1;
    }

    Some(sample_rate as f32 / (MIN_LAG + i) as f32)
}

/// Detects a pitch and reduces it to a pitch class in one step.
pub fn detect_note(samples: &[f32], sample_rate: u32, silence_threshold: f32) -> Option<NoteName> {
    detect_pitch(samples, sample_rate, silence_threshold).and_then(NoteName::from_frequency)
}

/// Majority-vote smoother over recent detections.
///
/// Keeps a fixed-capacity FIFO of the last detected pitch classes and
/// reports the most frequent one. A single glitched frame (octave error,
/// plosive) cannot flip the reported note; it takes a sustained change
/// to move the majority.
#[derive(Debug)]
pub struct NoteSmoother {
    history: VecDeque<NoteName>,
    capacity: usize,
}

impl NoteSmoother {
    /// `capacity` is the window length; the originals used 5-7 frames.
    pub fn new(capacity: usize) -> NoteSmoother {
        NoteSmoother {
            history: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Records a detection and returns the current majority note.
    pub fn push(&mut self, note: NoteName) -> NoteName {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(note);
        self.mode().unwrap_or(note)
    }

    /// The most frequent note in the window, ties broken by the most
    /// recent occurrence.
    pub fn mode(&self) -> Option<NoteName> {
        let mut counts = [0u32; 12];
        for note in &self.history {
            counts[note.index()] += 1;
        }
        self.history
            .iter()
            .rev()
            .max_by_key(|note| counts[note.index()])
            .copied()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE_RATE: u32 = 44_100;
    const FRAME: usize = 2048;
    const THRESHOLD: f32 = 0.01;

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin() * 0.5
            })
            .collect()
    }

    #[test]
    fn silence_yields_no_pitch() {
        let zeros = vec![0.0f32; FRAME];
        assert_eq!(detect_pitch(&zeros, SAMPLE_RATE, THRESHOLD), None);

        // Below the RMS gate but not exactly zero.
        let quiet: Vec<f32> = (0..FRAME).map(|i| if i % 2 == 0 { 0.001 } else { -0.001 }).collect();
        assert_eq!(detect_pitch(&quiet, SAMPLE_RATE, THRESHOLD), None);
    }

    #[test]
    fn degenerate_buffers_degrade_to_none() {
        assert_eq!(detect_pitch(&[], SAMPLE_RATE, THRESHOLD), None);
        assert_eq!(detect_pitch(&[0.5; 16], SAMPLE_RATE, THRESHOLD), None);
        assert_eq!(detect_pitch(&sine(440.0, FRAME), 0, THRESHOLD), None);
    }

    #[test]
    fn a4_sine_detects_near_440() {
        let freq = detect_pitch(&sine(440.0, FRAME), SAMPLE_RATE, THRESHOLD)
            .expect("A4 sine must produce a pitch");
        // Lag quantisation: 44100/100 = 441 Hz is the nearest grid point.
        assert_relative_eq!(freq, 440.0, max_relative = 0.02);
    }

    #[test]
    fn sines_map_to_their_pitch_class_across_the_range() {
        // Spot checks across the supported range; lag quantisation keeps
        // the result within a semitone, so the class must match exactly.
        let cases = [
            (82.41, NoteName::E),   // low E string
            (110.0, NoteName::A),
            (196.0, NoteName::G),
            (261.63, NoteName::C),
            (329.63, NoteName::E),
            (440.0, NoteName::A),
            (659.25, NoteName::E),
            (987.77, NoteName::B),
        ];
        for (freq, expected) in cases {
            assert_eq!(
                detect_note(&sine(freq, FRAME), SAMPLE_RATE, THRESHOLD),
                Some(expected),
                "failed for {freq} Hz"
            );
        }
    }

    #[test]
    fn short_buffer_truncates_the_lag_scan() {
        // 512 samples cannot fit a 40 ms period, but a 440 Hz tone has a
        // ~100-sample period and must still be found.
        let freq = detect_pitch(&sine(440.0, 512), SAMPLE_RATE, THRESHOLD)
            .expect("440 Hz fits in a 512-sample frame");
        assert_relative_eq!(freq, 440.0, max_relative = 0.03);
    }

    #[test]
    fn smoother_reports_the_majority_note() {
        let mut smoother = NoteSmoother::new(5);
        for _ in 0..3 {
            smoother.push(NoteName::C);
        }
        // One glitched frame must not change the report.
        assert_eq!(smoother.push(NoteName::Fs), NoteName::C);
        assert_eq!(smoother.mode(), Some(NoteName::C));
    }

    #[test]
    fn smoother_evicts_oldest_entries_first() {
        let mut smoother = NoteSmoother::new(3);
        smoother.push(NoteName::C);
        smoother.push(NoteName::A);
        smoother.push(NoteName::A);
        // C falls out of the window here.
        smoother.push(NoteName::A);
        assert_eq!(smoother.mode(), Some(NoteName::A));

        smoother.clear();
        assert_eq!(smoother.mode(), None);
    }
}
