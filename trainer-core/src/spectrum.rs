//! # Spectrum Module
//!
//! Magnitude-spectrum computation feeding the host's frequency-bar
//! display. Detection itself stays in the time domain; this module
//! exists purely so the display has something to draw.

use rustfft::{FftPlanner, num_complex::Complex};
use std::sync::Arc;

/// Reusable FFT pipeline for a fixed frame size.
///
/// Plans the transform once and reuses it for every frame, which matters
/// at ~20 frames per second. Each frame is DC-centred and Hann-windowed
/// before the transform to keep the bars from smearing.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn rustfft::Fft<f32>>,
    frame_size: usize,
    window: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(frame_size: usize) -> SpectrumAnalyzer {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_size);
        let window = (0..frame_size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / (frame_size - 1).max(1) as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();
        SpectrumAnalyzer {
            fft,
            frame_size,
            window,
        }
    }

    /// Magnitudes of the first `frame_size / 2` bins (up to Nyquist).
    ///
    /// A frame of the wrong length degrades to an empty vector instead of
    /// faulting; the display simply draws nothing for that tick.
    pub fn magnitudes(&self, frame: &[f32]) -> Vec<f32> {
        if frame.len() != self.frame_size {
            return Vec::new();
        }

        let mean = frame.iter().sum::<f32>() / self.frame_size as f32;
        let mut buffer: Vec<Complex<f32>> = frame
            .iter()
            .zip(&self.window)
            .map(|(&sample, &w)| Complex {
                re: (sample - mean) * w,
                im: 0.0,
            })
            .collect();

        self.fft.process(&mut buffer);

        buffer
            .iter()
            .take(self.frame_size / 2)
            .map(|c| c.norm())
            .collect()
    }
}
