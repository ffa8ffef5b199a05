//! # Audio Capture Module
//!
//! Microphone capture via CPAL. The device callback accumulates incoming
//! samples and ships fixed-size frames over a channel to whichever thread
//! runs the analysis; nothing here blocks and nothing here analyses.
//!
//! Capture failure (no device, permission denied, no f32 format) is
//! terminal for the attempt: the error propagates to the host, which
//! reports it and waits for the user to try again. There is no retry
//! loop.

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

/// Samples per analysis frame. Power of two for the FFT; ~46 ms at
/// 44.1 kHz, long enough for the 1000-sample maximum autocorrelation lag.
pub const FRAME_SIZE: usize = 2048;

/// Preferred capture rate in Hz.
const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Opens the default input device and starts streaming frames.
///
/// Frames of exactly [`FRAME_SIZE`] mono samples are pushed through
/// `sender`; when the device is not mono, the first channel is extracted.
/// Returns the live stream handle (capture stops when it drops) and the
/// actual sample rate.
pub fn start_capture(sender: Sender<Vec<f32>>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no audio input device available"))?;
    eprintln!("[AUDIO] Using input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported = pick_config(configs)
        .ok_or_else(|| anyhow!("no f32 input format on the default device"))?;

    let channels = supported.channels() as usize;
    let sample_rate = supported
        .clone()
        .try_with_sample_rate(cpal::SampleRate(TARGET_SAMPLE_RATE))
        .unwrap_or_else(|| supported.with_max_sample_rate());
    let rate = sample_rate.sample_rate().0;
    let config: cpal::StreamConfig = sample_rate.into();
    eprintln!("[AUDIO] Capturing at {rate} Hz, {channels} channel(s)");

    let err_fn = |err| eprintln!("[AUDIO] Stream error: {err}");

    // Accumulates callback data until a full frame is available.
    let mut pending = Vec::with_capacity(FRAME_SIZE * 2);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if channels == 1 {
                pending.extend_from_slice(data);
            } else {
                pending.extend(data.iter().step_by(channels));
            }

            while pending.len() >= FRAME_SIZE {
                let frame = pending[..FRAME_SIZE].to_vec();
                // A full analysis channel just means the consumer is
                // behind; dropping the frame is fine.
                let _ = sender.try_send(frame);
                pending.drain(..FRAME_SIZE);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, rate))
}

/// Chooses an f32 input config, mono if the device offers one, with the
/// supported range closest to the target rate.
fn pick_config(configs: Vec<SupportedStreamConfigRange>) -> Option<SupportedStreamConfigRange> {
    let f32_configs: Vec<_> = configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .collect();

    let rate_distance = |c: &SupportedStreamConfigRange| {
        let min = (c.min_sample_rate().0 as i64 - TARGET_SAMPLE_RATE as i64).abs();
        let max = (c.max_sample_rate().0 as i64 - TARGET_SAMPLE_RATE as i64).abs();
        min.min(max)
    };

    f32_configs
        .iter()
        .filter(|c| c.channels() == 1)
        .min_by_key(|c| rate_distance(c))
        .or_else(|| f32_configs.iter().min_by_key(|c| rate_distance(c)))
        .cloned()
}
