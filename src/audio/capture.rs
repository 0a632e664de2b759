use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;

use crate::engine::session::FrameSource;

/// Live microphone capture exposed as a pull-style frame supplier.
///
/// The cpal callback pushes downmixed mono samples into a bounded ring;
/// the tick loop pulls the newest window out of it. Dropping the capture
/// stops the callback and releases the device.
pub struct FrameCapture {
    ring: Arc<Mutex<VecDeque<f32>>>,
    stop: Arc<AtomicBool>,
    // RAII: the device stays open exactly as long as this stream lives.
    _stream: cpal::Stream,
    sample_rate: u32,
}

/// Open the default input device and start capturing.
///
/// `ring_len` bounds how many recent samples are retained; it must cover
/// at least one analysis frame. Failure here (no device, unsupported
/// format) aborts the session start with nothing left running.
pub fn start_capture(ring_len: usize) -> Result<FrameCapture> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("No default input device found")?;

    let config = device
        .default_input_config()
        .context("Failed to get default input config")?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let format = config.sample_format();

    let ring = Arc::new(Mutex::new(VecDeque::with_capacity(ring_len)));
    let stop = Arc::new(AtomicBool::new(false));

    let stream = match format {
        SampleFormat::F32 => {
            let ring = Arc::clone(&ring);
            let stop = Arc::clone(&stop);
            device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    push_mono(&ring, ring_len, data.iter().step_by(channels).copied());
                },
                |err| eprintln!("Stream error: {err}"),
                None,
            )?
        }
        SampleFormat::I16 => {
            let ring = Arc::clone(&ring);
            let stop = Arc::clone(&stop);
            device.build_input_stream(
                &config.into(),
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    let mono = data
                        .iter()
                        .step_by(channels)
                        .map(|&s| s as f32 / i16::MAX as f32);
                    push_mono(&ring, ring_len, mono);
                },
                |err| eprintln!("Stream error: {err}"),
                None,
            )?
        }
        other => anyhow::bail!("Unsupported sample format: {other:?}"),
    };

    stream.play().context("Failed to start audio stream")?;

    Ok(FrameCapture {
        ring,
        stop,
        _stream: stream,
        sample_rate,
    })
}

impl FrameCapture {
    /// Copy of everything currently buffered (up to `ring_len` samples),
    /// oldest first. The mic check grades its capture window from this.
    pub fn snapshot(&self) -> Vec<f32> {
        self.ring
            .lock()
            .map(|ring| ring.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl FrameSource for FrameCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn fill_latest(&mut self, frame: &mut [f32]) {
        match self.ring.lock() {
            Ok(ring) => fill_from_tail(&ring, frame),
            Err(_) => frame.fill(0.0),
        }
    }
}

impl Drop for FrameCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Copy the newest samples into `frame`, zero-padding the front when the
/// ring holds fewer than a full frame.
fn fill_from_tail(ring: &VecDeque<f32>, frame: &mut [f32]) {
    let available = ring.len().min(frame.len());
    let lead = frame.len() - available;
    frame[..lead].fill(0.0);

    let start = ring.len() - available;
    for (slot, &sample) in frame[lead..].iter_mut().zip(ring.range(start..)) {
        *slot = sample;
    }
}

/// Append samples, discarding the oldest past the ring bound. try_lock on
/// the audio thread: a slow reader must never block the device callback.
fn push_mono(
    ring: &Arc<Mutex<VecDeque<f32>>>,
    ring_len: usize,
    samples: impl Iterator<Item = f32>,
) {
    if let Ok(mut ring) = ring.try_lock() {
        for sample in samples {
            if ring.len() >= ring_len {
                ring.pop_front();
            }
            ring.push_back(sample);
        }
    }
}
