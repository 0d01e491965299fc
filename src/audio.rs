use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{info, warn};

use crate::recognizer::AudioSource;
use crate::spectrum::{PeakExtractor, DEFAULT_MIN_MAGNITUDE};
use crate::{FrequencySnapshot, FRAME_SIZE, SAMPLE_RATE};

/// Block length in samples giving the same frame duration as `FRAME_SIZE`
/// at `SAMPLE_RATE`, so pattern lengths in frames keep their meaning.
pub fn frame_size_for(sample_rate: u32) -> usize {
    let scaled = FRAME_SIZE as u64 * sample_rate as u64 / SAMPLE_RATE as u64;
    (scaled as usize).max(1)
}

/// Microphone front end: captures mono blocks of one frame duration and
/// hands them to a [`PeakExtractor`] one block per pull.
pub struct MicSource {
    stream: Stream,
    receiver: Receiver<Vec<f32>>,
    extractor: PeakExtractor,
    recording: bool,
}

impl MicSource {
    pub fn new() -> Result<Self> {
        Self::with_min_magnitude(DEFAULT_MIN_MAGNITUDE)
    }

    pub fn with_min_magnitude(min_magnitude: f32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No input device available")?;

        // Prefer f32 at our rate, otherwise take the device default
        let supported = device
            .supported_input_configs()
            .context("Failed to get supported configs")?
            .filter(|c| c.sample_format() == SampleFormat::F32)
            .find(|c| {
                c.min_sample_rate().0 <= SAMPLE_RATE && c.max_sample_rate().0 >= SAMPLE_RATE
            })
            .map(|c| c.with_sample_rate(SampleRate(SAMPLE_RATE)));

        let supported = match supported {
            Some(config) => config,
            None => device
                .default_input_config()
                .context("No suitable audio config found")?,
        };

        let config = supported.config();
        let sample_rate = config.sample_rate.0;
        let frame_size = frame_size_for(sample_rate);
        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".into()),
            sample_rate,
            channels = config.channels,
            frame_size,
            "opened input device"
        );
        if sample_rate != SAMPLE_RATE {
            warn!(
                sample_rate,
                expected = SAMPLE_RATE,
                frame_size,
                "device rate differs, re-blocking to keep the frame duration"
            );
        }

        let (sender, receiver) = mpsc::channel();
        let stream = Self::build_stream(&device, &config, frame_size, sender)?;
        stream.pause().context("Failed to pause audio stream")?;

        Ok(Self {
            stream,
            receiver,
            extractor: PeakExtractor::new(sample_rate, frame_size, min_magnitude),
            recording: false,
        })
    }

    fn build_stream(
        device: &cpal::Device,
        config: &StreamConfig,
        frame_size: usize,
        sender: Sender<Vec<f32>>,
    ) -> Result<Stream> {
        let err_fn = |err| warn!("Audio stream error: {}", err);
        let channels = config.channels.max(1) as usize;
        let mut pending: Vec<f32> = Vec::with_capacity(frame_size * 2);

        let stream = device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // First channel only
                pending.extend(data.iter().step_by(channels));

                // Send complete blocks
                while pending.len() >= frame_size {
                    let block: Vec<f32> = pending.drain(..frame_size).collect();
                    let _ = sender.send(block);
                }
            },
            err_fn,
            None,
        )?;

        Ok(stream)
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }
}

impl AudioSource for MicSource {
    /// Blocks until the next captured block is available. Returns silence
    /// immediately while not recording.
    fn pull(&mut self) -> Result<FrequencySnapshot> {
        if !self.recording {
            return Ok(FrequencySnapshot::silence());
        }
        let block = self.receiver.recv().context("Audio channel closed")?;
        self.extractor.extract(&block)
    }

    fn start_recording(&mut self) -> Result<()> {
        self.stream.play().context("Failed to start audio stream")?;
        self.recording = true;
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<()> {
        self.recording = false;
        self.stream.pause().context("Failed to pause audio stream")?;
        // Drop blocks captured before the pause took effect
        while self.receiver.try_recv().is_ok() {}
        Ok(())
    }
}
