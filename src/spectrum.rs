use anyhow::{anyhow, Result};
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::{FrequencySnapshot, MAX_PEAKS};

/// Peaks quieter than this (in linear amplitude, full scale = 1.0) are ignored.
pub const DEFAULT_MIN_MAGNITUDE: f32 = 0.02;

/// Turns blocks of audio into [`FrequencySnapshot`]s.
///
/// Hann window, real FFT, then the strongest local maxima of the magnitude
/// spectrum refined with parabolic interpolation. All buffers are allocated
/// up front.
pub struct PeakExtractor {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    bin_hz: f32,
    scale: f32,
    min_magnitude: f32,
}

impl PeakExtractor {
    pub fn new(sample_rate: u32, frame_size: usize, min_magnitude: f32) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(frame_size);

        // periodic Hann
        let window: Vec<f32> = (0..frame_size)
            .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / frame_size as f32).cos())
            .collect();
        let scale = 2.0 / window.iter().sum::<f32>().max(f32::EPSILON);

        let spectrum = fft.make_output_vec();
        let magnitudes = vec![0.0; spectrum.len()];

        Self {
            fft,
            window,
            input: vec![0.0; frame_size],
            spectrum,
            magnitudes,
            bin_hz: sample_rate as f32 / frame_size as f32,
            scale,
            min_magnitude,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.window.len()
    }

    /// Analyse one block. Shorter blocks are zero padded, longer ones are
    /// truncated to the frame size.
    pub fn extract(&mut self, audio: &[f32]) -> Result<FrequencySnapshot> {
        for (i, (slot, &w)) in self.input.iter_mut().zip(&self.window).enumerate() {
            *slot = audio.get(i).copied().unwrap_or(0.0) * w;
        }

        self.fft
            .process(&mut self.input, &mut self.spectrum)
            .map_err(|e| anyhow!("FFT processing failed: {:?}", e))?;

        for (mag, c) in self.magnitudes.iter_mut().zip(&self.spectrum) {
            *mag = c.norm() * self.scale;
        }

        // (magnitude, bin) strongest first
        let mut best = [(0.0f32, 0usize); MAX_PEAKS];
        let mut found = 0;

        for k in 1..self.magnitudes.len().saturating_sub(1) {
            let m = self.magnitudes[k];
            if m < self.min_magnitude
                || m <= self.magnitudes[k - 1]
                || m < self.magnitudes[k + 1]
            {
                continue;
            }

            let pos = best[..found].iter().position(|&(other, _)| m > other);
            match pos {
                Some(pos) => {
                    let end = found.min(MAX_PEAKS - 1);
                    best.copy_within(pos..end, pos + 1);
                    best[pos] = (m, k);
                    found = (found + 1).min(MAX_PEAKS);
                }
                None if found < MAX_PEAKS => {
                    best[found] = (m, k);
                    found += 1;
                }
                None => {}
            }
        }

        let mut peaks = [0u16; MAX_PEAKS];
        for (slot, &(_, bin)) in peaks.iter_mut().zip(&best[..found]) {
            *slot = self.bin_to_hz(bin);
        }
        Ok(FrequencySnapshot::from_peaks(&peaks[..found]))
    }

    fn bin_to_hz(&self, k: usize) -> u16 {
        let a = self.magnitudes[k - 1];
        let b = self.magnitudes[k];
        let c = self.magnitudes[k + 1];
        let denom = a - 2.0 * b + c;
        let offset = if denom.abs() > f32::EPSILON {
            (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
        } else {
            0.0
        };
        ((k as f32 + offset) * self.bin_hz)
            .round()
            .clamp(1.0, u16::MAX as f32) as u16
    }
}
