use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use crate::recognizer::AudioSource;
use crate::FrequencySnapshot;

/// Plays back previously analysed frames.
///
/// Text format: one frame per line, peak frequencies in Hz strongest first
/// separated by whitespace. A blank line or `-` is a silent frame and `#`
/// starts a comment; lines holding only a comment are skipped.
#[derive(Debug, Default)]
pub struct ReplaySource {
    frames: Vec<FrequencySnapshot>,
    cursor: usize,
    recording: bool,
}

impl ReplaySource {
    pub fn new(frames: Vec<FrequencySnapshot>) -> Self {
        Self {
            frames,
            cursor: 0,
            recording: false,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open frame file {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to read frame file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::from_reader(text.as_bytes())
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut frames = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim_start().starts_with('#') {
                continue;
            }
            let content = line.split('#').next().unwrap_or("").trim();
            if content.is_empty() || content == "-" {
                frames.push(FrequencySnapshot::silence());
                continue;
            }

            let peaks = content
                .split_whitespace()
                .map(|token| {
                    token
                        .parse::<u16>()
                        .with_context(|| format!("line {}: invalid frequency '{}'", index + 1, token))
                })
                .collect::<Result<Vec<_>>>()?;
            frames.push(FrequencySnapshot::from_peaks(&peaks));
        }

        debug!(frames = frames.len(), "parsed replay frames");
        Ok(Self::new(frames))
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.frames.len()
    }

    pub fn remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.cursor)
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn frames(&self) -> &[FrequencySnapshot] {
        &self.frames
    }
}

impl AudioSource for ReplaySource {
    /// Next recorded frame, silence once the recording has run out.
    fn pull(&mut self) -> Result<FrequencySnapshot> {
        let frame = self
            .frames
            .get(self.cursor)
            .copied()
            .unwrap_or_else(FrequencySnapshot::silence);
        self.cursor = (self.cursor + 1).min(self.frames.len());
        Ok(frame)
    }

    fn start_recording(&mut self) -> Result<()> {
        self.recording = true;
        info!(remaining = self.remaining(), "replay started");
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<()> {
        self.recording = false;
        info!(remaining = self.remaining(), "replay stopped");
        Ok(())
    }
}
