use crate::error::PatternError;
use crate::history::MatchHistory;
use crate::{Deviation, FrequencySnapshot, HISTORY_LENGTH, NO_MATCH, WILDCARD};

/// Longest sample a stage can hold, in frames.
pub const MAX_SAMPLE_LEN: usize = u8::MAX as usize;

/// One candidate frequency sequence for a stage. `0` targets are wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    targets: Box<[u16]>,
}

impl Sample {
    pub fn new(targets: impl Into<Vec<u16>>) -> Result<Self, PatternError> {
        let targets = targets.into();
        if targets.is_empty() {
            return Err(PatternError::EmptySample);
        }
        if targets.len() > MAX_SAMPLE_LEN {
            return Err(PatternError::SampleTooLong {
                len: targets.len(),
                max: MAX_SAMPLE_LEN,
            });
        }
        Ok(Self {
            targets: targets.into_boxed_slice(),
        })
    }

    pub fn targets(&self) -> &[u16] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// A checkpoint in a pattern's chain.
///
/// Holds alternative samples so the same stage can be hit at slightly
/// different tempos. `threshold` is the largest frequency error in Hz that
/// still counts as a hit and `mismatch_budget` is how many frames per sample
/// may miss it before the sample is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    samples: Vec<Sample>,
    threshold: u16,
    mismatch_budget: u8,
}

impl Stage {
    pub fn new(
        threshold: u16,
        mismatch_budget: u8,
        samples: Vec<Sample>,
    ) -> Result<Self, PatternError> {
        if samples.is_empty() {
            return Err(PatternError::EmptyStage);
        }
        Ok(Self {
            samples,
            threshold,
            mismatch_budget,
        })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn mismatch_budget(&self) -> u8 {
        self.mismatch_budget
    }
}

/// Validating builder for [`Pattern`].
#[derive(Debug, Clone)]
pub struct PatternBuilder {
    stages: Vec<Stage>,
    max_deviation: Deviation,
    history: usize,
    all_peaks: bool,
}

impl Default for PatternBuilder {
    fn default() -> Self {
        Self {
            stages: Vec::new(),
            max_deviation: 0,
            history: HISTORY_LENGTH,
            all_peaks: false,
        }
    }
}

impl PatternBuilder {
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn max_deviation(mut self, max_deviation: Deviation) -> Self {
        self.max_deviation = max_deviation;
        self
    }

    /// Number of ticks of per-stage scores kept live.
    pub fn history(mut self, frames: usize) -> Self {
        self.history = frames;
        self
    }

    /// Compare against every peak in a frame instead of only the strongest.
    pub fn all_peaks(mut self, all_peaks: bool) -> Self {
        self.all_peaks = all_peaks;
        self
    }

    pub fn build(self) -> Result<Pattern, PatternError> {
        if self.stages.is_empty() {
            return Err(PatternError::NoStages);
        }
        if self.max_deviation == NO_MATCH {
            return Err(PatternError::DeviationOutOfRange(self.max_deviation));
        }
        if self.history == 0 {
            return Err(PatternError::EmptyHistory);
        }

        // Stages after the first read the previous stage `len + 1` rows back,
        // and compaction can leave only `history` rows.
        let needed = self
            .stages
            .iter()
            .skip(1)
            .flat_map(|stage| stage.samples.iter().map(|s| s.len() + 1))
            .max()
            .unwrap_or(0);
        if self.history < needed {
            return Err(PatternError::HistoryTooShort {
                history: self.history,
                needed,
            });
        }

        let history = MatchHistory::new(self.stages.len(), self.history);
        Ok(Pattern {
            stages: self.stages,
            max_deviation: self.max_deviation,
            all_peaks: self.all_peaks,
            history,
        })
    }
}

/// A recognisable sound: an ordered chain of stages plus the rolling scores
/// used to stitch stage matches together across ticks.
#[derive(Debug)]
pub struct Pattern {
    stages: Vec<Stage>,
    max_deviation: Deviation,
    all_peaks: bool,
    history: MatchHistory,
}

impl Pattern {
    pub fn builder() -> PatternBuilder {
        PatternBuilder::default()
    }

    /// Score every stage against the latest frames and commit one history row.
    pub fn update(&mut self, frames: &[FrequencySnapshot]) {
        for stage in 0..self.stages.len() {
            let deviation = self.match_stage(stage, frames);
            self.history.record(stage, deviation);
        }
        self.history.end_row();
    }

    /// True once per completed chain: checks the last stage of the latest
    /// committed row and clears the history on success.
    pub fn matched(&mut self) -> bool {
        let last = self.stages.len() - 1;
        if self.history.deviation(1, last) <= self.max_deviation {
            self.history.reset();
            return true;
        }
        false
    }

    pub fn reset_history(&mut self) {
        self.history.reset();
    }

    /// Best deviation any alternative of `stage` achieves on the tail of
    /// `frames`, or `NO_MATCH`.
    pub fn match_stage(&self, stage: usize, frames: &[FrequencySnapshot]) -> Deviation {
        let Some(current) = self.stages.get(stage) else {
            return NO_MATCH;
        };
        let mut best = NO_MATCH;

        for sample in &current.samples {
            let len = sample.len();
            if frames.len() < len {
                continue;
            }

            let base = self.base_deviation(stage, len);
            if base > self.max_deviation || base >= best {
                continue;
            }

            let deviation = self.score_sample(current, sample, base, &frames[frames.len() - len..]);
            if deviation < best && deviation <= self.max_deviation {
                best = deviation;
            }
        }

        best
    }

    /// Deviation carried over from the previous stage. Looking one extra tick
    /// back tolerates a single inserted or dropped frame between stages.
    fn base_deviation(&self, stage: usize, sample_len: usize) -> Deviation {
        if stage == 0 {
            return 0;
        }
        let exact = self.history.deviation(sample_len, stage - 1);
        let late = self.history.deviation(sample_len + 1, stage - 1);
        exact.min(late)
    }

    fn score_sample(
        &self,
        stage: &Stage,
        sample: &Sample,
        base: Deviation,
        frames: &[FrequencySnapshot],
    ) -> Deviation {
        let mut deviation = base;
        let mut budget = stage.mismatch_budget;

        for (&target, frame) in sample.targets.iter().zip(frames) {
            if target == WILDCARD {
                continue;
            }
            let Some(diff) = frame.distance(target, self.all_peaks) else {
                // silence
                deviation = deviation.saturating_add(1);
                continue;
            };
            if diff <= stage.threshold {
                continue;
            }
            if budget == 0 {
                return NO_MATCH;
            }
            budget -= 1;
            deviation = deviation.saturating_add(1);
        }

        deviation
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn max_deviation(&self) -> Deviation {
        self.max_deviation
    }

    pub fn all_peaks(&self) -> bool {
        self.all_peaks
    }

    pub fn history(&self) -> &MatchHistory {
        &self.history
    }

    /// Length of the longest alternative across all stages.
    pub fn longest_sample(&self) -> usize {
        self.stages
            .iter()
            .flat_map(|stage| stage.samples.iter().map(Sample::len))
            .max()
            .unwrap_or(0)
    }
}
