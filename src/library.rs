//! Pattern library files.
//!
//! A library is a TOML document describing how much storage the recogniser
//! reserves and the set of patterns to register, in order:
//!
//! ```toml
//! [recognizer]
//! window_frames = 32
//!
//! [[pattern]]
//! name = "whistle"
//! max_deviation = 2
//!
//! [[pattern.stage]]
//! threshold = 60
//! mismatch_budget = 1
//! samples = [[1800, 1850, 0, 1900], [1800, 1900]]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::error::{PatternError, RecognizerError};
use crate::{AudioSource, Pattern, Recognizer, RecognizerConfig, Sample, Stage, HISTORY_LENGTH};

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("failed to read pattern library {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid pattern library: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("pattern '{name}': {source}")]
    Pattern { name: String, source: PatternError },
    #[error(transparent)]
    Register(#[from] RecognizerError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Library {
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default, rename = "pattern")]
    pub patterns: Vec<PatternSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternSpec {
    pub name: String,
    #[serde(default)]
    pub max_deviation: u8,
    #[serde(default = "default_history")]
    pub history: usize,
    #[serde(default)]
    pub all_peaks: bool,
    #[serde(default, rename = "stage")]
    pub stages: Vec<StageSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageSpec {
    pub threshold: u16,
    #[serde(default)]
    pub mismatch_budget: u8,
    pub samples: Vec<Vec<u16>>,
}

fn default_history() -> usize {
    HISTORY_LENGTH
}

impl PatternSpec {
    pub fn build(&self) -> Result<Pattern, PatternError> {
        let mut builder = Pattern::builder()
            .max_deviation(self.max_deviation)
            .history(self.history)
            .all_peaks(self.all_peaks);

        for stage in &self.stages {
            let samples = stage
                .samples
                .iter()
                .map(|targets| Sample::new(targets.as_slice()))
                .collect::<Result<Vec<_>, _>>()?;
            builder = builder.stage(Stage::new(stage.threshold, stage.mismatch_budget, samples)?);
        }

        builder.build()
    }
}

impl Library {
    pub fn from_toml_str(text: &str) -> Result<Self, LibraryError> {
        let library: Self = toml::from_str(text)?;
        library.recognizer.validate()?;
        Ok(library)
    }

    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let text = fs::read_to_string(path).map_err(|source| LibraryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Build every pattern, in file order.
    pub fn patterns(&self) -> Result<Vec<(String, Pattern)>, LibraryError> {
        self.patterns
            .iter()
            .map(|spec| {
                spec.build()
                    .map(|pattern| (spec.name.clone(), pattern))
                    .map_err(|source| LibraryError::Pattern {
                        name: spec.name.clone(),
                        source,
                    })
            })
            .collect()
    }

    /// A recogniser over `source` sized by this library with all its patterns
    /// registered.
    pub fn recognizer<S: AudioSource>(&self, source: S) -> Result<Recognizer<S>, LibraryError> {
        let mut recognizer = Recognizer::with_config(source, self.recognizer)?;
        for (name, pattern) in self.patterns()? {
            recognizer.register(name, pattern)?;
        }
        Ok(recognizer)
    }
}
