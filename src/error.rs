use thiserror::Error;

/// Rejected pattern definitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("sample has no target frames")]
    EmptySample,
    #[error("sample has {len} frames, at most {max} are supported")]
    SampleTooLong { len: usize, max: usize },
    #[error("stage has no samples")]
    EmptyStage,
    #[error("pattern has no stages")]
    NoStages,
    #[error("max deviation {0} is out of range, must be below 255")]
    DeviationOutOfRange(u8),
    #[error("history capacity must be at least one frame")]
    EmptyHistory,
    #[error("history of {history} frames is too short, later stages look back {needed} frames")]
    HistoryTooShort { history: usize, needed: usize },
}

/// Registration failures. These indicate a programming error in the caller,
/// the matching path itself never fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecognizerError {
    #[error("pattern registry is full ({capacity} patterns)")]
    RegistryFull { capacity: usize },
    #[error("pattern '{name}' asks for {requested} history frames, at most {max} are reserved")]
    HistoryTooLarge {
        name: String,
        requested: usize,
        max: usize,
    },
    #[error("pattern '{0}' is already registered")]
    DuplicateName(String),
    #[error("cannot register '{0}' while analysing")]
    Analysing(String),
    #[error("pattern '{name}' has a {len} frame sample, the window only keeps {window}")]
    SampleExceedsWindow {
        name: String,
        len: usize,
        window: usize,
    },
    #[error("recognizer {field} must be at least 1")]
    InvalidConfig { field: &'static str },
}
