pub mod audio;
pub mod error;
pub mod history;
pub mod library;
pub mod pattern;
pub mod recognizer;
pub mod replay;
pub mod snapshot;
pub mod spectrum;
pub mod window;

// Front end constants
pub const SAMPLE_RATE: u32 = 16000;
pub const FRAME_SIZE: usize = 512; // 32ms at 16kHz
pub const MAX_PEAKS: usize = 3;

// Matching engine capacities
pub const HISTORY_LENGTH: usize = 32; // frames kept live in the window
pub const MAX_PATTERNS: usize = 16;
pub const MAX_HISTORY: usize = 64; // largest per-pattern history accepted

/// Mismatch score of a stage. Lower is better.
pub type Deviation = u8;

/// Sentinel deviation: nothing matched at this position.
pub const NO_MATCH: Deviation = 255;

/// Target frequency that matches any frame.
pub const WILDCARD: u16 = 0;

pub use error::{PatternError, RecognizerError};
pub use library::{Library, LibraryError};
pub use pattern::{Pattern, PatternBuilder, Sample, Stage};
pub use recognizer::{AudioSource, MatchHandler, Recognizer, RecognizerConfig};
pub use snapshot::FrequencySnapshot;
