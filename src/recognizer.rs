use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::RecognizerError;
use crate::window::FrameWindow;
use crate::{FrequencySnapshot, Pattern, HISTORY_LENGTH, MAX_HISTORY, MAX_PATTERNS};

/// Producer of analysed frames. Called once per [`Recognizer::ingest`].
pub trait AudioSource {
    fn pull(&mut self) -> Result<FrequencySnapshot>;
    fn start_recording(&mut self) -> Result<()>;
    fn stop_recording(&mut self) -> Result<()>;
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn pull(&mut self) -> Result<FrequencySnapshot> {
        (**self).pull()
    }

    fn start_recording(&mut self) -> Result<()> {
        (**self).start_recording()
    }

    fn stop_recording(&mut self) -> Result<()> {
        (**self).stop_recording()
    }
}

/// Storage reserved by a [`Recognizer`] up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecognizerConfig {
    /// Frames guaranteed to stay in the window.
    pub window_frames: usize,
    pub max_patterns: usize,
    /// Largest per-pattern history accepted at registration.
    pub max_history: usize,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            window_frames: HISTORY_LENGTH,
            max_patterns: MAX_PATTERNS,
            max_history: MAX_HISTORY,
        }
    }
}

impl RecognizerConfig {
    /// Every capacity must reserve at least one slot.
    pub fn validate(&self) -> Result<(), RecognizerError> {
        let fields = [
            ("window_frames", self.window_frames),
            ("max_patterns", self.max_patterns),
            ("max_history", self.max_history),
        ];
        match fields.iter().find(|(_, value)| *value == 0) {
            Some(&(field, _)) => Err(RecognizerError::InvalidConfig { field }),
            None => Ok(()),
        }
    }
}

/// Called with the pattern name on a detection.
pub type MatchHandler = Box<dyn FnMut(&str)>;

struct Registered {
    name: String,
    pattern: Pattern,
}

/// Drives frame ingestion and dispatches to the registered patterns.
///
/// Patterns are evaluated in registration order and the first one to match
/// wins the frame; the rest are not updated on that tick.
pub struct Recognizer<S> {
    source: S,
    window: FrameWindow,
    patterns: Vec<Registered>,
    config: RecognizerConfig,
    analysing: bool,
    handler: Option<MatchHandler>,
}

impl<S: AudioSource> Recognizer<S> {
    pub fn new(source: S) -> Self {
        Self::build(source, RecognizerConfig::default())
    }

    /// Recogniser with explicit capacities. Zero capacities are rejected.
    pub fn with_config(source: S, config: RecognizerConfig) -> Result<Self, RecognizerError> {
        config.validate()?;
        Ok(Self::build(source, config))
    }

    fn build(source: S, config: RecognizerConfig) -> Self {
        Self {
            source,
            window: FrameWindow::new(config.window_frames),
            patterns: Vec::with_capacity(config.max_patterns),
            config,
            analysing: false,
            handler: None,
        }
    }

    /// Add a pattern. Only allowed while idle.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        mut pattern: Pattern,
    ) -> Result<(), RecognizerError> {
        let name = name.into();

        if self.analysing {
            return Err(RecognizerError::Analysing(name));
        }
        if self.patterns.len() >= self.config.max_patterns {
            return Err(RecognizerError::RegistryFull {
                capacity: self.config.max_patterns,
            });
        }
        if pattern.history().capacity() > self.config.max_history {
            return Err(RecognizerError::HistoryTooLarge {
                name,
                requested: pattern.history().capacity(),
                max: self.config.max_history,
            });
        }
        if self.patterns.iter().any(|p| p.name == name) {
            return Err(RecognizerError::DuplicateName(name));
        }

        let longest = pattern.longest_sample();
        if longest > self.window.capacity() {
            warn!(pattern = %name, longest, "sample longer than the frame window");
            return Err(RecognizerError::SampleExceedsWindow {
                name,
                len: longest,
                window: self.window.capacity(),
            });
        }

        pattern.reset_history();
        info!(pattern = %name, stages = pattern.stages().len(), "registered pattern");
        self.patterns.push(Registered { name, pattern });
        Ok(())
    }

    /// Pull one frame from the source and, while analysing, run every pattern
    /// against the updated window. Returns the name of the pattern that
    /// matched on this frame, if any.
    pub fn ingest(&mut self) -> Result<Option<&str>> {
        let snapshot = self.source.pull()?;

        if !self.analysing {
            return Ok(None);
        }

        self.window.push(snapshot);
        let frames = self.window.frames();

        let mut hit = None;
        for (index, entry) in self.patterns.iter_mut().enumerate() {
            entry.pattern.update(frames);
            if entry.pattern.matched() {
                hit = Some(index);
                break;
            }
        }

        let Some(index) = hit else {
            return Ok(None);
        };

        let name = self.patterns[index].name.as_str();
        debug!(pattern = name, "pattern matched");
        if let Some(handler) = self.handler.as_mut() {
            handler(name);
        }
        Ok(Some(name))
    }

    /// Install `handler` and begin analysing frames.
    pub fn start_analysing(&mut self, handler: impl FnMut(&str) + 'static) -> Result<()> {
        self.set_handler(handler);
        if self.analysing {
            return Ok(());
        }

        self.source.start_recording()?;
        self.analysing = true;
        info!(patterns = self.patterns.len(), "analysis started");
        Ok(())
    }

    /// Stop analysing and forget all partial matches.
    pub fn stop_analysing(&mut self) -> Result<()> {
        self.analysing = false;
        self.window.clear();
        for entry in &mut self.patterns {
            entry.pattern.reset_history();
        }

        info!("analysis stopped");
        self.source.stop_recording()
    }

    pub fn set_handler(&mut self, handler: impl FnMut(&str) + 'static) {
        self.handler = Some(Box::new(handler));
    }

    pub fn is_analysing(&self) -> bool {
        self.analysing
    }

    pub fn window(&self) -> &[FrequencySnapshot] {
        self.window.frames()
    }

    pub fn pattern(&self, name: &str) -> Option<&Pattern> {
        self.patterns
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.pattern)
    }

    pub fn pattern_names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.name.as_str())
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Sample, Stage};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct ScriptedSource {
        frames: VecDeque<FrequencySnapshot>,
        pulls: usize,
        recording: bool,
    }

    impl ScriptedSource {
        fn with(peaks: &[u16]) -> Self {
            Self {
                frames: peaks
                    .iter()
                    .map(|&p| FrequencySnapshot::from_peaks(&[p]))
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl AudioSource for ScriptedSource {
        fn pull(&mut self) -> Result<FrequencySnapshot> {
            self.pulls += 1;
            Ok(self.frames.pop_front().unwrap_or_default())
        }

        fn start_recording(&mut self) -> Result<()> {
            self.recording = true;
            Ok(())
        }

        fn stop_recording(&mut self) -> Result<()> {
            self.recording = false;
            Ok(())
        }
    }

    fn tone(freq: u16) -> Pattern {
        Pattern::builder()
            .history(4)
            .stage(Stage::new(50, 0, vec![Sample::new([freq]).unwrap()]).unwrap())
            .build()
            .unwrap()
    }

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl FnMut(&str) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |name: &str| sink.borrow_mut().push(name.to_string()))
    }

    #[test]
    fn test_idle_still_drains_source() {
        let mut recognizer = Recognizer::new(ScriptedSource::with(&[1000, 1000]));
        recognizer.register("beep", tone(1000)).unwrap();

        assert_eq!(recognizer.ingest().unwrap(), None);
        assert_eq!(recognizer.ingest().unwrap(), None);
        assert_eq!(recognizer.source().pulls, 2);
        assert!(recognizer.window().is_empty());
        assert!(recognizer.pattern("beep").unwrap().history().is_empty());
    }

    #[test]
    fn test_match_invokes_handler() {
        let mut recognizer = Recognizer::new(ScriptedSource::with(&[1200, 1010]));
        recognizer.register("beep", tone(1000)).unwrap();
        let (seen, handler) = recorder();
        recognizer.start_analysing(handler).unwrap();
        assert!(recognizer.source().recording);

        assert_eq!(recognizer.ingest().unwrap(), None);
        assert_eq!(recognizer.ingest().unwrap(), Some("beep"));
        assert_eq!(*seen.borrow(), vec!["beep".to_string()]);
    }

    #[test]
    fn test_first_match_wins() {
        let mut recognizer = Recognizer::new(ScriptedSource::with(&[1000]));
        recognizer.register("first", tone(1000)).unwrap();
        recognizer.register("second", tone(1020)).unwrap();
        let (seen, handler) = recorder();
        recognizer.start_analysing(handler).unwrap();

        assert_eq!(recognizer.ingest().unwrap(), Some("first"));
        assert_eq!(seen.borrow().len(), 1);
        assert!(recognizer.pattern("second").unwrap().history().is_empty());
    }

    #[test]
    fn test_later_pattern_matches_when_earlier_misses() {
        let mut recognizer = Recognizer::new(ScriptedSource::with(&[3000]));
        recognizer.register("low", tone(1000)).unwrap();
        recognizer.register("high", tone(3000)).unwrap();
        recognizer.start_analysing(|_: &str| {}).unwrap();

        assert_eq!(recognizer.ingest().unwrap(), Some("high"));
        assert_eq!(recognizer.pattern("low").unwrap().history().len(), 1);
    }

    #[test]
    fn test_stop_resets_state() {
        let mut recognizer = Recognizer::new(ScriptedSource::with(&[5000, 5000, 1000]));
        recognizer.register("beep", tone(1000)).unwrap();
        recognizer.start_analysing(|_: &str| {}).unwrap();

        recognizer.ingest().unwrap();
        recognizer.ingest().unwrap();
        assert_eq!(recognizer.window().len(), 2);
        assert_eq!(recognizer.pattern("beep").unwrap().history().len(), 2);

        recognizer.stop_analysing().unwrap();
        assert!(!recognizer.is_analysing());
        assert!(!recognizer.source().recording);
        assert!(recognizer.window().is_empty());
        assert!(recognizer.pattern("beep").unwrap().history().is_empty());

        // frames pulled while idle are dropped
        assert_eq!(recognizer.ingest().unwrap(), None);
        assert!(recognizer.window().is_empty());
    }

    #[test]
    fn test_empty_registry_never_matches() {
        let mut recognizer = Recognizer::new(ScriptedSource::with(&[1000, 2000]));
        recognizer.start_analysing(|_: &str| panic!("no patterns")).unwrap();

        assert_eq!(recognizer.ingest().unwrap(), None);
        assert_eq!(recognizer.ingest().unwrap(), None);
        assert_eq!(recognizer.window().len(), 2);
    }

    #[test]
    fn test_window_stays_bounded() {
        let config = RecognizerConfig {
            window_frames: 3,
            ..Default::default()
        };
        let mut recognizer = Recognizer::with_config(ScriptedSource::default(), config).unwrap();
        recognizer.start_analysing(|_: &str| {}).unwrap();

        for _ in 0..20 {
            recognizer.ingest().unwrap();
            assert!(recognizer.window().len() < 6);
        }
        assert!(recognizer.window().len() >= 3);
    }

    #[test]
    fn test_registration_limits() {
        let config = RecognizerConfig {
            window_frames: 8,
            max_patterns: 2,
            max_history: 4,
        };
        let mut recognizer = Recognizer::with_config(ScriptedSource::default(), config).unwrap();
        recognizer.register("a", tone(1000)).unwrap();

        assert_eq!(
            recognizer.register("a", tone(2000)),
            Err(RecognizerError::DuplicateName("a".into()))
        );

        let greedy = Pattern::builder()
            .history(5)
            .stage(Stage::new(50, 0, vec![Sample::new([1000]).unwrap()]).unwrap())
            .build()
            .unwrap();
        assert_eq!(
            recognizer.register("greedy", greedy),
            Err(RecognizerError::HistoryTooLarge {
                name: "greedy".into(),
                requested: 5,
                max: 4,
            })
        );

        recognizer.register("b", tone(2000)).unwrap();
        assert_eq!(
            recognizer.register("c", tone(3000)),
            Err(RecognizerError::RegistryFull { capacity: 2 })
        );
        assert_eq!(recognizer.pattern_names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_sample_longer_than_window_is_rejected() {
        let config = RecognizerConfig {
            window_frames: 2,
            ..Default::default()
        };
        let mut recognizer = Recognizer::with_config(ScriptedSource::default(), config).unwrap();
        let long = Pattern::builder()
            .history(4)
            .stage(Stage::new(50, 0, vec![Sample::new([1000, 1000, 1000]).unwrap()]).unwrap())
            .build()
            .unwrap();

        assert_eq!(
            recognizer.register("long", long),
            Err(RecognizerError::SampleExceedsWindow {
                name: "long".into(),
                len: 3,
                window: 2,
            })
        );
        assert_eq!(recognizer.pattern_names().count(), 0);

        let fits = Pattern::builder()
            .history(4)
            .stage(Stage::new(50, 0, vec![Sample::new([1000, 1000]).unwrap()]).unwrap())
            .build()
            .unwrap();
        recognizer.register("fits", fits).unwrap();
    }

    #[test]
    fn test_zero_capacities_are_rejected() {
        for field in ["window_frames", "max_patterns", "max_history"] {
            let mut config = RecognizerConfig::default();
            match field {
                "window_frames" => config.window_frames = 0,
                "max_patterns" => config.max_patterns = 0,
                _ => config.max_history = 0,
            }
            assert_eq!(
                Recognizer::with_config(ScriptedSource::default(), config).err(),
                Some(RecognizerError::InvalidConfig { field })
            );
        }
    }

    #[test]
    fn test_no_registration_while_analysing() {
        let mut recognizer = Recognizer::new(ScriptedSource::default());
        recognizer.start_analysing(|_: &str| {}).unwrap();

        assert_eq!(
            recognizer.register("late", tone(1000)),
            Err(RecognizerError::Analysing("late".into()))
        );
    }
}
