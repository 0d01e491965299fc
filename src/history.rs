use crate::{Deviation, NO_MATCH};

/// Rolling record of per-stage deviations, one row per tick.
///
/// Compacts the same way as [`crate::window::FrameWindow`]: rows accumulate up
/// to `2 * capacity`, then the newest `capacity` rows move to the front.
#[derive(Debug)]
pub struct MatchHistory {
    rows: Vec<Deviation>,
    stages: usize,
    len: usize,
    capacity: usize,
}

impl MatchHistory {
    pub fn new(stages: usize, capacity: usize) -> Self {
        Self {
            rows: vec![NO_MATCH; 2 * capacity * stages],
            stages,
            len: 0,
            capacity,
        }
    }

    /// Deviation of `stage` recorded `frames_ago` committed rows back
    /// (1 = latest). `NO_MATCH` when the history is too short.
    pub fn deviation(&self, frames_ago: usize, stage: usize) -> Deviation {
        if frames_ago == 0 || self.len < frames_ago {
            return NO_MATCH;
        }
        self.rows[(self.len - frames_ago) * self.stages + stage]
    }

    /// Write `stage`'s score into the pending row.
    pub fn record(&mut self, stage: usize, value: Deviation) {
        self.rows[self.len * self.stages + stage] = value;
    }

    /// Commit the pending row.
    pub fn end_row(&mut self) {
        self.len += 1;

        if self.len == 2 * self.capacity {
            let keep = self.capacity * self.stages;
            self.rows.copy_within(keep.., 0);
            self.len = self.capacity;
        }
    }

    #[cfg(test)]
    fn row(&self, frames_ago: usize) -> Option<&[Deviation]> {
        if frames_ago == 0 || self.len < frames_ago {
            return None;
        }
        let start = (self.len - frames_ago) * self.stages;
        Some(&self.rows[start..start + self.stages])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reset(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_row(history: &mut MatchHistory, tick: usize) {
        history.record(0, tick as Deviation);
        history.record(1, (tick + 100) as Deviation);
        history.end_row();
    }

    #[test]
    fn test_keeps_most_recent_rows() {
        for capacity in 1..5 {
            let mut history = MatchHistory::new(2, capacity);
            for n in 0..30 {
                let expected = n.min(capacity);
                assert!(history.len() >= expected);
                assert!(history.len() < 2 * capacity);

                for frames_ago in 1..=expected {
                    let tick = n - frames_ago;
                    assert_eq!(history.row(frames_ago), Some(&[tick as u8, tick as u8 + 100][..]));
                }

                push_row(&mut history, n);
            }
        }
    }

    #[test]
    fn test_too_short_is_no_match() {
        let mut history = MatchHistory::new(2, 4);
        assert_eq!(history.deviation(1, 0), NO_MATCH);

        push_row(&mut history, 7);
        assert_eq!(history.deviation(1, 0), 7);
        assert_eq!(history.deviation(1, 1), 107);
        assert_eq!(history.deviation(2, 0), NO_MATCH);
        assert_eq!(history.deviation(0, 0), NO_MATCH);
    }

    #[test]
    fn test_pending_row_is_not_visible() {
        let mut history = MatchHistory::new(1, 4);
        history.record(0, 3);
        assert!(history.is_empty());
        assert_eq!(history.deviation(1, 0), NO_MATCH);
        history.end_row();
        assert_eq!(history.deviation(1, 0), 3);
    }

    #[test]
    fn test_reset_keeps_storage() {
        let mut history = MatchHistory::new(3, 2);
        push_row_all(&mut history);
        history.reset();
        assert!(history.is_empty());
        assert!(history.row(1).is_none());
        assert_eq!(history.capacity(), 2);
    }

    fn push_row_all(history: &mut MatchHistory) {
        for stage in 0..3 {
            history.record(stage, 1);
        }
        history.end_row();
    }
}
