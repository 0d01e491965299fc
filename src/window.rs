use crate::FrequencySnapshot;

/// Ordered window over the most recent frames.
///
/// Storage holds `2 * capacity` snapshots. Frames are appended at the end and
/// when the storage fills up the newest `capacity` frames are copied to the
/// front, so appends are amortised O(1) and the live frames always stay
/// contiguous and in arrival order.
pub struct FrameWindow {
    frames: Vec<FrequencySnapshot>,
    len: usize,
    capacity: usize,
}

impl FrameWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: vec![FrequencySnapshot::silence(); 2 * capacity],
            len: 0,
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: FrequencySnapshot) {
        self.frames[self.len] = snapshot;
        self.len += 1;

        if self.len == 2 * self.capacity {
            self.frames.copy_within(self.capacity.., 0);
            self.len = self.capacity;
        }
    }

    /// Live frames, oldest first.
    pub fn frames(&self) -> &[FrequencySnapshot] {
        &self.frames[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of frames guaranteed to be live once the window has warmed up.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}
