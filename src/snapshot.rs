use crate::MAX_PEAKS;

/// Spectral peaks detected in one analysed frame, strongest first.
///
/// Fixed size so the frame window can be filled and compacted without
/// touching the allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrequencySnapshot {
    peaks: [u16; MAX_PEAKS],
    len: u8,
}

impl FrequencySnapshot {
    /// A frame with no detected peaks.
    pub const fn silence() -> Self {
        Self {
            peaks: [0; MAX_PEAKS],
            len: 0,
        }
    }

    /// Build a snapshot from peaks ordered strongest first. Anything past
    /// `MAX_PEAKS` is dropped.
    pub fn from_peaks(peaks: &[u16]) -> Self {
        let mut snapshot = Self::silence();
        for &peak in peaks.iter().take(MAX_PEAKS) {
            snapshot.peaks[snapshot.len as usize] = peak;
            snapshot.len += 1;
        }
        snapshot
    }

    pub fn peaks(&self) -> &[u16] {
        &self.peaks[..self.len as usize]
    }

    pub fn strongest(&self) -> Option<u16> {
        self.peaks().first().copied()
    }

    pub fn is_silent(&self) -> bool {
        self.len == 0
    }

    /// Distance in Hz from `target` to this frame. `None` for silence.
    pub fn distance(&self, target: u16, all_peaks: bool) -> Option<u16> {
        if all_peaks {
            self.peaks().iter().map(|&p| target.abs_diff(p)).min()
        } else {
            self.strongest().map(|p| target.abs_diff(p))
        }
    }
}
