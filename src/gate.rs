//! Update-mode gate
//!
//! Closed while the board is flashing firmware; the delivery cycle does not
//! drain the queue until the next successful connect reopens it.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateGate {
    engaged: bool,
    progress: Option<u32>,
}

impl UpdateGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record update progress. Returns true if this engaged the gate.
    pub fn engage(&mut self, progress: u32) -> bool {
        let newly = !self.engaged;
        self.engaged = true;
        self.progress = Some(progress);
        newly
    }

    pub fn clear(&mut self) {
        self.engaged = false;
        self.progress = None;
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Last reported progress, 0-100
    pub fn progress(&self) -> Option<u32> {
        self.progress
    }
}
