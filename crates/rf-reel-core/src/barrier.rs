//! Settled-count barrier across reels

/// Result of recording a settle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    /// Still waiting on other reels
    Pending { settled: usize },
    /// Every reel has settled; the barrier has reset itself
    Complete,
    /// Reel already counted this round (or out of range); ignored
    Ignored,
}

/// Fires once per round, when every reel has settled exactly once
#[derive(Debug, Clone)]
pub struct SettleBarrier {
    settled: Vec<bool>,
    count: usize,
}

impl SettleBarrier {
    pub fn new(reel_count: usize) -> Self {
        Self {
            settled: vec![false; reel_count],
            count: 0,
        }
    }

    pub fn reel_count(&self) -> usize {
        self.settled.len()
    }

    /// Reels settled so far this round
    pub fn settled_count(&self) -> usize {
        self.count
    }

    pub fn is_settled(&self, reel: usize) -> bool {
        self.settled.get(reel).copied().unwrap_or(false)
    }

    /// Count a reel's settle
    pub fn record(&mut self, reel: usize) -> BarrierState {
        match self.settled.get_mut(reel) {
            Some(seen) if !*seen => *seen = true,
            Some(_) => {
                log::warn!("Reel {} settled twice in one round; ignored", reel);
                return BarrierState::Ignored;
            }
            None => {
                log::warn!("Settle from unknown reel {}; ignored", reel);
                return BarrierState::Ignored;
            }
        }

        self.count += 1;
        if self.count == self.settled.len() {
            self.reset();
            BarrierState::Complete
        } else {
            BarrierState::Pending {
                settled: self.count,
            }
        }
    }

    /// Forget every settle recorded this round
    pub fn reset(&mut self) {
        self.settled.fill(false);
        self.count = 0;
    }
}
