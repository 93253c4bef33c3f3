//! Timing profiles for the reel choreography

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Timing profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingProfile {
    /// Normal gameplay timing
    Normal,
    /// Fast/Turbo mode
    Turbo,
    /// No stagger or presentation delays (headless runs, tests)
    Instant,
    /// Scaled or hand-edited timing
    Custom,
}

impl Default for TimingProfile {
    fn default() -> Self {
        Self::Normal
    }
}

/// When each reel is told to stop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopPolicy {
    /// Reel i stops at `spin_duration + i * start_stagger`
    PerReelOffset,
    /// Every reel is spinning by `spin_duration + (n-1) * start_stagger`;
    /// reel i stops `i * stop_stagger_ms` after that instant
    CommonInstant { stop_stagger_ms: f64 },
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self::CommonInstant {
            stop_stagger_ms: 400.0,
        }
    }
}

/// Choreography and reel motion constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Profile type
    pub profile: TimingProfile,

    /// Delay between consecutive reel starts (ms)
    pub start_stagger_ms: f64,

    /// Time spent spinning before stop commands begin (ms)
    pub spin_duration_ms: f64,

    /// Stop scheduling policy
    pub stop_policy: StopPolicy,

    /// Delay between the last settle and win reveal (ms)
    pub check_win_delay_ms: f64,

    /// Duration of one symbol highlight pulse (ms)
    pub highlight_ms: f64,

    /// Gap between consecutive win-line highlights (ms)
    pub line_gap_ms: f64,

    /// Delay before the next free round starts automatically (ms)
    pub auto_spin_delay_ms: f64,

    /// Time to reach full speed (ms, 0 = immediate)
    pub accelerate_ms: f64,

    /// Full spinning speed (symbols per second)
    pub spin_speed: f64,

    /// Speed factor applied per 60 Hz frame while decelerating
    pub slowdown_per_frame: f64,

    /// Speed floor while decelerating/settling (symbols per second)
    pub settle_speed: f64,

    /// Extra symbols scrolled past beyond one reel-height after a stop command
    pub stop_lead_symbols: u32,
}

impl TimingConfig {
    /// Normal gameplay timing
    pub fn normal() -> Self {
        Self {
            profile: TimingProfile::Normal,
            start_stagger_ms: 300.0,
            spin_duration_ms: 500.0,
            stop_policy: StopPolicy::CommonInstant {
                stop_stagger_ms: 400.0,
            },
            check_win_delay_ms: 500.0,
            highlight_ms: 1000.0,
            line_gap_ms: 100.0,
            auto_spin_delay_ms: 500.0,
            accelerate_ms: 100.0,
            spin_speed: 20.0,
            slowdown_per_frame: 0.95,
            settle_speed: 2.0,
            stop_lead_symbols: 2,
        }
    }

    /// Turbo mode
    pub fn turbo() -> Self {
        Self {
            profile: TimingProfile::Turbo,
            start_stagger_ms: 100.0,
            spin_duration_ms: 250.0,
            stop_policy: StopPolicy::CommonInstant {
                stop_stagger_ms: 150.0,
            },
            check_win_delay_ms: 200.0,
            highlight_ms: 400.0,
            line_gap_ms: 50.0,
            auto_spin_delay_ms: 200.0,
            accelerate_ms: 50.0,
            spin_speed: 30.0,
            slowdown_per_frame: 0.9,
            settle_speed: 4.0,
            stop_lead_symbols: 1,
        }
    }

    /// Headless: reels still run their state machines, presentation waits are zero
    pub fn instant() -> Self {
        Self {
            profile: TimingProfile::Instant,
            start_stagger_ms: 0.0,
            spin_duration_ms: 0.0,
            stop_policy: StopPolicy::PerReelOffset,
            check_win_delay_ms: 0.0,
            highlight_ms: 0.0,
            line_gap_ms: 0.0,
            auto_spin_delay_ms: 0.0,
            accelerate_ms: 0.0,
            spin_speed: 1000.0,
            slowdown_per_frame: 0.5,
            settle_speed: 1000.0,
            stop_lead_symbols: 0,
        }
    }

    /// Get config for profile
    pub fn from_profile(profile: TimingProfile) -> Self {
        match profile {
            TimingProfile::Normal => Self::normal(),
            TimingProfile::Turbo => Self::turbo(),
            TimingProfile::Instant => Self::instant(),
            TimingProfile::Custom => Self::normal(),
        }
    }

    /// Scale durations by factor (< 1.0 = faster); speeds scale inversely
    pub fn scaled(&self, factor: f64) -> Self {
        let stop_policy = match self.stop_policy {
            StopPolicy::PerReelOffset => StopPolicy::PerReelOffset,
            StopPolicy::CommonInstant { stop_stagger_ms } => StopPolicy::CommonInstant {
                stop_stagger_ms: stop_stagger_ms * factor,
            },
        };
        Self {
            profile: TimingProfile::Custom,
            start_stagger_ms: self.start_stagger_ms * factor,
            spin_duration_ms: self.spin_duration_ms * factor,
            stop_policy,
            check_win_delay_ms: self.check_win_delay_ms * factor,
            highlight_ms: self.highlight_ms * factor,
            line_gap_ms: self.line_gap_ms * factor,
            auto_spin_delay_ms: self.auto_spin_delay_ms * factor,
            accelerate_ms: self.accelerate_ms * factor,
            spin_speed: self.spin_speed / factor,
            slowdown_per_frame: self.slowdown_per_frame,
            settle_speed: self.settle_speed / factor,
            stop_lead_symbols: self.stop_lead_symbols,
        }
    }

    /// Time (from spin request) at which reel `reel_index` starts
    pub fn start_delay(&self, reel_index: usize) -> f64 {
        reel_index as f64 * self.start_stagger_ms
    }

    /// Time (from spin request) at which reel `reel_index` is told to stop
    pub fn stop_delay(&self, reel_index: usize, reel_count: usize) -> f64 {
        match self.stop_policy {
            StopPolicy::PerReelOffset => {
                self.spin_duration_ms + reel_index as f64 * self.start_stagger_ms
            }
            StopPolicy::CommonInstant { stop_stagger_ms } => {
                let all_spinning = reel_count.saturating_sub(1) as f64 * self.start_stagger_ms;
                self.spin_duration_ms + all_spinning + reel_index as f64 * stop_stagger_ms
            }
        }
    }

    /// Check the constants
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            self.start_stagger_ms,
            self.spin_duration_ms,
            self.check_win_delay_ms,
            self.highlight_ms,
            self.line_gap_ms,
            self.auto_spin_delay_ms,
            self.accelerate_ms,
        ];
        if durations.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(ConfigError::InvalidTiming("durations must be finite and >= 0"));
        }
        if let StopPolicy::CommonInstant { stop_stagger_ms } = self.stop_policy {
            if !stop_stagger_ms.is_finite() || stop_stagger_ms < 0.0 {
                return Err(ConfigError::InvalidTiming("stop stagger must be finite and >= 0"));
            }
        }
        if !(self.spin_speed.is_finite() && self.spin_speed > 0.0) {
            return Err(ConfigError::InvalidTiming("spin speed must be positive"));
        }
        if !(self.settle_speed.is_finite() && self.settle_speed > 0.0) {
            return Err(ConfigError::InvalidTiming("settle speed must be positive"));
        }
        if !(self.slowdown_per_frame > 0.0 && self.slowdown_per_frame <= 1.0) {
            return Err(ConfigError::InvalidTiming("slowdown must be in (0, 1]"));
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::normal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_profiles() {
        let normal = TimingConfig::normal();
        let turbo = TimingConfig::turbo();

        assert!(turbo.spin_duration_ms < normal.spin_duration_ms);
        assert!(turbo.start_stagger_ms < normal.start_stagger_ms);
        assert!(normal.validate().is_ok());
        assert!(turbo.validate().is_ok());
        assert!(TimingConfig::instant().validate().is_ok());
    }

    #[test]
    fn test_common_instant_stop_schedule() {
        let timing = TimingConfig::normal();
        // 500 + 3 * 300 = 1400, then 400 ms apart
        assert_eq!(timing.stop_delay(0, 4), 1400.0);
        assert_eq!(timing.stop_delay(3, 4), 2600.0);
        assert_eq!(timing.start_delay(2), 600.0);
    }

    #[test]
    fn test_per_reel_stop_schedule_is_monotonic() {
        let timing = TimingConfig {
            stop_policy: StopPolicy::PerReelOffset,
            ..TimingConfig::normal()
        };
        let stops: Vec<f64> = (0..4).map(|i| timing.stop_delay(i, 4)).collect();
        assert_eq!(stops, vec![500.0, 800.0, 1100.0, 1400.0]);
        for i in 0..4 {
            assert!(timing.stop_delay(i, 4) > timing.start_delay(i));
        }
    }

    #[test]
    fn test_scaled() {
        let half = TimingConfig::normal().scaled(0.5);
        assert_eq!(half.profile, TimingProfile::Custom);
        assert_eq!(half.spin_duration_ms, 250.0);
        assert_eq!(half.spin_speed, 40.0);
        assert_eq!(
            half.stop_policy,
            StopPolicy::CommonInstant {
                stop_stagger_ms: 200.0
            }
        );
    }

    #[test]
    fn test_validate_rejects_stalled_reels() {
        let timing = TimingConfig {
            settle_speed: 0.0,
            ..TimingConfig::normal()
        };
        assert!(matches!(timing.validate(), Err(ConfigError::InvalidTiming(_))));
    }
}
