use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecError};

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Timing and layout parameters shared by both participants of a link.
///
/// Both sides must compile with identical values; the geometry-relevant
/// fields feed the link fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Host tick rate.
    pub tick_hz: u32,
    /// Time a moved contact needs before it registers.
    pub settle_interval: Duration,
    /// Multiplier applied to `settle_interval` when planning probe phases.
    pub settle_margin: u32,
    /// Consecutive ticks a sensed value must persist before it is latched.
    pub stable_ticks: u32,
    /// Ticks without beacon contact before the peer is considered absent.
    pub presence_grace_ticks: u32,
    /// Time without beacon contact before the link is considered down.
    pub liveness_timeout: Duration,
    /// Out-of-range ticks tolerated on a consumed nibble group.
    pub nibble_escape_tolerance: u32,
    /// Largest value count carried in a single slot.
    pub direct_symbol_limit: u32,
    /// Distance between consecutive slot positions.
    pub slot_spacing: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            settle_interval: Duration::from_nanos(16_666_666),
            settle_margin: 2,
            stable_ticks: 2,
            presence_grace_ticks: 6,
            liveness_timeout: Duration::from_secs(10),
            nibble_escape_tolerance: 1,
            direct_symbol_limit: 16,
            slot_spacing: 4,
        }
    }
}

impl LinkConfig {
    /// Whole ticks needed to cover `duration`, rounded up.
    pub fn ticks_for(&self, duration: Duration) -> u64 {
        let scaled = duration.as_nanos() * u128::from(self.tick_hz);
        let ticks = scaled.div_ceil(NANOS_PER_SECOND);
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    /// Ticks a probe waits after moving before it samples.
    pub fn settle_ticks(&self) -> u64 {
        self.ticks_for(self.settle_interval.saturating_mul(self.settle_margin))
    }

    /// Ticks without beacon contact before the link is down.
    pub fn liveness_ticks(&self) -> u64 {
        self.ticks_for(self.liveness_timeout)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| Err(SpecError::InvalidConfig(message.to_string()));

        if self.tick_hz == 0 {
            return invalid("tick_hz must be positive");
        }
        if self.stable_ticks == 0 {
            return invalid("stable_ticks must be positive");
        }
        if self.presence_grace_ticks == 0 {
            return invalid("presence_grace_ticks must be positive");
        }
        if self.slot_spacing == 0 {
            return invalid("slot_spacing must be positive");
        }
        if !(2..=16).contains(&self.direct_symbol_limit) {
            return invalid("direct_symbol_limit must be within [2, 16]");
        }
        if self.liveness_ticks() <= u64::from(self.presence_grace_ticks) {
            return invalid("liveness_timeout must exceed the presence grace period");
        }
        Ok(())
    }
}
