use proxlink_spec::LinkConfig;

/// Tracks peer beacon contact over time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    last_contact: Option<u64>,
    grace_ticks: u64,
    liveness_ticks: u64,
}

impl Presence {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            last_contact: None,
            grace_ticks: u64::from(config.presence_grace_ticks),
            liveness_ticks: config.liveness_ticks(),
        }
    }

    /// Record the beacon sample of `tick`.
    pub fn observe(&mut self, tick: u64, contact: bool) {
        if contact {
            self.last_contact = Some(tick);
        }
    }

    /// Ticks since the last beacon contact, `None` if never seen.
    pub fn beacon_age(&self, tick: u64) -> Option<u64> {
        self.last_contact.map(|last| tick.saturating_sub(last))
    }

    /// Beacon contact within the presence grace window.
    pub fn peer_present(&self, tick: u64) -> bool {
        self.beacon_age(tick).is_some_and(|age| age < self.grace_ticks)
    }

    /// No beacon contact for the whole liveness timeout, or never.
    pub fn link_down(&self, tick: u64) -> bool {
        self.beacon_age(tick)
            .is_none_or(|age| age >= self.liveness_ticks)
    }
}
