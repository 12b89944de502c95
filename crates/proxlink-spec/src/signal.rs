use std::fmt;

use serde::{Deserialize, Serialize};

/// Which side of a link a compiled instance plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Transmitter,
    Receiver,
}

impl Role {
    /// The other side of the link.
    pub fn peer(self) -> Self {
        match self {
            Role::Transmitter => Role::Receiver,
            Role::Receiver => Role::Transmitter,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Transmitter => "transmitter",
            Role::Receiver => "receiver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical value carried by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    BoundedInt { min: i32, max: i32 },
}

impl ValueKind {
    /// Inclusive value range. Booleans are carried as 0 and 1.
    pub fn range(&self) -> (i32, i32) {
        match *self {
            ValueKind::Bool => (0, 1),
            ValueKind::BoundedInt { min, max } => (min, max),
        }
    }

    /// Number of distinct values (0 for empty bounds).
    pub fn value_count(&self) -> u64 {
        let (min, max) = self.range();
        if min > max {
            return 0;
        }
        (i64::from(max) - i64::from(min) + 1) as u64
    }

    pub fn contains(&self, value: i32) -> bool {
        let (min, max) = self.range();
        (min..=max).contains(&value)
    }
}

/// Whether the receiving side echoes latched values back to the sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    OneWay,
    TwoWay,
}

/// Output policy applied while no peer is sensed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Keep the last decoded value.
    #[default]
    Hold,
    /// Drive a fixed value.
    Reset(i32),
    /// Mirror a locally available host parameter.
    Forward(String),
}

/// A named value exchanged over a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub kind: ValueKind,
    #[serde(default)]
    pub direction: Direction,
    /// Role that emits the primary value.
    #[serde(default = "default_sender")]
    pub sender: Role,
    #[serde(default)]
    pub fallback: Fallback,
    /// Output before the first value is decoded. Defaults to the range minimum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<i32>,
}

fn default_sender() -> Role {
    Role::Transmitter
}

impl Signal {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            direction: Direction::OneWay,
            sender: Role::Transmitter,
            fallback: Fallback::Hold,
            default: None,
        }
    }

    /// One-way boolean sent by the transmitter.
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Bool)
    }

    /// One-way bounded integer sent by the transmitter.
    pub fn bounded(name: impl Into<String>, min: i32, max: i32) -> Self {
        Self::new(name, ValueKind::BoundedInt { min, max })
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn two_way(self) -> Self {
        self.with_direction(Direction::TwoWay)
    }

    pub fn with_sender(mut self, sender: Role) -> Self {
        self.sender = sender;
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_default(mut self, value: i32) -> Self {
        self.default = Some(value);
        self
    }

    /// Initial output value.
    pub fn default_value(&self) -> i32 {
        self.default.unwrap_or_else(|| self.kind.range().0)
    }

    /// Whether `role` emits this signal's primary value.
    pub fn is_sent_by(&self, role: Role) -> bool {
        self.sender == role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_complementary() {
        assert_eq!(Role::Transmitter.peer(), Role::Receiver);
        assert_eq!(Role::Receiver.peer(), Role::Transmitter);
        assert_eq!(Role::Receiver.to_string(), "receiver");
    }

    #[test]
    fn bool_is_carried_as_zero_and_one() {
        assert_eq!(ValueKind::Bool.range(), (0, 1));
        assert_eq!(ValueKind::Bool.value_count(), 2);
        assert!(!ValueKind::Bool.contains(2));
    }

    #[test]
    fn value_count_spans_full_i32_range() {
        let kind = ValueKind::BoundedInt {
            min: i32::MIN,
            max: i32::MAX,
        };
        assert_eq!(kind.value_count(), 1u64 << 32);
        let empty = ValueKind::BoundedInt { min: 3, max: 2 };
        assert_eq!(empty.value_count(), 0);
    }

    #[test]
    fn default_value_falls_back_to_minimum() {
        assert_eq!(Signal::bounded("slider", 5, 10).default_value(), 5);
        assert_eq!(
            Signal::bounded("slider", 5, 10).with_default(7).default_value(),
            7
        );
        assert_eq!(Signal::bool("grip").default_value(), 0);
    }

    #[test]
    fn signal_json_shape() {
        let signal = Signal::bounded("slider", 0, 255)
            .two_way()
            .with_fallback(Fallback::Reset(12));
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["kind"]["type"], "bounded_int");
        assert_eq!(json["direction"], "two_way");
        assert_eq!(json["sender"], "transmitter");
        assert_eq!(json["fallback"]["reset"], 12);
        assert!(json.get("default").is_none());

        let minimal: Signal =
            serde_json::from_str(r#"{"name":"grip","kind":{"type":"bool"}}"#).unwrap();
        assert_eq!(minimal, Signal::bool("grip"));
    }
}
