//! The tri-state signal domain.
//!
//! Every node and wire in the engine carries a [`LogicValue`]. `Unknown`
//! models high-impedance / indeterminate state and propagates like a genuine
//! value, never as an absence.

use serde::{Deserialize, Serialize};

/// A tri-state logic value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicValue {
    /// Logic high
    True,
    /// Logic low
    False,
    /// High-impedance / indeterminate
    #[default]
    Unknown,
}

impl LogicValue {
    /// Logical inversion. `Unknown` stays `Unknown`.
    pub fn invert(self) -> Self {
        match self {
            LogicValue::True => LogicValue::False,
            LogicValue::False => LogicValue::True,
            LogicValue::Unknown => LogicValue::Unknown,
        }
    }

    /// Returns true if this value is definite (not `Unknown`).
    pub fn is_definite(self) -> bool {
        !matches!(self, LogicValue::Unknown)
    }

    /// Builds a value from a boolean.
    pub fn from_bool(high: bool) -> Self {
        if high {
            LogicValue::True
        } else {
            LogicValue::False
        }
    }
}

impl std::fmt::Display for LogicValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogicValue::True => "1",
            LogicValue::False => "0",
            LogicValue::Unknown => "x",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invert() {
        assert_eq!(LogicValue::True.invert(), LogicValue::False);
        assert_eq!(LogicValue::False.invert(), LogicValue::True);
        assert_eq!(LogicValue::Unknown.invert(), LogicValue::Unknown);
    }

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(LogicValue::default(), LogicValue::Unknown);
    }

    #[test]
    fn test_definite() {
        assert!(LogicValue::True.is_definite());
        assert!(LogicValue::False.is_definite());
        assert!(!LogicValue::Unknown.is_definite());
    }

    #[test]
    fn test_from_bool() {
        assert_eq!(LogicValue::from_bool(true), LogicValue::True);
        assert_eq!(LogicValue::from_bool(false), LogicValue::False);
    }

    #[test]
    fn test_display() {
        assert_eq!(LogicValue::True.to_string(), "1");
        assert_eq!(LogicValue::False.to_string(), "0");
        assert_eq!(LogicValue::Unknown.to_string(), "x");
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&LogicValue::Unknown).unwrap();
        let back: LogicValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, LogicValue::Unknown);
    }
}
