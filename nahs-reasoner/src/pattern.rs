//! Expected action patterns for incoming updates.

use nahs_protocol::{Action, InstanceKey, ReasonerError};

/// The action sequence a reasoner accepts as the next step of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// No update is acceptable in the current state.
    Closed,
    /// Exactly one action with this name.
    Single(&'static str),
    /// Exactly two mutually exclusive actions binding the same parameters,
    /// e.g. `accept` and `reject`. Either may come first.
    Alternatives(&'static str, &'static str),
}

impl Pattern {
    /// Check `actions` (as computed by a diff) against the pattern.
    pub fn check(&self, instance: &InstanceKey, actions: &[Action]) -> Result<(), ReasonerError> {
        let names: Vec<&str> = actions.iter().map(|a| a.name.as_str()).collect();
        let ok = match (*self, names.as_slice()) {
            (Self::Closed, _) => false,
            (Self::Single(expected), [only]) => *only == expected,
            (Self::Alternatives(a, b), [first, second]) => {
                (*first == a && *second == b) || (*first == b && *second == a)
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(ReasonerError::invalid_transition(
                instance,
                format!("expected {self}, got [{}]", names.join(", ")),
            ))
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => f.write_str("no update"),
            Self::Single(name) => write!(f, "[{name}]"),
            Self::Alternatives(a, b) => write!(f, "[{a} | {b}]"),
        }
    }
}
