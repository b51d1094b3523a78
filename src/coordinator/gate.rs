//! Exactly-once confirm/discard for staged captures.
//!
//! Each staged capture is either `Staged` or `Resolved`. The first of
//! confirm/discard wins under the lock; everything after is a no-op.
//! Entries live in memory until the process exits.

use parking_lot::Mutex;
use std::collections::HashMap;

use super::Capture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Discard,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Discard => "discard",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "confirm" => Some(Self::Confirm),
            "discard" => Some(Self::Discard),
            _ => None,
        }
    }
}

/// Result of a resolve attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// This call won with `Confirm`; the caller must persist the capture.
    Confirmed(Capture),
    /// This call won with `Discard`.
    Discarded(Capture),
    /// Someone else already resolved it.
    AlreadyResolved(Decision),
    Unknown,
}

enum GateState {
    Staged(Capture),
    Resolved(Decision),
}

#[derive(Default)]
pub struct ConfirmationGate {
    entries: Mutex<HashMap<String, GateState>>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a capture and return its id.
    pub fn stage(&self, capture: Capture) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.entries
            .lock()
            .insert(id.clone(), GateState::Staged(capture));
        id
    }

    /// Atomically move `id` from `Staged` to `Resolved`.
    pub fn resolve(&self, id: &str, decision: Decision) -> Resolution {
        let mut entries = self.entries.lock();
        let Some(state) = entries.get_mut(id) else {
            return Resolution::Unknown;
        };

        match std::mem::replace(state, GateState::Resolved(decision)) {
            GateState::Staged(capture) => match decision {
                Decision::Confirm => Resolution::Confirmed(capture),
                Decision::Discard => Resolution::Discarded(capture),
            },
            GateState::Resolved(first) => {
                *state = GateState::Resolved(first);
                Resolution::AlreadyResolved(first)
            }
        }
    }

    /// `Some(true)` once resolved, `None` for unknown ids.
    pub fn is_resolved(&self, id: &str) -> Option<bool> {
        self.entries
            .lock()
            .get(id)
            .map(|state| matches!(state, GateState::Resolved(_)))
    }

    pub fn staged_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|s| matches!(s, GateState::Staged(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CaptureBody;
    use std::sync::Arc;

    fn capture() -> Capture {
        Capture {
            title: "Compras".into(),
            body: CaptureBody::List(vec!["leche".into()]),
        }
    }

    #[test]
    fn confirm_then_anything_is_noop() {
        let gate = ConfirmationGate::new();
        let id = gate.stage(capture());
        assert_eq!(gate.is_resolved(&id), Some(false));

        assert_eq!(gate.resolve(&id, Decision::Confirm), Resolution::Confirmed(capture()));
        assert_eq!(
            gate.resolve(&id, Decision::Confirm),
            Resolution::AlreadyResolved(Decision::Confirm)
        );
        assert_eq!(
            gate.resolve(&id, Decision::Discard),
            Resolution::AlreadyResolved(Decision::Confirm)
        );
        assert_eq!(gate.is_resolved(&id), Some(true));
    }

    #[test]
    fn discard_is_final() {
        let gate = ConfirmationGate::new();
        let id = gate.stage(capture());
        assert_eq!(gate.resolve(&id, Decision::Discard), Resolution::Discarded(capture()));
        assert_eq!(
            gate.resolve(&id, Decision::Confirm),
            Resolution::AlreadyResolved(Decision::Discard)
        );
    }

    #[test]
    fn unknown_id() {
        let gate = ConfirmationGate::new();
        assert_eq!(gate.resolve("nope", Decision::Confirm), Resolution::Unknown);
        assert_eq!(gate.is_resolved("nope"), None);
    }

    #[test]
    fn staged_count_tracks_open_entries() {
        let gate = ConfirmationGate::new();
        let a = gate.stage(capture());
        gate.stage(capture());
        assert_eq!(gate.staged_count(), 2);
        gate.resolve(&a, Decision::Discard);
        assert_eq!(gate.staged_count(), 1);
    }

    #[test]
    fn decision_round_trips_through_str() {
        for d in [Decision::Confirm, Decision::Discard] {
            assert_eq!(Decision::parse(d.as_str()), Some(d));
        }
        assert_eq!(Decision::parse("maybe"), None);
    }

    #[test]
    fn racing_resolvers_have_exactly_one_winner() {
        let gate = Arc::new(ConfirmationGate::new());
        let id = gate.stage(capture());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let gate = Arc::clone(&gate);
                let id = id.clone();
                std::thread::spawn(move || {
                    let decision = if i % 2 == 0 {
                        Decision::Confirm
                    } else {
                        Decision::Discard
                    };
                    gate.resolve(&id, decision)
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| matches!(r, Resolution::Confirmed(_) | Resolution::Discarded(_)))
            .count();
        assert_eq!(winners, 1);
    }
}
