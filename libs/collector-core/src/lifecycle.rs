//! Provider lifecycle state machine.
//!
//! `Created -> Prepared -> Started -> Notified`, strictly in that order. A module's
//! state only ever moves one step forward; skipping or re-entering a state is rejected.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    Created = 0,
    Prepared = 1,
    Started = 2,
    Notified = 3,
}

impl LifecycleState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LifecycleState::Created,
            1 => LifecycleState::Prepared,
            2 => LifecycleState::Started,
            _ => LifecycleState::Notified,
        }
    }

    /// The only state this one may advance to.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            LifecycleState::Created => Some(LifecycleState::Prepared),
            LifecycleState::Prepared => Some(LifecycleState::Started),
            LifecycleState::Started => Some(LifecycleState::Notified),
            LifecycleState::Notified => None,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::Created => "CREATED",
            LifecycleState::Prepared => "PREPARED",
            LifecycleState::Started => "STARTED",
            LifecycleState::Notified => "NOTIFIED",
        })
    }
}

/// Lock-free lifecycle cell owned by a module.
pub(crate) struct LifecycleCell(AtomicU8);

impl LifecycleCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::Created as u8))
    }

    pub(crate) fn load(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Advance to `to`, which must be the direct successor of the current state.
    ///
    /// Returns the observed state on failure.
    pub(crate) fn advance(&self, to: LifecycleState) -> Result<(), LifecycleState> {
        let from = self.load();
        if from.next() != Some(to) {
            return Err(from);
        }
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(LifecycleState::from_u8)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn advances_in_order() {
        let cell = LifecycleCell::new();
        assert_eq!(cell.load(), LifecycleState::Created);

        cell.advance(LifecycleState::Prepared).unwrap();
        cell.advance(LifecycleState::Started).unwrap();
        cell.advance(LifecycleState::Notified).unwrap();
        assert_eq!(cell.load(), LifecycleState::Notified);
    }

    #[test]
    fn rejects_skipping_a_state() {
        let cell = LifecycleCell::new();
        assert_eq!(
            cell.advance(LifecycleState::Started),
            Err(LifecycleState::Created)
        );
        assert_eq!(cell.load(), LifecycleState::Created);
    }

    #[test]
    fn rejects_reentry() {
        let cell = LifecycleCell::new();
        cell.advance(LifecycleState::Prepared).unwrap();
        assert_eq!(
            cell.advance(LifecycleState::Prepared),
            Err(LifecycleState::Prepared)
        );
    }

    #[test]
    fn notified_is_terminal() {
        assert_eq!(LifecycleState::Notified.next(), None);
        assert!(LifecycleState::Created < LifecycleState::Started);
    }
}
