//! Visit ledger
//!
//! The single authority on which publications have been claimed. Every
//! transition is one short critical section; no lock is held across an await.

use crate::errors::FailureReason;
use citeforge_common::PublicationId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Per-publication visit state. Transitions only move forward:
/// `Unvisited -> Queued -> InFlight -> {Done, Failed}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VisitState {
    Unvisited,
    Queued,
    InFlight,
    Done,
    Failed { reason: FailureReason },
}

impl VisitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VisitState::Done | VisitState::Failed { .. })
    }
}

/// Counts of ids per state, for reports and logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCounts {
    pub queued: usize,
    pub in_flight: usize,
    pub done: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct VisitLedger {
    states: Mutex<HashMap<PublicationId, VisitState>>,
}

impl VisitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn states(&self) -> MutexGuard<'_, HashMap<PublicationId, VisitState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically move `id` from Unvisited to Queued.
    ///
    /// Returns true for exactly one caller per id over the ledger's lifetime.
    pub fn try_claim(&self, id: &PublicationId) -> bool {
        let mut states = self.states();
        if states.contains_key(id) {
            return false;
        }
        states.insert(id.clone(), VisitState::Queued);
        true
    }

    /// Queued -> InFlight; a no-op from any other state
    pub fn mark_in_flight(&self, id: &PublicationId) -> bool {
        self.transition(id, |s| matches!(s, VisitState::Queued), VisitState::InFlight)
    }

    /// InFlight -> Done; a no-op from any other state
    pub fn mark_done(&self, id: &PublicationId) -> bool {
        self.transition(id, |s| matches!(s, VisitState::InFlight), VisitState::Done)
    }

    /// InFlight -> Failed; a no-op from any other state
    pub fn mark_failed(&self, id: &PublicationId, reason: FailureReason) -> bool {
        self.transition(
            id,
            |s| matches!(s, VisitState::InFlight),
            VisitState::Failed { reason },
        )
    }

    fn transition(
        &self,
        id: &PublicationId,
        allowed_from: impl Fn(&VisitState) -> bool,
        next: VisitState,
    ) -> bool {
        let mut states = self.states();
        match states.get_mut(id) {
            Some(state) if allowed_from(state) => {
                *state = next;
                true
            }
            _ => false,
        }
    }

    pub fn state(&self, id: &PublicationId) -> VisitState {
        self.states()
            .get(id)
            .cloned()
            .unwrap_or(VisitState::Unvisited)
    }

    /// Ids still waiting in `Queued`, sorted for stable reports
    pub fn queued(&self) -> Vec<PublicationId> {
        let mut ids: Vec<_> = self
            .states()
            .iter()
            .filter(|(_, s)| matches!(s, VisitState::Queued))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Every Failed id with its reason
    pub fn failures(&self) -> BTreeMap<PublicationId, FailureReason> {
        self.states()
            .iter()
            .filter_map(|(id, s)| match s {
                VisitState::Failed { reason } => Some((id.clone(), reason.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn counts(&self) -> LedgerCounts {
        let mut counts = LedgerCounts::default();
        for state in self.states().values() {
            match state {
                VisitState::Unvisited => {}
                VisitState::Queued => counts.queued += 1,
                VisitState::InFlight => counts.in_flight += 1,
                VisitState::Done => counts.done += 1,
                VisitState::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }
}
