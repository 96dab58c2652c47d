//! Optimistic mutation state machine.
//!
//! ```text
//!   Clean ──begin──▶ Pending ──Confirmed/Reconciled──▶ Clean
//!                       └────────Failed──────────────▶ RolledBack
//! ```
//!
//! A mutation captures the pre-mutation snapshot when it begins. Settling a
//! failure restores that snapshot verbatim; it never tries to undo the
//! prediction, so stacked failures cannot double-apply.
//!
//! Hooks keep an `Optimistic<S>` behind a shared lock and drive it through
//! `PendingMutation`, which settles as a failure if it is dropped unsettled
//! (the caller's future was cancelled mid-request).

use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Clean,
    Pending,
    RolledBack,
}

/// How the server answered a pending mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<S> {
    /// Keep the predicted state.
    Confirmed,
    /// Keep the server's version of the state.
    Reconciled(S),
    /// Restore the snapshot.
    Failed,
}

/// Pure transition out of `Pending`.
pub fn settle<S>(snapshot: S, predicted: S, resolution: Resolution<S>) -> (S, Phase) {
    match resolution {
        Resolution::Confirmed => (predicted, Phase::Clean),
        Resolution::Reconciled(server) => (server, Phase::Clean),
        Resolution::Failed => (snapshot, Phase::RolledBack),
    }
}

/// Snapshot and prediction of one in-flight mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket<S> {
    pub snapshot: S,
    pub predicted: S,
}

#[derive(Debug, Clone)]
pub struct Optimistic<S> {
    current: S,
    phase: Phase,
    in_flight: Option<Ticket<S>>,
}

impl<S: Clone> Optimistic<S> {
    pub fn new(initial: S) -> Self {
        Self {
            current: initial,
            phase: Phase::Clean,
            in_flight: None,
        }
    }

    pub fn current(&self) -> &S {
        &self.current
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Apply `predict` to the current state immediately. Returns `None`
    /// without touching state when a mutation is already in flight.
    pub fn begin(&mut self, predict: impl FnOnce(&S) -> S) -> Option<Ticket<S>> {
        if self.in_flight.is_some() {
            return None;
        }
        let ticket = Ticket {
            snapshot: self.current.clone(),
            predicted: predict(&self.current),
        };
        self.current = ticket.predicted.clone();
        self.phase = Phase::Pending;
        self.in_flight = Some(ticket.clone());
        Some(ticket)
    }

    /// Resolve the in-flight mutation. A no-op when nothing is in flight.
    pub fn resolve(&mut self, resolution: Resolution<S>) -> &S {
        if let Some(ticket) = self.in_flight.take() {
            let (next, phase) = settle(ticket.snapshot, ticket.predicted, resolution);
            self.current = next;
            self.phase = phase;
        }
        &self.current
    }

    /// Replace state outright, e.g. after a fresh fetch. Ignored while a
    /// mutation is in flight.
    pub fn reset(&mut self, state: S) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        self.current = state;
        self.phase = Phase::Clean;
        true
    }
}

/// What a user-triggered optimistic toggle ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome<S> {
    /// A guard refused the toggle; nothing changed and no request was sent.
    Skipped,
    /// The server accepted the change.
    Confirmed(S),
    /// The request failed and state was restored to the snapshot.
    Reverted { state: S, error: String },
}

/// Handle for a mutation begun on shared state.
///
/// Must be finished with `resolve`; dropping it unresolved restores the
/// snapshot.
pub struct PendingMutation<S: Clone> {
    cell: Arc<Mutex<Optimistic<S>>>,
    ticket: Ticket<S>,
    done: bool,
}

impl<S: Clone> PendingMutation<S> {
    pub fn begin(cell: &Arc<Mutex<Optimistic<S>>>, predict: impl FnOnce(&S) -> S) -> Option<Self> {
        let ticket = cell.lock().begin(predict)?;
        Some(Self {
            cell: Arc::clone(cell),
            ticket,
            done: false,
        })
    }

    pub fn ticket(&self) -> &Ticket<S> {
        &self.ticket
    }

    pub fn resolve(mut self, resolution: Resolution<S>) -> S {
        self.done = true;
        let settled = self.cell.lock().resolve(resolution).clone();
        settled
    }
}

impl<S: Clone> Drop for PendingMutation<S> {
    fn drop(&mut self) {
        if !self.done {
            self.cell.lock().resolve(Resolution::Failed);
        }
    }
}
