//! Cleanup for requests whose future is dropped mid-flight.
//!
//! Hooks set in-flight state (a loading phase, a busy flag) before awaiting
//! the transport and clear it afterwards. When the caller drops the future
//! at the await, the second half never runs; `InFlight` runs it instead.

/// Runs `on_abandon` when dropped before `complete` is called.
#[must_use = "dropping the guard immediately runs the abandon hook"]
pub struct InFlight<F: FnOnce()> {
    on_abandon: Option<F>,
}

impl<F: FnOnce()> InFlight<F> {
    pub fn new(on_abandon: F) -> Self {
        Self {
            on_abandon: Some(on_abandon),
        }
    }

    /// The request finished; the caller settles state itself.
    pub fn complete(mut self) {
        self.on_abandon = None;
    }
}

impl<F: FnOnce()> Drop for InFlight<F> {
    fn drop(&mut self) {
        if let Some(on_abandon) = self.on_abandon.take() {
            on_abandon();
        }
    }
}
