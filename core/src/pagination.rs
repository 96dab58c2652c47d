//! Offset-cursor pagination shared by the post and notification feeds.
//!
//! ```text
//!   Idle ──▶ LoadingInitial ──▶ Ready ──▶ LoadingMore ──▶ Ready
//!                 │                            │
//!                 └──────────▶ Error ◀─────────┘
//! ```
//!
//! The cursor counts server items consumed, not items kept after
//! filtering, and only moves when a fetch succeeds. Every fetch carries a
//! generation token; a reset fetch supersedes a load-more still in flight.
//! A fetch whose future is dropped is abandoned, which puts the phase back
//! where it was so a later load-more is not refused forever.

use crate::generation::{Generation, Token};
use crate::types::{Identified, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    Idle,
    LoadingInitial,
    LoadingMore,
    Ready,
    Error,
}

impl LoadPhase {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadPhase::LoadingInitial | LoadPhase::LoadingMore)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub offset: usize,
    pub total: usize,
    pub has_more: bool,
}

impl Cursor {
    /// Record a successful fetch of `returned` items starting at `start`.
    pub fn advance(&mut self, start: usize, returned: usize, total: usize) {
        self.offset = start + returned;
        self.total = total;
        if returned == 0 && start < total {
            tracing::warn!(offset = start, total, "server returned an empty page short of its reported total");
        }
        self.has_more = self.offset < total;
    }
}

/// Ordered items with unique ids.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Identified> Collection<T> {
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn replace(&mut self, items: Vec<T>) {
        self.items.clear();
        self.append(items);
    }

    /// Append, skipping ids already present. Returns how many were added.
    pub fn append(&mut self, items: Vec<T>) -> usize {
        let before = self.items.len();
        for item in items {
            if !self.contains(item.id()) {
                self.items.push(item);
            }
        }
        self.items.len() - before
    }

    /// Insert at the front, replacing any item with the same id.
    pub fn prepend(&mut self, item: T) {
        self.items.retain(|existing| existing.id() != item.id());
        self.items.insert(0, item);
    }

    pub fn update(&mut self, id: &str, f: impl FnOnce(&mut T)) -> bool {
        match self.items.iter_mut().find(|item| item.id() == id) {
            Some(item) => {
                f(item);
                true
            }
            None => false,
        }
    }

    pub fn update_all(&mut self, mut f: impl FnMut(&mut T)) {
        self.items.iter_mut().for_each(|item| f(item));
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id() != id);
        self.items.len() != before
    }
}

/// What a fetch was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub offset: usize,
    pub limit: usize,
    pub reset: bool,
    prior: LoadPhase,
    token: Token,
}

/// Snapshot of a paginated collection for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub has_more: bool,
    pub phase: LoadPhase,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct Paginated<T> {
    items: Collection<T>,
    cursor: Cursor,
    phase: LoadPhase,
    error: Option<String>,
    page_size: usize,
    generation: Generation,
}

impl<T: Identified + Clone> Paginated<T> {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Collection::default(),
            cursor: Cursor::default(),
            phase: LoadPhase::Idle,
            error: None,
            page_size: page_size.max(1),
            generation: Generation::new(),
        }
    }

    pub fn items(&self) -> &Collection<T> {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Collection<T> {
        &mut self.items
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn view(&self) -> PageView<T> {
        PageView {
            items: self.items.as_slice().to_vec(),
            total: self.cursor.total,
            has_more: self.cursor.has_more,
            phase: self.phase,
            loading: self.phase.is_loading(),
            error: self.error.clone(),
        }
    }

    /// Start a fetch. A reset fetch starts at offset zero and will replace
    /// the collection; otherwise it continues from the cursor.
    pub fn begin_fetch(&mut self, reset: bool) -> FetchTicket {
        let offset = if reset { 0 } else { self.cursor.offset };
        let prior = self.settled_phase();
        self.phase = if reset || self.items.is_empty() {
            LoadPhase::LoadingInitial
        } else {
            LoadPhase::LoadingMore
        };
        self.error = None;
        FetchTicket {
            offset,
            limit: self.page_size,
            reset,
            prior,
            token: self.generation.next(),
        }
    }

    /// `None` while a fetch is running or when there is nothing more to load.
    pub fn begin_load_more(&mut self) -> Option<FetchTicket> {
        if self.phase.is_loading() || !self.cursor.has_more {
            return None;
        }
        Some(self.begin_fetch(false))
    }

    /// Give up on a fetch that will never finish. The phase returns to what
    /// it was before the fetch unless a newer fetch has since taken over.
    pub fn abandon(&mut self, ticket: FetchTicket) -> bool {
        if !self.generation.is_current(ticket.token) {
            return false;
        }
        self.generation.invalidate();
        self.phase = ticket.prior;
        true
    }

    /// The phase to fall back to; never a loading phase.
    fn settled_phase(&self) -> LoadPhase {
        match self.phase {
            LoadPhase::LoadingInitial | LoadPhase::LoadingMore if self.items.is_empty() => LoadPhase::Idle,
            LoadPhase::LoadingInitial | LoadPhase::LoadingMore => LoadPhase::Ready,
            settled => settled,
        }
    }

    /// Apply a fetch result, keeping only items for which `keep` holds.
    /// Returns false when the ticket was superseded and the result dropped.
    pub fn finish_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Page<T>, String>,
        keep: impl Fn(&T) -> bool,
    ) -> bool {
        if !self.generation.is_current(ticket.token) {
            return false;
        }
        match result {
            Ok(page) => {
                let returned = page.items.len();
                let kept: Vec<T> = page.items.into_iter().filter(|item| keep(item)).collect();
                if ticket.reset {
                    self.items.replace(kept);
                } else {
                    self.items.append(kept);
                }
                self.cursor.advance(ticket.offset, returned, page.total);
                self.phase = LoadPhase::Ready;
            }
            Err(message) => {
                self.error = Some(message);
                self.phase = LoadPhase::Error;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item(String);

    impl Identified for Item {
        fn id(&self) -> &str {
            &self.0
        }
    }

    fn items(ids: &[&str]) -> Vec<Item> {
        ids.iter().map(|id| Item(id.to_string())).collect()
    }

    fn page(ids: &[&str], total: usize) -> Result<Page<Item>, String> {
        Ok(Page { items: items(ids), total })
    }

    #[test]
    fn first_fetch_then_more() {
        let mut state = Paginated::new(2);
        let ticket = state.begin_fetch(true);
        assert_eq!(state.phase(), LoadPhase::LoadingInitial);
        assert!(state.finish_fetch(ticket, page(&["a", "b"], 3), |_| true));
        assert!(state.cursor().has_more);
        assert_eq!(state.phase(), LoadPhase::Ready);

        let ticket = state.begin_load_more().unwrap();
        assert_eq!(ticket.offset, 2);
        assert_eq!(state.phase(), LoadPhase::LoadingMore);
        state.finish_fetch(ticket, page(&["c"], 3), |_| true);
        assert_eq!(state.items().len(), 3);
        assert!(!state.cursor().has_more);
        assert!(state.begin_load_more().is_none());
    }

    #[test]
    fn load_more_is_refused_while_loading() {
        let mut state = Paginated::new(2);
        let ticket = state.begin_fetch(true);
        state.finish_fetch(ticket, page(&["a", "b"], 10), |_| true);
        assert!(state.cursor().has_more);

        let _refresh = state.begin_fetch(true);
        assert!(state.begin_load_more().is_none());
    }

    #[test]
    fn failed_fetch_keeps_cursor() {
        let mut state = Paginated::new(2);
        let ticket = state.begin_fetch(true);
        state.finish_fetch(ticket, page(&["a", "b"], 10), |_| true);
        let before = state.cursor();

        let ticket = state.begin_load_more().unwrap();
        state.finish_fetch(ticket, Err("boom".to_string()), |_| true);
        assert_eq!(state.cursor(), before);
        assert_eq!(state.phase(), LoadPhase::Error);
        assert_eq!(state.error(), Some("boom"));
        assert_eq!(state.items().len(), 2);
    }

    #[test]
    fn filtered_items_still_advance_the_cursor() {
        let mut state = Paginated::new(3);
        let ticket = state.begin_fetch(true);
        state.finish_fetch(ticket, page(&["a", "gone", "c"], 6), |item| item.0 != "gone");
        assert_eq!(state.items().len(), 2);
        assert_eq!(state.cursor().offset, 3);
        assert!(state.cursor().has_more);
    }

    #[test]
    fn duplicates_are_skipped_on_append() {
        let mut state = Paginated::new(2);
        let ticket = state.begin_fetch(true);
        state.finish_fetch(ticket, page(&["a", "b"], 4), |_| true);
        let ticket = state.begin_load_more().unwrap();
        state.finish_fetch(ticket, page(&["b", "c"], 4), |_| true);
        let ids: Vec<&str> = state.items().as_slice().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn superseded_fetch_is_dropped() {
        let mut state = Paginated::new(2);
        let ticket = state.begin_fetch(true);
        state.finish_fetch(ticket, page(&["a", "b"], 4), |_| true);

        let more = state.begin_load_more().unwrap();
        let refresh = state.begin_fetch(true);
        assert!(state.finish_fetch(refresh, page(&["x", "y"], 4), |_| true));
        assert!(!state.finish_fetch(more, page(&["c", "d"], 4), |_| true));
        let ids: Vec<&str> = state.items().as_slice().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert_eq!(state.cursor().offset, 2);
    }

    #[test]
    fn abandoned_load_more_can_be_retried() {
        let mut state = Paginated::new(2);
        let ticket = state.begin_fetch(true);
        state.finish_fetch(ticket, page(&["a", "b"], 4), |_| true);

        let lost = state.begin_load_more().unwrap();
        assert!(state.begin_load_more().is_none());
        assert!(state.abandon(lost));
        assert_eq!(state.phase(), LoadPhase::Ready);

        let retry = state.begin_load_more().unwrap();
        assert_eq!(retry.offset, 2);
        // a late result for the abandoned ticket is ignored
        assert!(!state.finish_fetch(lost, page(&["x", "y"], 4), |_| true));
    }

    #[test]
    fn abandon_leaves_a_newer_fetch_alone() {
        let mut state: Paginated<Item> = Paginated::new(2);
        let first = state.begin_fetch(true);
        assert!(state.abandon(first));
        assert_eq!(state.phase(), LoadPhase::Idle);

        let stale = state.begin_fetch(true);
        let _current = state.begin_fetch(true);
        assert!(!state.abandon(stale));
        assert_eq!(state.phase(), LoadPhase::LoadingInitial);
    }

    #[test]
    fn has_more_tracks_offset_against_total() {
        let mut cursor = Cursor::default();
        cursor.advance(0, 4, 4);
        assert!(!cursor.has_more);
        // an empty page short of the total leaves the cursor where it was
        cursor.advance(4, 0, 10);
        assert_eq!(cursor.offset, 4);
        assert!(cursor.has_more);
    }

    #[test]
    fn collection_prepend_and_remove() {
        let mut collection = Collection::default();
        collection.replace(items(&["a", "b"]));
        collection.prepend(Item("b".to_string()));
        assert_eq!(collection.as_slice()[0].id(), "b");
        assert_eq!(collection.len(), 2);
        assert!(collection.remove("a"));
        assert!(!collection.remove("a"));
    }
}
