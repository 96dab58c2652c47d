//! Optimistic follow/unfollow toggle.
//!
//! The relationship flips and the follower count moves the moment `toggle`
//! is called. If the request fails the pre-toggle state comes back exactly,
//! with no error kept on the hook: a failed toggle looks like nothing
//! happened.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::optimistic::{Optimistic, PendingMutation, Resolution, ToggleOutcome};
use crate::service::FeedService;
use crate::types::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FollowState {
    pub is_following: bool,
    pub followers_count: u64,
}

impl FollowState {
    /// Relationship of `viewer` to `target` as both profiles describe it.
    pub fn between(viewer: Option<&UserProfile>, target: Option<&UserProfile>) -> Self {
        let Some(target) = target else {
            return Self::default();
        };
        let is_following = viewer.is_some_and(|viewer| {
            !viewer.id.is_empty()
                && (target.followers.iter().any(|id| *id == viewer.id)
                    || viewer.following.iter().any(|id| *id == target.id))
        });
        Self {
            is_following,
            followers_count: target.followers.len() as u64,
        }
    }

    pub fn toggled(&self) -> Self {
        if self.is_following {
            Self {
                is_following: false,
                followers_count: self.followers_count.saturating_sub(1),
            }
        } else {
            Self {
                is_following: true,
                followers_count: self.followers_count + 1,
            }
        }
    }
}

/// Snapshot for rendering a follow button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowView {
    pub state: FollowState,
    pub submitting: bool,
    /// False when either id is missing or the viewer is looking at themself.
    pub visible: bool,
    pub disabled: bool,
}

impl FollowView {
    pub fn label(&self) -> &'static str {
        match (self.submitting, self.state.is_following) {
            // While submitting, `is_following` already holds the prediction.
            (true, true) => "Following...",
            (true, false) => "Unfollowing...",
            (false, true) => "Unfollow",
            (false, false) => "Follow",
        }
    }
}

pub struct FollowToggle {
    service: FeedService,
    viewer_id: Option<String>,
    target_id: Option<String>,
    disabled: AtomicBool,
    state: Arc<Mutex<Optimistic<FollowState>>>,
}

impl FollowToggle {
    pub fn new(service: FeedService, viewer: Option<&UserProfile>, target: Option<&UserProfile>) -> Self {
        let non_empty = |id: &str| (!id.is_empty()).then(|| id.to_string());
        Self {
            service,
            viewer_id: viewer.and_then(|v| non_empty(&v.id)),
            target_id: target.and_then(|t| non_empty(&t.id)),
            disabled: AtomicBool::new(false),
            state: Arc::new(Mutex::new(Optimistic::new(FollowState::between(viewer, target)))),
        }
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Relaxed);
    }

    pub fn view(&self) -> FollowView {
        let state = self.state.lock();
        FollowView {
            state: *state.current(),
            submitting: state.is_pending(),
            visible: self.ids().is_some(),
            disabled: self.disabled.load(Ordering::Relaxed),
        }
    }

    /// Adopt server truth from a freshly fetched target profile. Ignored
    /// while a toggle is in flight.
    pub fn sync(&self, viewer: Option<&UserProfile>, target: &UserProfile) -> bool {
        self.state.lock().reset(FollowState::between(viewer, Some(target)))
    }

    fn ids(&self) -> Option<(&str, &str)> {
        let viewer = self.viewer_id.as_deref()?;
        let target = self.target_id.as_deref()?;
        (viewer != target).then_some((viewer, target))
    }

    pub async fn toggle(&self) -> ToggleOutcome<FollowState> {
        let Some((viewer, target)) = self.ids() else {
            return ToggleOutcome::Skipped;
        };
        if self.disabled.load(Ordering::Relaxed) {
            return ToggleOutcome::Skipped;
        }
        let Some(pending) = PendingMutation::begin(&self.state, FollowState::toggled) else {
            tracing::debug!(target_user = target, "follow toggle already in flight");
            return ToggleOutcome::Skipped;
        };

        let follow = pending.ticket().predicted.is_following;
        let result = if follow {
            self.service.follow_user(viewer, target).await
        } else {
            self.service.unfollow_user(viewer, target).await
        };

        match result {
            Ok(()) => ToggleOutcome::Confirmed(pending.resolve(Resolution::Confirmed)),
            Err(err) => {
                tracing::warn!(target_user = target, follow, error = %err, "reverting follow toggle");
                let state = pending.resolve(Resolution::Failed);
                ToggleOutcome::Reverted {
                    state,
                    error: err.message,
                }
            }
        }
    }
}
