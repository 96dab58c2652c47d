//! Reactions: the create/update/delete decision and the optimistic toggle.
//!
//! Requesting a kind compares it against the actor's existing reaction on
//! the target. No reaction creates one, a different kind updates the
//! existing one in place, and the same kind removes it.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::optimistic::{Optimistic, PendingMutation, Resolution, ToggleOutcome};
use crate::service::{FeedService, ServiceResult};
use crate::types::{Post, Reaction, ReactionKind, ReactionTarget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionPlan {
    Create { kind: ReactionKind },
    Update { reaction_id: String, kind: ReactionKind },
    Delete { reaction_id: String },
}

pub fn plan(existing: Option<&Reaction>, requested: ReactionKind) -> ReactionPlan {
    match existing {
        None => ReactionPlan::Create { kind: requested },
        Some(existing) if existing.kind != requested => ReactionPlan::Update {
            reaction_id: existing.id.clone(),
            kind: requested,
        },
        Some(existing) => ReactionPlan::Delete {
            reaction_id: existing.id.clone(),
        },
    }
}

impl ReactionPlan {
    /// Issue the request this plan calls for. Create and update may echo
    /// the stored reaction back.
    pub async fn execute(&self, service: &FeedService, target: &ReactionTarget) -> ServiceResult<Option<Reaction>> {
        match self {
            ReactionPlan::Create { kind } => service.create_reaction(target, *kind).await,
            ReactionPlan::Update { reaction_id, kind } => service.update_reaction(reaction_id, target, *kind).await,
            ReactionPlan::Delete { reaction_id } => service.delete_reaction(reaction_id, target).await.map(|()| None),
        }
    }

    /// Apply a confirmed plan to a post's like list and viewer reaction.
    pub fn apply_to_post(&self, post: &mut Post, returned: Option<Reaction>) {
        match self {
            ReactionPlan::Create { .. } => {
                if let Some(like) = returned {
                    post.likes.retain(|existing| existing.id != like.id);
                    post.likes.push(like.clone());
                    post.current_user_like = Some(like);
                }
            }
            ReactionPlan::Update { reaction_id, kind } => {
                for like in post.likes.iter_mut().filter(|like| like.id == *reaction_id) {
                    like.kind = *kind;
                }
                post.current_user_like = match (returned, post.current_user_like.take()) {
                    (Some(like), _) => Some(like),
                    (None, Some(mut previous)) => {
                        previous.kind = *kind;
                        Some(previous)
                    }
                    (None, None) => None,
                };
            }
            ReactionPlan::Delete { reaction_id } => {
                post.likes.retain(|like| like.id != *reaction_id);
                post.current_user_like = None;
            }
        }
    }
}

/// The viewer's reaction on one target plus the target's reaction count.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReactionState {
    pub current: Option<Reaction>,
    pub count: u64,
}

impl ReactionState {
    pub fn of_post(post: &Post) -> Self {
        Self {
            current: post.current_user_like.clone(),
            count: post.like_count(),
        }
    }

    /// The state this plan predicts. A created reaction has an empty id
    /// until the server assigns one.
    fn predict(&self, plan: &ReactionPlan, actor_id: &str, target: &ReactionTarget) -> Self {
        match plan {
            ReactionPlan::Create { kind } => Self {
                current: Some(Reaction {
                    id: String::new(),
                    user_id: Some(actor_id.to_string()),
                    on_model: target.on_model.clone(),
                    likable_id: target.likable_id.clone(),
                    kind: *kind,
                }),
                count: self.count + 1,
            },
            ReactionPlan::Update { kind, .. } => Self {
                current: self.current.clone().map(|mut reaction| {
                    reaction.kind = *kind;
                    reaction
                }),
                count: self.count,
            },
            ReactionPlan::Delete { .. } => Self {
                current: None,
                count: self.count.saturating_sub(1),
            },
        }
    }
}

/// Optimistic reaction toggle for a single target.
pub struct ReactionToggle {
    service: FeedService,
    actor_id: Option<String>,
    target: ReactionTarget,
    state: Arc<Mutex<Optimistic<ReactionState>>>,
}

impl ReactionToggle {
    pub fn new(service: FeedService, actor_id: Option<&str>, target: ReactionTarget, initial: ReactionState) -> Self {
        Self {
            service,
            actor_id: actor_id.filter(|id| !id.is_empty()).map(str::to_string),
            target,
            state: Arc::new(Mutex::new(Optimistic::new(initial))),
        }
    }

    pub fn for_post(service: FeedService, actor_id: Option<&str>, post: &Post) -> Self {
        Self::new(service, actor_id, ReactionTarget::post(&post.id), ReactionState::of_post(post))
    }

    pub fn state(&self) -> ReactionState {
        self.state.lock().current().clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.state.lock().is_pending()
    }

    pub async fn react(&self, kind: ReactionKind) -> ToggleOutcome<ReactionState> {
        let Some(actor_id) = self.actor_id.as_deref() else {
            return ToggleOutcome::Skipped;
        };
        if self.target.likable_id.is_empty() {
            return ToggleOutcome::Skipped;
        }

        let mut chosen = None;
        let pending = PendingMutation::begin(&self.state, |state| {
            let plan = plan(state.current.as_ref(), kind);
            let predicted = state.predict(&plan, actor_id, &self.target);
            chosen = Some(plan);
            predicted
        });
        let (Some(pending), Some(plan)) = (pending, chosen) else {
            tracing::debug!(likable_id = %self.target.likable_id, "reaction already in flight");
            return ToggleOutcome::Skipped;
        };

        match plan.execute(&self.service, &self.target).await {
            Ok(returned) => {
                let resolution = match returned {
                    Some(reaction) if !matches!(plan, ReactionPlan::Delete { .. }) => {
                        let mut server = pending.ticket().predicted.clone();
                        server.current = Some(reaction);
                        Resolution::Reconciled(server)
                    }
                    _ => Resolution::Confirmed,
                };
                ToggleOutcome::Confirmed(pending.resolve(resolution))
            }
            Err(err) => {
                tracing::warn!(likable_id = %self.target.likable_id, error = %err, "reverting reaction");
                ToggleOutcome::Reverted {
                    state: pending.resolve(Resolution::Failed),
                    error: err.message,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FeedClient;
    use crate::http::HttpMethod;
    use crate::testing::{Reply, StubTransport};

    fn like(id: &str, kind: ReactionKind) -> Reaction {
        Reaction {
            id: id.to_string(),
            user_id: Some("me".to_string()),
            on_model: "Post".to_string(),
            likable_id: "p1".to_string(),
            kind,
        }
    }

    fn toggle(stub: &Arc<StubTransport>, initial: ReactionState) -> ReactionToggle {
        let service = FeedService::new(FeedClient::new("http://api.test"), stub.clone());
        ReactionToggle::new(service, Some("me"), ReactionTarget::post("p1"), initial)
    }

    #[test]
    fn plan_covers_three_cases() {
        assert_eq!(plan(None, ReactionKind::Like), ReactionPlan::Create { kind: ReactionKind::Like });
        let existing = like("l1", ReactionKind::Like);
        assert_eq!(
            plan(Some(&existing), ReactionKind::Love),
            ReactionPlan::Update {
                reaction_id: "l1".to_string(),
                kind: ReactionKind::Love
            }
        );
        assert_eq!(
            plan(Some(&existing), ReactionKind::Like),
            ReactionPlan::Delete {
                reaction_id: "l1".to_string()
            }
        );
    }

    #[test]
    fn apply_to_post_tracks_likes() {
        let mut post: Post = serde_json::from_str(r#"{"id":"p1"}"#).unwrap();
        ReactionPlan::Create { kind: ReactionKind::Like }.apply_to_post(&mut post, Some(like("l1", ReactionKind::Like)));
        assert_eq!(post.like_count(), 1);

        ReactionPlan::Update {
            reaction_id: "l1".to_string(),
            kind: ReactionKind::Wow,
        }
        .apply_to_post(&mut post, None);
        assert_eq!(post.likes[0].kind, ReactionKind::Wow);
        assert_eq!(post.current_user_like.as_ref().map(|l| l.kind), Some(ReactionKind::Wow));

        ReactionPlan::Delete {
            reaction_id: "l1".to_string(),
        }
        .apply_to_post(&mut post, None);
        assert!(post.likes.is_empty());
        assert!(post.current_user_like.is_none());
    }

    #[tokio::test]
    async fn like_then_like_again_creates_then_deletes() {
        let stub = StubTransport::new();
        stub.on(
            HttpMethod::Post,
            "/likes",
            Reply::json(201, r#"{"_id":"l7","likableId":"p1","likeType":"like"}"#),
        );
        stub.on(HttpMethod::Delete, "/likes/l7?onModel=Post&likableId=p1", Reply::json(204, ""));
        let hook = toggle(&stub, ReactionState::default());

        let created = hook.react(ReactionKind::Like).await;
        let ToggleOutcome::Confirmed(state) = created else {
            panic!("expected confirmation, got {created:?}");
        };
        assert_eq!(state.count, 1);
        assert_eq!(state.current.as_ref().map(|r| r.id.as_str()), Some("l7"));

        let removed = hook.react(ReactionKind::Like).await;
        assert_eq!(removed, ToggleOutcome::Confirmed(ReactionState::default()));
        assert_eq!(stub.count(HttpMethod::Post, "/likes"), 1);
        assert_eq!(stub.count(HttpMethod::Delete, "/likes/l7?onModel=Post&likableId=p1"), 1);
    }

    #[tokio::test]
    async fn different_kind_updates_instead_of_recreating() {
        let stub = StubTransport::new();
        stub.on(HttpMethod::Put, "/likes/l1", Reply::json(200, ""));
        let hook = toggle(
            &stub,
            ReactionState {
                current: Some(like("l1", ReactionKind::Like)),
                count: 3,
            },
        );

        let outcome = hook.react(ReactionKind::Love).await;
        let ToggleOutcome::Confirmed(state) = outcome else {
            panic!("expected confirmation");
        };
        assert_eq!(state.count, 3);
        assert_eq!(state.current.map(|r| r.kind), Some(ReactionKind::Love));
        let methods: Vec<HttpMethod> = stub.requests().iter().map(|r| r.method).collect();
        assert_eq!(methods, vec![HttpMethod::Put]);
    }

    #[tokio::test]
    async fn failed_reaction_reverts() {
        let stub = StubTransport::new();
        stub.on(HttpMethod::Post, "/likes", Reply::unreachable());
        let hook = toggle(&stub, ReactionState { current: None, count: 4 });

        let outcome = hook.react(ReactionKind::Haha).await;
        assert!(matches!(outcome, ToggleOutcome::Reverted { ref state, .. } if state.count == 4 && state.current.is_none()));
        assert_eq!(hook.state(), ReactionState { current: None, count: 4 });
        assert!(!hook.is_submitting());
    }

    #[tokio::test]
    async fn missing_actor_is_skipped() {
        let stub = StubTransport::new();
        let service = FeedService::new(FeedClient::new("http://api.test"), stub.clone());
        let hook = ReactionToggle::new(service, None, ReactionTarget::post("p1"), ReactionState::default());
        assert_eq!(hook.react(ReactionKind::Like).await, ToggleOutcome::Skipped);
        assert!(stub.requests().is_empty());
    }
}
