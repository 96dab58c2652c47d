//! Single post loader, keyed by id.
//!
//! Changing the id clears whatever was shown before the new fetch starts.
//! A response for an id that is no longer current is dropped.

use parking_lot::Mutex;

use crate::generation::{Generation, Token};
use crate::guard::InFlight;
use crate::service::{FeedService, ServiceResult};
use crate::types::Post;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostDetailView {
    pub id: String,
    pub post: Option<Post>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct DetailState {
    id: String,
    post: Option<Post>,
    loading: bool,
    error: Option<String>,
    generation: Generation,
}

pub struct PostDetail {
    service: FeedService,
    state: Mutex<DetailState>,
}

impl PostDetail {
    pub fn new(service: FeedService) -> Self {
        Self {
            service,
            state: Mutex::new(DetailState::default()),
        }
    }

    pub async fn mount(service: FeedService, id: &str) -> Self {
        let detail = Self::new(service);
        detail.load(id).await;
        detail
    }

    pub fn view(&self) -> PostDetailView {
        let state = self.state.lock();
        PostDetailView {
            id: state.id.clone(),
            post: state.post.clone(),
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    /// Fetch `id`, replacing whatever was shown. An empty id does nothing.
    pub async fn load(&self, id: &str) {
        if id.is_empty() {
            return;
        }
        let token = {
            let mut state = self.state.lock();
            state.id = id.to_string();
            state.post = None;
            state.error = None;
            state.loading = true;
            state.generation.next()
        };
        let in_flight = InFlight::new(|| self.abandon(token));
        let result = self.service.get_post(id).await;
        in_flight.complete();
        self.finish(token, result);
    }

    /// Reload only when `id` differs from the current one.
    pub async fn set_id(&self, id: &str) -> bool {
        if self.state.lock().id == id {
            return false;
        }
        self.load(id).await;
        true
    }

    pub async fn reload(&self) {
        let id = self.state.lock().id.clone();
        self.load(&id).await;
    }

    /// Replace the shown post with a locally updated copy.
    pub fn set_post(&self, post: Post) {
        let mut state = self.state.lock();
        if state.id == post.id {
            state.post = Some(post);
        }
    }

    fn abandon(&self, token: Token) {
        let mut state = self.state.lock();
        if state.generation.is_current(token) {
            state.generation.invalidate();
            state.loading = false;
        }
    }

    fn finish(&self, token: Token, result: ServiceResult<Post>) {
        let mut state = self.state.lock();
        if !state.generation.is_current(token) {
            tracing::debug!(id = %state.id, "dropping stale post response");
            return;
        }
        state.loading = false;
        match result {
            Ok(post) if post.is_visible() => state.post = Some(post),
            Ok(_) => state.error = Some("Post not found".to_string()),
            Err(err) => state.error = Some(err.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::client::FeedClient;
    use crate::http::HttpMethod;
    use crate::testing::{Reply, StubTransport};

    fn detail(stub: &Arc<StubTransport>) -> PostDetail {
        PostDetail::new(FeedService::new(FeedClient::new("http://api.test"), stub.clone()))
    }

    #[tokio::test]
    async fn loads_wrapped_or_bare_post() {
        let stub = StubTransport::new();
        stub.on(HttpMethod::Get, "/posts/a", Reply::json(200, r#"{"post":{"_id":"a","caption":"hi"}}"#));
        stub.on(HttpMethod::Get, "/posts/b", Reply::json(200, r#"{"_id":"b"}"#));
        let hook = detail(&stub);

        hook.load("a").await;
        let view = hook.view();
        assert!(!view.loading);
        assert_eq!(view.post.and_then(|p| p.caption).as_deref(), Some("hi"));

        assert!(hook.set_id("b").await);
        assert_eq!(hook.view().post.map(|p| p.id).as_deref(), Some("b"));
        assert!(!hook.set_id("b").await);
        assert_eq!(stub.count(HttpMethod::Get, "/posts/b"), 1);
    }

    #[tokio::test]
    async fn empty_id_is_ignored() {
        let stub = StubTransport::new();
        let hook = detail(&stub);
        hook.load("").await;
        assert_eq!(hook.view(), PostDetailView::default());
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn failure_sets_error_and_clears_post() {
        let stub = StubTransport::new();
        stub.on(HttpMethod::Get, "/posts/a", Reply::json(200, r#"{"_id":"a"}"#));
        stub.on(HttpMethod::Get, "/posts/b", Reply::json(404, r#"{"message":"Post not found"}"#));
        let hook = detail(&stub);
        hook.load("a").await;

        hook.set_id("b").await;
        let view = hook.view();
        assert!(view.post.is_none());
        assert_eq!(view.error.as_deref(), Some("Post not found"));
    }

    #[tokio::test]
    async fn late_response_for_previous_id_is_dropped() {
        let stub = StubTransport::new();
        let (slow, release) = Reply::json(200, r#"{"_id":"a"}"#).gated();
        stub.on(HttpMethod::Get, "/posts/a", slow);
        stub.on(HttpMethod::Get, "/posts/b", Reply::json(200, r#"{"_id":"b"}"#));
        let hook = detail(&stub);

        let first = hook.load("a");
        let second = async {
            tokio::task::yield_now().await;
            hook.set_id("b").await;
            let _ = release.send(());
        };
        tokio::join!(first, second);

        let view = hook.view();
        assert_eq!(view.id, "b");
        assert_eq!(view.post.map(|p| p.id).as_deref(), Some("b"));
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn cancelled_load_stops_loading() {
        let stub = StubTransport::new();
        let (slow, _release) = Reply::json(200, r#"{"_id":"a"}"#).gated();
        stub.on(HttpMethod::Get, "/posts/a", slow);
        stub.on(HttpMethod::Get, "/posts/a", Reply::json(200, r#"{"_id":"a","caption":"hi"}"#));
        let hook = detail(&stub);

        let timed_out = tokio::time::timeout(Duration::from_millis(20), hook.load("a")).await;
        assert!(timed_out.is_err());
        let view = hook.view();
        assert!(!view.loading);
        assert!(view.post.is_none());

        hook.reload().await;
        assert_eq!(hook.view().post.and_then(|p| p.caption).as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn soft_deleted_post_reads_as_missing() {
        let stub = StubTransport::new();
        stub.on(HttpMethod::Get, "/posts/a", Reply::json(200, r#"{"_id":"a","isDeleted":true}"#));
        let hook = detail(&stub);
        hook.load("a").await;
        let view = hook.view();
        assert!(view.post.is_none());
        assert!(view.error.is_some());
    }
}
