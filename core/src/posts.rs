//! Post feed: the global timeline or one author's posts.
//!
//! Create, update, delete and reaction changes reach the collection only
//! after the server confirms them. Soft-deleted posts are filtered out of
//! every page; the cursor still counts them so filtering never shifts
//! pagination.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::guard::InFlight;
use crate::pagination::{FetchTicket, PageView, Paginated};
use crate::reaction::plan;
use crate::service::{FeedService, ServiceResult};
use crate::types::{NewPost, Post, PostPatch, ReactionKind, ReactionTarget};

struct FeedState {
    page: Paginated<Post>,
    reacting: HashSet<String>,
}

pub struct PostFeed {
    service: FeedService,
    author: Option<String>,
    state: Mutex<FeedState>,
}

impl PostFeed {
    /// `author` of `None` follows the global feed.
    pub fn new(service: FeedService, author: Option<&str>, page_size: usize) -> Self {
        Self {
            service,
            author: author.filter(|id| !id.is_empty()).map(str::to_string),
            state: Mutex::new(FeedState {
                page: Paginated::new(page_size),
                reacting: HashSet::new(),
            }),
        }
    }

    pub async fn mount(service: FeedService, author: Option<&str>, page_size: usize) -> Self {
        let feed = Self::new(service, author, page_size);
        feed.fetch_page(true).await;
        feed
    }

    pub fn view(&self) -> PageView<Post> {
        self.state.lock().page.view()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub async fn fetch_page(&self, reset: bool) {
        let ticket = self.state.lock().page.begin_fetch(reset);
        if !self.run_fetch(ticket).await {
            tracing::debug!(offset = ticket.offset, "dropping superseded post page");
        }
    }

    /// Fetch the next page. Returns false, without a request, while a fetch
    /// is running or when everything is loaded.
    pub async fn load_more(&self) -> bool {
        let Some(ticket) = self.state.lock().page.begin_load_more() else {
            return false;
        };
        self.run_fetch(ticket).await;
        true
    }

    async fn run_fetch(&self, ticket: FetchTicket) -> bool {
        let in_flight = InFlight::new(|| {
            self.state.lock().page.abandon(ticket);
        });
        let result = self
            .service
            .list_posts(self.author.as_deref(), ticket.offset, ticket.limit)
            .await
            .map_err(|err| err.message);
        in_flight.complete();
        self.state.lock().page.finish_fetch(ticket, result, Post::is_visible)
    }

    pub async fn refresh(&self) {
        self.fetch_page(true).await;
    }

    pub async fn create_post(&self, input: &NewPost) -> ServiceResult<Post> {
        let post = self.report(self.service.create_post(input).await)?;
        if post.is_visible() {
            self.state.lock().page.items_mut().prepend(post.clone());
        }
        Ok(post)
    }

    pub async fn update_post(&self, id: &str, input: &PostPatch) -> ServiceResult<Post> {
        let updated = self.report(self.service.update_post(id, input).await)?;
        self.state
            .lock()
            .page
            .items_mut()
            .update(id, |post| post.merge(updated.clone()));
        Ok(updated)
    }

    pub async fn delete_post(&self, id: &str) -> ServiceResult<()> {
        self.report(self.service.delete_post(id).await)?;
        self.state.lock().page.items_mut().remove(id);
        Ok(())
    }

    /// Create, update or remove the viewer's reaction on a loaded post.
    ///
    /// `Ok(false)` means nothing was sent: the post is not loaded or a
    /// reaction change for it is already in flight.
    pub async fn change_reaction(&self, post_id: &str, kind: ReactionKind) -> ServiceResult<bool> {
        let plan = {
            let mut state = self.state.lock();
            let Some(post) = state.page.items().get(post_id) else {
                return Ok(false);
            };
            let plan = plan(post.current_user_like.as_ref(), kind);
            if !state.reacting.insert(post_id.to_string()) {
                return Ok(false);
            }
            plan
        };

        // Cleared on every path, including a dropped future.
        let reacting = InFlight::new(|| {
            self.state.lock().reacting.remove(post_id);
        });
        let target = ReactionTarget::post(post_id);
        let result = plan.execute(&self.service, &target).await;
        drop(reacting);

        let mut state = self.state.lock();
        match result {
            Ok(returned) => {
                state
                    .page
                    .items_mut()
                    .update(post_id, |post| plan.apply_to_post(post, returned));
                Ok(true)
            }
            Err(err) => {
                state.page.set_error(err.message.clone());
                Err(err)
            }
        }
    }

    fn report<T>(&self, result: ServiceResult<T>) -> ServiceResult<T> {
        result.inspect_err(|err| self.state.lock().page.set_error(err.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::client::FeedClient;
    use crate::http::HttpMethod;
    use crate::pagination::LoadPhase;
    use crate::testing::{Reply, StubTransport};

    fn feed(stub: &Arc<StubTransport>, author: Option<&str>) -> PostFeed {
        let service = FeedService::new(FeedClient::new("http://api.test"), stub.clone());
        PostFeed::new(service, author, 3)
    }

    fn ids(view: &PageView<Post>) -> Vec<&str> {
        view.items.iter().map(|p| p.id.as_str()).collect()
    }

    #[tokio::test]
    async fn deleted_posts_are_filtered_but_counted() {
        let stub = StubTransport::new();
        stub.on(
            HttpMethod::Get,
            "/posts?offset=0&limit=3",
            Reply::json(
                200,
                r#"{"posts":[{"_id":"p1"},{"_id":"p2","deleted":true},{"_id":"p3"}],"totalDocuments":5}"#,
            ),
        );
        stub.on(
            HttpMethod::Get,
            "/posts?offset=3&limit=3",
            Reply::json(200, r#"{"posts":[{"_id":"p4"},{"_id":"p5","status":"deleted"}],"totalDocuments":5}"#),
        );
        let feed = feed(&stub, None);

        feed.fetch_page(true).await;
        let view = feed.view();
        assert_eq!(ids(&view), vec!["p1", "p3"]);
        assert!(view.has_more);

        assert!(feed.load_more().await);
        let view = feed.view();
        assert_eq!(ids(&view), vec!["p1", "p3", "p4"]);
        assert!(!view.has_more);
        assert!(!feed.load_more().await);
    }

    #[tokio::test]
    async fn unreadable_field_values_do_not_fail_the_page() {
        let stub = StubTransport::new();
        stub.on(
            HttpMethod::Get,
            "/posts?offset=0&limit=3",
            Reply::json(
                200,
                r#"[{"_id":"p1","createdAt":"2024-01-01 10:00"},{"_id":"p2","likes":[{"_id":"l1","likeType":"care"}]}]"#,
            ),
        );
        let feed = feed(&stub, None);
        feed.fetch_page(true).await;

        let view = feed.view();
        assert_eq!(view.phase, LoadPhase::Ready);
        assert_eq!(ids(&view), vec!["p1", "p2"]);
        assert!(view.error.is_none());
    }

    #[tokio::test]
    async fn author_feed_uses_user_path() {
        let stub = StubTransport::new();
        stub.on(
            HttpMethod::Get,
            "/users/u1/posts?offset=0&limit=3",
            Reply::json(200, r#"{"posts":[],"totalDocuments":0}"#),
        );
        let feed = PostFeed::mount(
            FeedService::new(FeedClient::new("http://api.test"), stub.clone()),
            Some("u1"),
            3,
        )
        .await;
        assert_eq!(feed.view().phase, LoadPhase::Ready);
        assert_eq!(stub.requests().len(), 1);
    }

    #[tokio::test]
    async fn create_update_delete_apply_after_success() {
        let stub = StubTransport::new();
        stub.on(
            HttpMethod::Get,
            "/posts?offset=0&limit=3",
            Reply::json(200, r#"[{"_id":"p1","caption":"first"}]"#),
        );
        stub.on(HttpMethod::Post, "/posts", Reply::json(201, r#"{"_id":"p2","caption":"new"}"#));
        stub.on(HttpMethod::Put, "/posts/p1", Reply::json(200, r#"{"post":{"_id":"p1","caption":"edited"}}"#));
        stub.on(HttpMethod::Delete, "/posts/p2", Reply::json(204, ""));
        let feed = feed(&stub, None);
        feed.fetch_page(true).await;

        let created = feed
            .create_post(&NewPost {
                caption: "new".to_string(),
                image_url: None,
            })
            .await
            .unwrap();
        assert_eq!(created.id, "p2");
        assert_eq!(ids(&feed.view()), vec!["p2", "p1"]);

        feed.update_post(
            "p1",
            &PostPatch {
                caption: Some("edited".to_string()),
                image_url: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(feed.view().items[1].caption.as_deref(), Some("edited"));

        feed.delete_post("p2").await.unwrap();
        assert_eq!(ids(&feed.view()), vec!["p1"]);
    }

    #[tokio::test]
    async fn failed_delete_keeps_post_and_reports() {
        let stub = StubTransport::new();
        stub.on(HttpMethod::Get, "/posts?offset=0&limit=3", Reply::json(200, r#"[{"_id":"p1"}]"#));
        stub.on(HttpMethod::Delete, "/posts/p1", Reply::json(403, r#"{"message":"not yours"}"#));
        let feed = feed(&stub, None);
        feed.fetch_page(true).await;

        let err = feed.delete_post("p1").await.unwrap_err();
        assert_eq!(err.message, "not yours");
        let view = feed.view();
        assert_eq!(ids(&view), vec!["p1"]);
        assert_eq!(view.error.as_deref(), Some("not yours"));
    }

    #[tokio::test]
    async fn reaction_change_follows_plan() {
        let stub = StubTransport::new();
        stub.on(HttpMethod::Get, "/posts?offset=0&limit=3", Reply::json(200, r#"[{"_id":"p1"}]"#));
        stub.on(
            HttpMethod::Post,
            "/likes",
            Reply::json(201, r#"{"_id":"l1","user":"me","likableId":"p1","likeType":"like"}"#),
        );
        stub.on(HttpMethod::Put, "/likes/l1", Reply::json(200, ""));
        stub.on(HttpMethod::Delete, "/likes/l1?onModel=Post&likableId=p1", Reply::json(204, ""));
        let feed = feed(&stub, None);
        feed.fetch_page(true).await;

        assert!(feed.change_reaction("p1", ReactionKind::Like).await.unwrap());
        assert_eq!(feed.view().items[0].like_count(), 1);

        assert!(feed.change_reaction("p1", ReactionKind::Love).await.unwrap());
        let post = feed.view().items[0].clone();
        assert_eq!(post.like_count(), 1);
        assert_eq!(post.current_user_like.map(|l| l.kind), Some(ReactionKind::Love));

        assert!(feed.change_reaction("p1", ReactionKind::Love).await.unwrap());
        let post = feed.view().items[0].clone();
        assert_eq!(post.like_count(), 0);
        assert!(post.current_user_like.is_none());

        let methods: Vec<HttpMethod> = stub.requests().iter().skip(1).map(|r| r.method).collect();
        assert_eq!(methods, vec![HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete]);
    }

    #[tokio::test]
    async fn cancelled_reaction_clears_in_flight_flag() {
        let stub = StubTransport::new();
        stub.on(HttpMethod::Get, "/posts?offset=0&limit=3", Reply::json(200, r#"[{"_id":"p1"}]"#));
        let (slow, _release) = Reply::json(201, r#"{"_id":"l1","likeType":"like"}"#).gated();
        stub.on(HttpMethod::Post, "/likes", slow);
        stub.on(HttpMethod::Post, "/likes", Reply::json(201, r#"{"_id":"l2","likeType":"like"}"#));
        let feed = feed(&stub, None);
        feed.fetch_page(true).await;

        let reacting = feed.change_reaction("p1", ReactionKind::Like);
        let timed_out = tokio::time::timeout(Duration::from_millis(20), reacting).await;
        assert!(timed_out.is_err());
        assert_eq!(feed.view().items[0].like_count(), 0);

        assert!(feed.change_reaction("p1", ReactionKind::Like).await.unwrap());
        assert_eq!(stub.count(HttpMethod::Post, "/likes"), 2);
        assert_eq!(feed.view().items[0].like_count(), 1);
    }

    #[tokio::test]
    async fn cancelled_load_more_can_be_retried() {
        let stub = StubTransport::new();
        stub.on(
            HttpMethod::Get,
            "/posts?offset=0&limit=3",
            Reply::json(200, r#"{"posts":[{"_id":"p1"},{"_id":"p2"},{"_id":"p3"}],"totalDocuments":4}"#),
        );
        let (slow, _release) = Reply::json(200, r#"{"posts":[],"totalDocuments":4}"#).gated();
        stub.on(HttpMethod::Get, "/posts?offset=3&limit=3", slow);
        stub.on(
            HttpMethod::Get,
            "/posts?offset=3&limit=3",
            Reply::json(200, r#"{"posts":[{"_id":"p4"}],"totalDocuments":4}"#),
        );
        let feed = feed(&stub, None);
        feed.fetch_page(true).await;

        let timed_out = tokio::time::timeout(Duration::from_millis(20), feed.load_more()).await;
        assert!(timed_out.is_err());
        let view = feed.view();
        assert_eq!(view.phase, LoadPhase::Ready);
        assert!(!view.loading);

        assert!(feed.load_more().await);
        assert_eq!(ids(&feed.view()), vec!["p1", "p2", "p3", "p4"]);
    }

    #[tokio::test]
    async fn reaction_on_unknown_post_is_skipped() {
        let stub = StubTransport::new();
        let feed = feed(&stub, None);
        assert!(!feed.change_reaction("nope", ReactionKind::Like).await.unwrap());
        assert!(stub.requests().is_empty());
    }
}
