//! Service layer: build, execute, parse, and fold every failure into a
//! `ServiceError`.
//!
//! Nothing past this boundary sees a raw transport error or an HTTP status;
//! callers get `Ok(data)` or a failure with a displayable message.

use std::sync::Arc;

use crate::client::{FeedClient, FollowDirection};
use crate::config::ClientConfig;
use crate::error::{ApiError, ServiceError};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{
    NewPost, Notification, Page, Post, PostPatch, Reaction, ReactionKind, ReactionTarget, UserProfile, UserSummary,
};

/// `Ok(data)` or a failure carrying a human-readable message.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Shared by every hook instance; cheap to clone.
#[derive(Clone)]
pub struct FeedService {
    client: FeedClient,
    transport: Arc<dyn Transport>,
}

impl FeedService {
    pub fn new(client: FeedClient, transport: Arc<dyn Transport>) -> Self {
        Self { client, transport }
    }

    /// Service over `reqwest` configured from `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut client = FeedClient::new(&config.base_url);
        if let Some(token) = &config.auth_token {
            client = client.with_auth_token(token.clone());
        }
        Self::new(client, Arc::new(ReqwestTransport::new(config.timeout)))
    }

    pub fn client(&self) -> &FeedClient {
        &self.client
    }

    async fn call<T>(
        &self,
        request: Result<HttpRequest, ApiError>,
        parse: impl FnOnce(&FeedClient, HttpResponse) -> Result<T, ApiError>,
        fallback: &str,
    ) -> ServiceResult<T> {
        let request = request.map_err(|err| ServiceError::from_api(err, fallback))?;
        tracing::debug!(method = %request.method, url = %request.url, "sending request");

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "{fallback}");
                return Err(ServiceError::from_transport(err, fallback));
            }
        };

        parse(&self.client, response).map_err(|err| {
            tracing::warn!(error = %err, "{fallback}");
            ServiceError::from_api(err, fallback)
        })
    }

    // --- notifications ---

    pub async fn list_notifications(&self, offset: usize, limit: usize) -> ServiceResult<Page<Notification>> {
        self.call(
            Ok(self.client.build_list_notifications(offset, limit)),
            FeedClient::parse_list_notifications,
            "Failed to fetch notifications",
        )
        .await
    }

    pub async fn mark_notification_read(&self, id: &str) -> ServiceResult<()> {
        self.call(
            Ok(self.client.build_mark_notification_read(id)),
            FeedClient::parse_ack,
            "Failed to mark notification as read",
        )
        .await
    }

    pub async fn mark_all_notifications_read(&self) -> ServiceResult<()> {
        self.call(
            Ok(self.client.build_mark_all_notifications_read()),
            FeedClient::parse_ack,
            "Failed to mark all notifications as read",
        )
        .await
    }

    pub async fn unread_count(&self) -> ServiceResult<u64> {
        self.call(
            Ok(self.client.build_unread_count()),
            FeedClient::parse_unread_count,
            "Failed to fetch unread count",
        )
        .await
    }

    // --- posts ---

    pub async fn list_posts(&self, author: Option<&str>, offset: usize, limit: usize) -> ServiceResult<Page<Post>> {
        self.call(
            Ok(self.client.build_list_posts(author, offset, limit)),
            FeedClient::parse_list_posts,
            "Failed to fetch posts",
        )
        .await
    }

    pub async fn get_post(&self, id: &str) -> ServiceResult<Post> {
        self.call(Ok(self.client.build_get_post(id)), FeedClient::parse_post, "Failed to fetch post")
            .await
    }

    pub async fn create_post(&self, input: &NewPost) -> ServiceResult<Post> {
        self.call(
            self.client.build_create_post(input),
            FeedClient::parse_post,
            "Failed to create post",
        )
        .await
    }

    pub async fn update_post(&self, id: &str, input: &PostPatch) -> ServiceResult<Post> {
        self.call(
            self.client.build_update_post(id, input),
            FeedClient::parse_post,
            "Failed to update post",
        )
        .await
    }

    pub async fn delete_post(&self, id: &str) -> ServiceResult<()> {
        self.call(Ok(self.client.build_delete_post(id)), FeedClient::parse_ack, "Failed to delete post")
            .await
    }

    // --- reactions ---

    pub async fn create_reaction(&self, target: &ReactionTarget, kind: ReactionKind) -> ServiceResult<Option<Reaction>> {
        self.call(
            self.client.build_create_reaction(target, kind),
            FeedClient::parse_reaction,
            "Reaction request failed",
        )
        .await
    }

    pub async fn update_reaction(
        &self,
        reaction_id: &str,
        target: &ReactionTarget,
        kind: ReactionKind,
    ) -> ServiceResult<Option<Reaction>> {
        self.call(
            self.client.build_update_reaction(reaction_id, target, kind),
            FeedClient::parse_reaction,
            "Reaction request failed",
        )
        .await
    }

    pub async fn delete_reaction(&self, reaction_id: &str, target: &ReactionTarget) -> ServiceResult<()> {
        self.call(
            Ok(self.client.build_delete_reaction(reaction_id, target)),
            FeedClient::parse_ack,
            "Reaction request failed",
        )
        .await
    }

    // --- users ---

    pub async fn get_user(&self, id: &str) -> ServiceResult<UserProfile> {
        self.call(Ok(self.client.build_get_user(id)), FeedClient::parse_user, "Failed to fetch user")
            .await
    }

    pub async fn follow_user(&self, viewer_id: &str, target_id: &str) -> ServiceResult<()> {
        self.call(
            Ok(self.client.build_follow(viewer_id, target_id)),
            FeedClient::parse_ack,
            "Failed to follow user",
        )
        .await
    }

    pub async fn unfollow_user(&self, viewer_id: &str, target_id: &str) -> ServiceResult<()> {
        self.call(
            Ok(self.client.build_unfollow(viewer_id, target_id)),
            FeedClient::parse_ack,
            "Failed to unfollow user",
        )
        .await
    }

    pub async fn list_follows(&self, user_id: &str, direction: FollowDirection) -> ServiceResult<Vec<UserSummary>> {
        let fallback = match direction {
            FollowDirection::Followers => "Failed to fetch followers",
            FollowDirection::Following => "Failed to fetch following",
        };
        self.call(
            Ok(self.client.build_list_follows(user_id, direction)),
            move |client, response| client.parse_list_follows(response, direction),
            fallback,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::http::HttpMethod;
    use crate::testing::{Reply, StubTransport};

    fn service(stub: &Arc<StubTransport>) -> FeedService {
        FeedService::new(FeedClient::new("http://api.test"), stub.clone())
    }

    #[tokio::test]
    async fn list_notifications_normalizes_raw_array() {
        let stub = StubTransport::new();
        stub.on(
            HttpMethod::Get,
            "/notifications?offset=0&limit=20",
            Reply::json(200, r#"[{"_id":"n1"},{"_id":"n2","read":true}]"#),
        );
        let page = service(&stub).list_notifications(0, 20).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn server_message_is_surfaced() {
        let stub = StubTransport::new();
        stub.on(
            HttpMethod::Put,
            "/notifications/n1/read",
            Reply::json(403, r#"{"message":"not your notification"}"#),
        );
        let err = service(&stub).mark_notification_read("n1").await.unwrap_err();
        assert_eq!(err.message, "not your notification");
        assert_eq!(err.kind, FailureKind::Server { status: 403 });
    }

    #[tokio::test]
    async fn transport_failure_becomes_service_error() {
        let stub = StubTransport::new();
        stub.on(HttpMethod::Get, "/notifications/unread-count", Reply::unreachable());
        let err = service(&stub).unread_count().await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Transport);
        assert!(!err.message.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_uses_fallback_message() {
        let stub = StubTransport::new();
        stub.on(HttpMethod::Get, "/posts/p1", Reply::json(200, "not json"));
        let err = service(&stub).get_post("p1").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Malformed);
        assert_eq!(err.message, "Failed to fetch post");
    }

    #[tokio::test]
    async fn rejected_envelope_is_a_failure() {
        let stub = StubTransport::new();
        stub.on(
            HttpMethod::Post,
            "/users/me/follow/you",
            Reply::json(200, r#"{"success":false,"message":"blocked"}"#),
        );
        let err = service(&stub).follow_user("me", "you").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Rejected);
        assert_eq!(err.message, "blocked");
    }

    #[tokio::test]
    async fn unscripted_route_is_a_transport_failure() {
        let stub = StubTransport::new();
        let err = service(&stub).get_user("u1").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Transport);
        assert_eq!(stub.requests().len(), 1);
    }
}
