//! Stateless HTTP request builder and response parser for the social API.
//!
//! # Design
//! `FeedClient` holds the base URL and an optional bearer token and carries
//! no mutable state between calls. Each endpoint is split into a `build_*`
//! method that produces an `HttpRequest` and a `parse_*` method that
//! consumes an `HttpResponse`. Shape sniffing is delegated to
//! `crate::normalize`.

use serde::Serialize;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::normalize;
use crate::types::{
    NewPost, Notification, Page, Post, PostPatch, Reaction, ReactionKind, ReactionPayload, ReactionTarget,
    UserProfile, UserSummary,
};

/// Which side of a follow relationship to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowDirection {
    Followers,
    Following,
}

impl FollowDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowDirection::Followers => "followers",
            FollowDirection::Following => "following",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedClient {
    base_url: String,
    auth_token: Option<String>,
}

impl FeedClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.auth_token = if token.is_empty() { None } else { Some(token) };
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let mut headers = Vec::new();
        if let Some(token) = &self.auth_token {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        HttpRequest {
            method,
            url: format!("{}{path}", self.base_url),
            headers,
            body: None,
        }
    }

    fn json_request<T: Serialize>(&self, method: HttpMethod, path: &str, payload: &T) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(payload).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let mut req = self.request(method, path);
        req.headers.push(("content-type".to_string(), "application/json".to_string()));
        req.body = Some(body);
        Ok(req)
    }

    // --- notifications ---

    pub fn build_list_notifications(&self, offset: usize, limit: usize) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/notifications?offset={offset}&limit={limit}"))
    }

    pub fn build_mark_notification_read(&self, id: &str) -> HttpRequest {
        self.request(HttpMethod::Put, &format!("/notifications/{}/read", segment(id)))
    }

    pub fn build_mark_all_notifications_read(&self) -> HttpRequest {
        self.request(HttpMethod::Put, "/notifications/read-all")
    }

    pub fn build_unread_count(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/notifications/unread-count")
    }

    pub fn parse_list_notifications(&self, response: HttpResponse) -> Result<Page<Notification>, ApiError> {
        normalize::page(checked_json(response)?, &["notifications"])
    }

    pub fn parse_unread_count(&self, response: HttpResponse) -> Result<u64, ApiError> {
        normalize::count(checked_json(response)?)
    }

    /// Parse any endpoint whose success carries no payload worth keeping.
    pub fn parse_ack(&self, response: HttpResponse) -> Result<(), ApiError> {
        checked_json(response).map(|_| ())
    }

    // --- posts ---

    /// Global feed when `author` is `None`, otherwise that author's posts.
    pub fn build_list_posts(&self, author: Option<&str>, offset: usize, limit: usize) -> HttpRequest {
        let path = match author {
            Some(author) => format!("/users/{}/posts?offset={offset}&limit={limit}", segment(author)),
            None => format!("/posts?offset={offset}&limit={limit}"),
        };
        self.request(HttpMethod::Get, &path)
    }

    pub fn build_get_post(&self, id: &str) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/posts/{}", segment(id)))
    }

    pub fn build_create_post(&self, input: &NewPost) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/posts", input)
    }

    pub fn build_update_post(&self, id: &str, input: &PostPatch) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, &format!("/posts/{}", segment(id)), input)
    }

    pub fn build_delete_post(&self, id: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("/posts/{}", segment(id)))
    }

    pub fn parse_list_posts(&self, response: HttpResponse) -> Result<Page<Post>, ApiError> {
        normalize::page(checked_json(response)?, &["posts"])
    }

    pub fn parse_post(&self, response: HttpResponse) -> Result<Post, ApiError> {
        normalize::entity(checked_json(response)?, "post")
    }

    // --- reactions ---

    pub fn build_create_reaction(&self, target: &ReactionTarget, kind: ReactionKind) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/likes", &payload(target, kind))
    }

    pub fn build_update_reaction(
        &self,
        reaction_id: &str,
        target: &ReactionTarget,
        kind: ReactionKind,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, &format!("/likes/{}", segment(reaction_id)), &payload(target, kind))
    }

    pub fn build_delete_reaction(&self, reaction_id: &str, target: &ReactionTarget) -> HttpRequest {
        self.request(
            HttpMethod::Delete,
            &format!(
                "/likes/{}?onModel={}&likableId={}",
                segment(reaction_id),
                segment(&target.on_model),
                segment(&target.likable_id)
            ),
        )
    }

    /// The reaction the server echoed back, if it echoed one.
    pub fn parse_reaction(&self, response: HttpResponse) -> Result<Option<Reaction>, ApiError> {
        Ok(normalize::optional_entity(checked_json(response)?, "like"))
    }

    // --- users ---

    pub fn build_get_user(&self, id: &str) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/users/{}", segment(id)))
    }

    pub fn build_follow(&self, viewer_id: &str, target_id: &str) -> HttpRequest {
        self.request(
            HttpMethod::Post,
            &format!("/users/{}/follow/{}", segment(viewer_id), segment(target_id)),
        )
    }

    pub fn build_unfollow(&self, viewer_id: &str, target_id: &str) -> HttpRequest {
        self.request(
            HttpMethod::Delete,
            &format!("/users/{}/follow/{}", segment(viewer_id), segment(target_id)),
        )
    }

    pub fn build_list_follows(&self, user_id: &str, direction: FollowDirection) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/users/{}/{}", segment(user_id), direction.as_str()))
    }

    pub fn parse_user(&self, response: HttpResponse) -> Result<UserProfile, ApiError> {
        normalize::entity(checked_json(response)?, "user")
    }

    pub fn parse_list_follows(
        &self,
        response: HttpResponse,
        direction: FollowDirection,
    ) -> Result<Vec<UserSummary>, ApiError> {
        let page: Page<UserSummary> = normalize::page(checked_json(response)?, &["users", direction.as_str()])?;
        Ok(page.items)
    }
}

fn payload(target: &ReactionTarget, kind: ReactionKind) -> ReactionPayload {
    ReactionPayload {
        on_model: target.on_model.clone(),
        likable_id: target.likable_id.clone(),
        kind,
    }
}

/// Percent-encode the characters that would break a path segment or query value.
fn segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

/// Map non-success statuses to `ApiError`, then decode the body and reject
/// explicit `"success": false` envelopes.
fn checked_json(response: HttpResponse) -> Result<serde_json::Value, ApiError> {
    if response.status == 404 {
        return Err(ApiError::NotFound { body: response.body });
    }
    if !response.is_success() {
        return Err(ApiError::HttpError {
            status: response.status,
            body: response.body,
        });
    }
    let value = normalize::parse_json(&response.body)?;
    if let Some(message) = normalize::rejection(&value) {
        return Err(ApiError::Rejected(message));
    }
    Ok(value)
}
