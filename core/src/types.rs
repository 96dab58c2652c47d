//! Domain DTOs for the social API.
//!
//! # Design
//! Ids arrive as either `_id` or `id`; both are accepted and `id` is emitted.
//! Fields the server may omit default rather than fail, since the client
//! renders whatever subset it is given. The same goes for values it cannot
//! read: an unknown reaction kind or an odd timestamp must not cost the
//! whole page. The mock-server crate defines its own
//! copies of these shapes; integration tests catch drift between the two.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Anything held in a paginated collection.
pub trait Identified {
    fn id(&self) -> &str;
}

/// The minimal user shape embedded in posts, notifications and follow lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, alias = "name")]
    pub full_name: Option<String>,
    #[serde(default, alias = "image")]
    pub avatar: Option<String>,
}

impl UserSummary {
    /// Name to show, preferring the full name.
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }
}

impl Identified for UserSummary {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A user together with the follow relationship lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub followers: Vec<String>,
    #[serde(default)]
    pub following: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Love,
    Haha,
    Wow,
    Sad,
    Angry,
    /// A kind this client does not know.
    #[default]
    #[serde(other)]
    Other,
}

/// One actor's reaction on one target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "user")]
    pub user_id: Option<String>,
    #[serde(default = "default_on_model")]
    pub on_model: String,
    #[serde(default)]
    pub likable_id: String,
    #[serde(default, rename = "likeType")]
    pub kind: ReactionKind,
}

fn default_on_model() -> String {
    "Post".to_string()
}

/// What a reaction is attached to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReactionTarget {
    pub on_model: String,
    pub likable_id: String,
}

impl ReactionTarget {
    pub fn post(post_id: &str) -> Self {
        Self {
            on_model: default_on_model(),
            likable_id: post_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "user")]
    pub author: Option<UserSummary>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub likes: Vec<Reaction>,
    #[serde(default)]
    pub current_user_like: Option<Reaction>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Post {
    /// Soft-deleted posts and posts without an id are never shown.
    pub fn is_visible(&self) -> bool {
        !self.id.is_empty()
            && !self.deleted
            && !self.is_deleted
            && self.deleted_at.is_none()
            && self.status.as_deref() != Some("deleted")
    }

    pub fn like_count(&self) -> u64 {
        self.likes.len() as u64
    }

    /// Shallow merge of an updated copy, keeping local-only fields the
    /// server left out.
    pub fn merge(&mut self, updated: Post) {
        let likes = std::mem::take(&mut self.likes);
        let current_user_like = self.current_user_like.take();
        let author = self.author.take();
        *self = Post {
            likes: if updated.likes.is_empty() { likes } else { updated.likes },
            current_user_like: updated.current_user_like.or(current_user_like),
            author: updated.author.or(author),
            ..updated
        };
    }
}

impl Identified for Post {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Like,
    Comment,
    Follow,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostRef {
    #[serde(alias = "_id")]
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: ActivityKind,
    #[serde(default, alias = "user")]
    pub actor: Option<UserSummary>,
    #[serde(default, alias = "entityId")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<PostRef>,
    #[serde(default, alias = "isRead")]
    pub read: bool,
    #[serde(default, alias = "timestamp", deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// The post this notification points at, wherever the server put it.
    pub fn target_post_id(&self) -> Option<&str> {
        self.post
            .as_ref()
            .map(|post| post.id.as_str())
            .or(self.post_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

impl Identified for Notification {
    fn id(&self) -> &str {
        &self.id
    }
}

/// RFC 3339, a zone-less `YYYY-MM-DD HH:MM[:SS]` taken as UTC, or epoch
/// milliseconds. Anything else reads as no timestamp.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        Value::String(text) => parse_timestamp(&text),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }))
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

/// Request payload for creating a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub caption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Request payload for updating a post. Omitted fields stay unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Body of a reaction create or update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionPayload {
    pub on_model: String,
    pub likable_id: String,
    #[serde(rename = "likeType")]
    pub kind: ReactionKind,
}

/// One page of a list endpoint in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}
