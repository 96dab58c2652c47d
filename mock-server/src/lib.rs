//! In-memory stand-in for the social API.
//!
//! The bearer token is taken as the caller's user id. Responses use the
//! server's native shapes (`_id`, `totalDocuments`, wrapped entities) so
//! clients exercise their normalization against it.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Love,
    Haha,
    Wow,
    Sad,
    Angry,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub followers: Vec<String>,
    pub following: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub on_model: String,
    pub likable_id: String,
    pub like_type: ReactionKind,
}

/// A post as rendered for one viewer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostBody {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: UserRef,
    pub caption: String,
    pub image: Option<String>,
    pub likes: Vec<Like>,
    pub current_user_like: Option<Like>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationBody {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub user: UserRef,
    pub entity_id: Option<String>,
    pub is_read: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePost {
    pub caption: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePost {
    pub caption: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionInput {
    #[serde(default = "default_model")]
    pub on_model: String,
    pub likable_id: String,
    pub like_type: ReactionKind,
}

fn default_model() -> String {
    "Post".to_string()
}

#[derive(Deserialize)]
pub struct PageQuery {
    offset: Option<usize>,
    limit: Option<usize>,
}

impl PageQuery {
    fn window<T>(&self, items: Vec<T>) -> (Vec<T>, usize) {
        let total = items.len();
        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        (items.into_iter().skip(offset).take(limit).collect(), total)
    }
}

struct PostRecord {
    id: String,
    author: String,
    caption: String,
    image: Option<String>,
    created_at: DateTime<Utc>,
    deleted: bool,
}

struct NotificationRecord {
    id: String,
    recipient: String,
    kind: String,
    actor: String,
    entity_id: Option<String>,
    read: bool,
    timestamp: DateTime<Utc>,
}

/// Everything the server knows. Posts and notifications are newest first.
#[derive(Default)]
pub struct Store {
    users: Vec<User>,
    posts: Vec<PostRecord>,
    likes: Vec<Like>,
    notifications: Vec<NotificationRecord>,
}

impl Store {
    /// A few users, posts and notifications for running the binary by hand.
    pub fn seeded() -> Self {
        let mut store = Self::default();
        store.add_user("alice", "alice");
        store.add_user("bob", "bob");
        store.add_user("carol", "carol");
        let first = store.add_post("alice", "First light over the bay");
        store.add_post("bob", "New bike day");
        store.add_post("alice", "Coffee, then code");
        store.notify("alice", "like", "bob", Some(&first));
        store.notify("alice", "follow", "carol", None);
        store
    }

    pub fn add_user(&mut self, id: &str, username: &str) {
        self.users.retain(|u| u.id != id);
        self.users.push(User {
            id: id.to_string(),
            username: username.to_string(),
            followers: Vec::new(),
            following: Vec::new(),
        });
    }

    pub fn add_post(&mut self, author: &str, caption: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.posts.insert(
            0,
            PostRecord {
                id: id.clone(),
                author: author.to_string(),
                caption: caption.to_string(),
                image: None,
                created_at: Utc::now(),
                deleted: false,
            },
        );
        id
    }

    pub fn notify(&mut self, recipient: &str, kind: &str, actor: &str, entity_id: Option<&str>) -> String {
        let id = Uuid::new_v4().to_string();
        self.notifications.insert(
            0,
            NotificationRecord {
                id: id.clone(),
                recipient: recipient.to_string(),
                kind: kind.to_string(),
                actor: actor.to_string(),
                entity_id: entity_id.map(str::to_string),
                read: false,
                timestamp: Utc::now(),
            },
        );
        id
    }

    fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn user_ref(&self, id: &str) -> UserRef {
        UserRef {
            id: id.to_string(),
            username: self.user(id).map(|u| u.username.clone()).unwrap_or_default(),
        }
    }

    fn render_post(&self, record: &PostRecord, viewer: Option<&str>) -> PostBody {
        let likes: Vec<Like> = self
            .likes
            .iter()
            .filter(|like| like.likable_id == record.id)
            .cloned()
            .collect();
        let current_user_like = viewer.and_then(|viewer| likes.iter().find(|like| like.user == viewer).cloned());
        PostBody {
            id: record.id.clone(),
            user: self.user_ref(&record.author),
            caption: record.caption.clone(),
            image: record.image.clone(),
            likes,
            current_user_like,
            created_at: record.created_at,
            is_deleted: record.deleted,
        }
    }

    fn render_notification(&self, record: &NotificationRecord) -> NotificationBody {
        NotificationBody {
            id: record.id.clone(),
            kind: record.kind.clone(),
            user: self.user_ref(&record.actor),
            entity_id: record.entity_id.clone(),
            is_read: record.read,
            timestamp: record.timestamp,
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

/// A failed request, answered as `{"success": false, "message": ...}`.
#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    message: &'static str,
}

impl Failure {
    fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "success": false, "message": self.message }))).into_response()
    }
}

type Reply<T> = Result<T, Failure>;

fn viewer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn require_viewer(headers: &HeaderMap) -> Reply<String> {
    viewer(headers).ok_or_else(|| Failure::new(StatusCode::UNAUTHORIZED, "Authentication required"))
}

pub fn app() -> Router {
    app_with(Store::default())
}

pub fn app_with(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", put(mark_all_read))
        .route("/notifications/{id}/read", put(mark_read))
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", get(get_post).put(update_post).delete(delete_post))
        .route("/likes", post(create_like))
        .route("/likes/{id}", put(update_like).delete(delete_like))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/posts", get(list_user_posts))
        .route("/users/{id}/followers", get(list_followers))
        .route("/users/{id}/following", get(list_following))
        .route("/users/{id}/follow/{target}", post(follow).delete(unfollow))
        .with_state(db)
}

pub async fn run_with(listener: TcpListener, store: Store) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(store)).await
}

// --- notifications ---

async fn list_notifications(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Reply<Json<Value>> {
    let viewer = require_viewer(&headers)?;
    let store = db.read().await;
    let mine: Vec<NotificationBody> = store
        .notifications
        .iter()
        .filter(|n| n.recipient == viewer)
        .map(|n| store.render_notification(n))
        .collect();
    let (notifications, total) = query.window(mine);
    Ok(Json(json!({ "notifications": notifications, "total": total })))
}

async fn unread_count(State(db): State<Db>, headers: HeaderMap) -> Reply<Json<Value>> {
    let viewer = require_viewer(&headers)?;
    let store = db.read().await;
    let count = store
        .notifications
        .iter()
        .filter(|n| n.recipient == viewer && !n.read)
        .count();
    Ok(Json(json!({ "count": count })))
}

async fn mark_read(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> Reply<Json<Value>> {
    let viewer = require_viewer(&headers)?;
    let mut store = db.write().await;
    let record = store
        .notifications
        .iter_mut()
        .find(|n| n.id == id && n.recipient == viewer)
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "Notification not found"))?;
    record.read = true;
    Ok(Json(json!({ "success": true })))
}

async fn mark_all_read(State(db): State<Db>, headers: HeaderMap) -> Reply<Json<Value>> {
    let viewer = require_viewer(&headers)?;
    let mut store = db.write().await;
    let mut updated = 0;
    for record in store.notifications.iter_mut().filter(|n| n.recipient == viewer && !n.read) {
        record.read = true;
        updated += 1;
    }
    tracing::debug!(%viewer, updated, "marked all notifications read");
    Ok(Json(json!({ "success": true, "updated": updated })))
}

// --- posts ---

fn post_page(store: &Store, author: Option<&str>, viewer: Option<&str>, query: &PageQuery) -> Json<Value> {
    let posts: Vec<PostBody> = store
        .posts
        .iter()
        .filter(|p| author.map_or(true, |author| p.author == author))
        .map(|p| store.render_post(p, viewer))
        .collect();
    let (posts, total) = query.window(posts);
    Json(json!({ "posts": posts, "totalDocuments": total }))
}

async fn list_posts(State(db): State<Db>, headers: HeaderMap, Query(query): Query<PageQuery>) -> Json<Value> {
    let store = db.read().await;
    post_page(&store, None, viewer(&headers).as_deref(), &query)
}

async fn list_user_posts(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Reply<Json<Value>> {
    let store = db.read().await;
    if store.user(&id).is_none() {
        return Err(Failure::new(StatusCode::NOT_FOUND, "User not found"));
    }
    Ok(post_page(&store, Some(&id), viewer(&headers).as_deref(), &query))
}

async fn get_post(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> Reply<Json<Value>> {
    let store = db.read().await;
    let record = store
        .posts
        .iter()
        .find(|p| p.id == id && !p.deleted)
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "Post not found"))?;
    let post = store.render_post(record, viewer(&headers).as_deref());
    Ok(Json(json!({ "post": post })))
}

async fn create_post(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreatePost>,
) -> Reply<(StatusCode, Json<Value>)> {
    let viewer = require_viewer(&headers)?;
    if input.caption.trim().is_empty() && input.image_url.is_none() {
        return Err(Failure::new(StatusCode::BAD_REQUEST, "A post needs a caption or an image"));
    }
    let mut store = db.write().await;
    let id = store.add_post(&viewer, &input.caption);
    if let Some(record) = store.posts.first_mut() {
        record.image = input.image_url;
    }
    let post = store
        .posts
        .first()
        .map(|record| store.render_post(record, Some(&viewer)));
    tracing::debug!(%id, author = %viewer, "created post");
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "post": post }))))
}

async fn update_post(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<UpdatePost>,
) -> Reply<Json<Value>> {
    let viewer = require_viewer(&headers)?;
    let mut store = db.write().await;
    let record = store
        .posts
        .iter_mut()
        .find(|p| p.id == id && !p.deleted)
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "Post not found"))?;
    if record.author != viewer {
        return Err(Failure::new(StatusCode::FORBIDDEN, "Not your post"));
    }
    if let Some(caption) = input.caption {
        record.caption = caption;
    }
    if let Some(image) = input.image_url {
        record.image = Some(image);
    }
    let store = &*store;
    let post = store
        .posts
        .iter()
        .find(|p| p.id == id)
        .map(|record| store.render_post(record, Some(&viewer)));
    Ok(Json(json!({ "post": post })))
}

/// Soft delete: the post stays in listings flagged `isDeleted`.
async fn delete_post(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> Reply<StatusCode> {
    let viewer = require_viewer(&headers)?;
    let mut store = db.write().await;
    let record = store
        .posts
        .iter_mut()
        .find(|p| p.id == id && !p.deleted)
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "Post not found"))?;
    if record.author != viewer {
        return Err(Failure::new(StatusCode::FORBIDDEN, "Not your post"));
    }
    record.deleted = true;
    Ok(StatusCode::NO_CONTENT)
}

// --- likes ---

async fn create_like(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<ReactionInput>,
) -> Reply<(StatusCode, Json<Value>)> {
    let viewer = require_viewer(&headers)?;
    let mut store = db.write().await;
    let author = store
        .posts
        .iter()
        .find(|p| p.id == input.likable_id && !p.deleted)
        .map(|p| p.author.clone())
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "Post not found"))?;
    if store
        .likes
        .iter()
        .any(|like| like.user == viewer && like.likable_id == input.likable_id)
    {
        return Err(Failure::new(StatusCode::CONFLICT, "Already reacted"));
    }
    let like = Like {
        id: Uuid::new_v4().to_string(),
        user: viewer.clone(),
        on_model: input.on_model,
        likable_id: input.likable_id,
        like_type: input.like_type,
    };
    store.likes.push(like.clone());
    if author != viewer {
        store.notify(&author, "like", &viewer, Some(&like.likable_id));
    }
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "like": like }))))
}

async fn update_like(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<ReactionInput>,
) -> Reply<Json<Value>> {
    let viewer = require_viewer(&headers)?;
    let mut store = db.write().await;
    let like = store
        .likes
        .iter_mut()
        .find(|like| like.id == id)
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "Reaction not found"))?;
    if like.user != viewer {
        return Err(Failure::new(StatusCode::FORBIDDEN, "Not your reaction"));
    }
    like.like_type = input.like_type;
    Ok(Json(json!({ "success": true, "like": like.clone() })))
}

async fn delete_like(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> Reply<StatusCode> {
    let viewer = require_viewer(&headers)?;
    let mut store = db.write().await;
    let index = store
        .likes
        .iter()
        .position(|like| like.id == id)
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "Reaction not found"))?;
    if store.likes[index].user != viewer {
        return Err(Failure::new(StatusCode::FORBIDDEN, "Not your reaction"));
    }
    store.likes.remove(index);
    Ok(StatusCode::NO_CONTENT)
}

// --- users ---

async fn get_user(State(db): State<Db>, Path(id): Path<String>) -> Reply<Json<Value>> {
    let store = db.read().await;
    let user = store
        .user(&id)
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "User not found"))?;
    Ok(Json(json!({ "user": user })))
}

fn user_list(store: &Store, ids: &[String]) -> Vec<UserRef> {
    ids.iter().map(|id| store.user_ref(id)).collect()
}

async fn list_followers(State(db): State<Db>, Path(id): Path<String>) -> Reply<Json<Value>> {
    let store = db.read().await;
    let user = store
        .user(&id)
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "User not found"))?;
    Ok(Json(json!({ "followers": user_list(&store, &user.followers) })))
}

async fn list_following(State(db): State<Db>, Path(id): Path<String>) -> Reply<Json<Value>> {
    let store = db.read().await;
    let user = store
        .user(&id)
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "User not found"))?;
    Ok(Json(json!({ "users": user_list(&store, &user.following) })))
}

/// Checks shared by follow and unfollow: the caller acts as `id` on an
/// existing other user.
fn follow_pair(store: &Store, headers: &HeaderMap, id: &str, target: &str) -> Reply<()> {
    if require_viewer(headers)? != id {
        return Err(Failure::new(StatusCode::FORBIDDEN, "Cannot act for another user"));
    }
    if id == target {
        return Err(Failure::new(StatusCode::BAD_REQUEST, "Cannot follow yourself"));
    }
    if store.user(id).is_none() || store.user(target).is_none() {
        return Err(Failure::new(StatusCode::NOT_FOUND, "User not found"));
    }
    Ok(())
}

async fn follow(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((id, target)): Path<(String, String)>,
) -> Reply<Json<Value>> {
    let mut store = db.write().await;
    follow_pair(&store, &headers, &id, &target)?;
    let mut added = false;
    for user in store.users.iter_mut() {
        if user.id == id && !user.following.contains(&target) {
            user.following.push(target.clone());
            added = true;
        }
        if user.id == target && !user.followers.contains(&id) {
            user.followers.push(id.clone());
        }
    }
    if added {
        store.notify(&target, "follow", &id, None);
    }
    Ok(Json(json!({ "success": true })))
}

async fn unfollow(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((id, target)): Path<(String, String)>,
) -> Reply<Json<Value>> {
    let mut store = db.write().await;
    follow_pair(&store, &headers, &id, &target)?;
    for user in store.users.iter_mut() {
        if user.id == id {
            user.following.retain(|f| *f != target);
        }
        if user.id == target {
            user.followers.retain(|f| *f != id);
        }
    }
    Ok(Json(json!({ "success": true })))
}
