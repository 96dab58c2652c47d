//! Render helpers for notification rows.

use chrono::{DateTime, Utc};

use crate::types::{ActivityKind, Notification};

/// Where tapping a row leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityLink {
    User(String),
    Post(String),
    /// The activity page itself.
    Feed,
}

impl ActivityLink {
    pub fn path(&self) -> String {
        match self {
            ActivityLink::User(id) => format!("/profile/{id}"),
            ActivityLink::Post(id) => format!("/post/{id}"),
            ActivityLink::Feed => "/activity".to_string(),
        }
    }
}

pub fn summary(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::Like => "liked your post",
        ActivityKind::Comment => "commented on your post",
        ActivityKind::Follow => "started following you",
        ActivityKind::Other => "interacted with your content",
    }
}

pub fn link(notification: &Notification) -> ActivityLink {
    if notification.kind == ActivityKind::Follow {
        if let Some(actor) = notification.actor.as_ref().filter(|a| !a.id.is_empty()) {
            return ActivityLink::User(actor.id.clone());
        }
    }
    match notification.target_post_id() {
        Some(id) => ActivityLink::Post(id.to_string()),
        None => ActivityLink::Feed,
    }
}

/// Compact age: minutes under an hour, hours under a day, then days.
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - at).num_minutes().max(0);
    if minutes < 60 {
        format!("{minutes}m ago")
    } else if minutes < 60 * 24 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / (60 * 24))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRow {
    pub id: String,
    pub actor: String,
    pub summary: &'static str,
    pub link: ActivityLink,
    pub unread: bool,
    pub age: Option<String>,
}

impl ActivityRow {
    pub fn new(notification: &Notification, now: DateTime<Utc>) -> Self {
        let actor = notification
            .actor
            .as_ref()
            .map(|a| a.display_name())
            .filter(|name| !name.is_empty())
            .unwrap_or("Someone");
        Self {
            id: notification.id.clone(),
            actor: actor.to_string(),
            summary: summary(notification.kind),
            link: link(notification),
            unread: !notification.read,
            age: notification.created_at.map(|at| relative_time(at, now)),
        }
    }

    pub fn text(&self) -> String {
        format!("{} {}", self.actor, self.summary)
    }
}
