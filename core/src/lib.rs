//! Client core for the social feed service.
//!
//! # Overview
//! `FeedClient` builds `HttpRequest` values and parses `HttpResponse` values
//! without touching the network. A `Transport` executes the round-trip and
//! `FeedService` joins the two, turning every failure into a `ServiceError`
//! with a message fit to show.
//!
//! On top of the service sit the UI-facing state holders:
//! - `FollowToggle` and `ReactionToggle` apply a predicted state at once and
//!   roll back exactly if the server refuses.
//! - `PostFeed` and `NotificationFeed` page through offset-cursor lists;
//!   the notification feed also polls its unread count.
//! - `PostDetail` and `FollowList` load one entity or list and drop
//!   responses that arrive out of order.
//!
//! # Design
//! - Response shapes vary by endpoint and server version; all of that is
//!   absorbed in `normalize`, so the rest of the crate sees one canonical
//!   type per concept.
//! - State lives behind `parking_lot::Mutex` and is never locked across an
//!   `.await`.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod activity;
pub mod client;
pub mod config;
pub mod error;
pub mod follow;
pub mod follow_list;
pub mod generation;
pub mod guard;
pub mod http;
mod normalize;
pub mod notifications;
pub mod optimistic;
pub mod pagination;
pub mod post;
pub mod posts;
pub mod reaction;
pub mod service;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use client::{FeedClient, FollowDirection};
pub use config::ClientConfig;
pub use error::{ApiError, ConfigError, FailureKind, ServiceError, TransportError};
pub use follow::{FollowState, FollowToggle, FollowView};
pub use follow_list::FollowList;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use notifications::{NotificationFeed, NotificationOptions, NotificationsView};
pub use optimistic::ToggleOutcome;
pub use pagination::{LoadPhase, PageView};
pub use post::{PostDetail, PostDetailView};
pub use posts::PostFeed;
pub use reaction::{ReactionState, ReactionToggle};
pub use service::{FeedService, ServiceResult};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    ActivityKind, NewPost, Notification, Page, Post, PostPatch, Reaction, ReactionKind, ReactionTarget, UserProfile,
    UserSummary,
};
