//! Activity feed: paginated notifications plus a polled unread count.
//!
//! Read-state changes are applied locally only after the server accepts
//! them. The unread count is refreshed by a background poller that lives
//! exactly as long as the feed; the poller only holds a weak reference, so
//! a tick that races the feed being dropped does nothing.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::ClientConfig;
use crate::generation::{Generation, Token};
use crate::guard::InFlight;
use crate::pagination::{FetchTicket, LoadPhase, Paginated};
use crate::service::{FeedService, ServiceResult};
use crate::types::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationOptions {
    pub page_size: usize,
    /// `None` disables polling.
    pub poll_interval: Option<Duration>,
}

impl Default for NotificationOptions {
    fn default() -> Self {
        let config = ClientConfig::default();
        Self::from(&config)
    }
}

impl From<&ClientConfig> for NotificationOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            page_size: config.page_size,
            poll_interval: config.poll_interval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationsView {
    pub notifications: Vec<Notification>,
    pub total: usize,
    pub has_more: bool,
    pub unread_count: u64,
    pub phase: LoadPhase,
    pub loading: bool,
    pub error: Option<String>,
}

struct FeedState {
    page: Paginated<Notification>,
    unread_count: u64,
    unread_generation: Generation,
}

impl FeedState {
    fn begin_unread(&mut self) -> Token {
        self.unread_generation.next()
    }

    fn finish_unread(&mut self, token: Token, result: ServiceResult<u64>) {
        if !self.unread_generation.is_current(token) {
            return;
        }
        // A failed poll keeps the last known count.
        if let Ok(count) = result {
            self.unread_count = count;
        }
    }
}

/// Aborts the polling task when dropped.
struct Poller(JoinHandle<()>);

impl Drop for Poller {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct NotificationFeed {
    service: FeedService,
    options: NotificationOptions,
    state: Arc<Mutex<FeedState>>,
    poller: Mutex<Option<Poller>>,
}

impl NotificationFeed {
    /// An idle feed; nothing is fetched until asked.
    pub fn new(service: FeedService, options: NotificationOptions) -> Self {
        Self {
            service,
            options,
            state: Arc::new(Mutex::new(FeedState {
                page: Paginated::new(options.page_size),
                unread_count: 0,
                unread_generation: Generation::new(),
            })),
            poller: Mutex::new(None),
        }
    }

    /// Fetch the first page and the unread count, then start polling.
    pub async fn mount(service: FeedService, options: NotificationOptions) -> Self {
        let feed = Self::new(service, options);
        feed.refresh().await;
        feed.start_polling();
        feed
    }

    pub fn view(&self) -> NotificationsView {
        let state = self.state.lock();
        let page = state.page.view();
        NotificationsView {
            notifications: page.items,
            total: page.total,
            has_more: page.has_more,
            unread_count: state.unread_count,
            phase: page.phase,
            loading: page.loading,
            error: page.error,
        }
    }

    pub async fn fetch_page(&self, reset: bool) {
        let ticket = self.state.lock().page.begin_fetch(reset);
        if !self.run_fetch(ticket).await {
            tracing::debug!(offset = ticket.offset, "dropping superseded notification page");
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
            .list_notifications(ticket.offset, ticket.limit)
            .await
            .map_err(|err| err.message);
        in_flight.complete();
        self.state.lock().page.finish_fetch(ticket, result, |_| true)
    }

    pub async fn refresh(&self) {
        self.fetch_page(true).await;
        self.fetch_unread_count().await;
    }

    pub async fn fetch_unread_count(&self) {
        refresh_unread(&self.state, &self.service).await;
    }

    pub async fn mark_read(&self, id: &str) -> ServiceResult<()> {
        if let Err(err) = self.service.mark_notification_read(id).await {
            self.state.lock().page.set_error(err.message.clone());
            return Err(err);
        }

        let mut state = self.state.lock();
        let mut was_unread = true;
        state.page.items_mut().update(id, |notification| {
            was_unread = !notification.read;
            notification.read = true;
        });
        if was_unread {
            state.unread_count = state.unread_count.saturating_sub(1);
        }
        state.unread_generation.invalidate();
        Ok(())
    }

    pub async fn mark_all_read(&self) -> ServiceResult<()> {
        if let Err(err) = self.service.mark_all_notifications_read().await {
            self.state.lock().page.set_error(err.message.clone());
            return Err(err);
        }

        let mut state = self.state.lock();
        state.page.items_mut().update_all(|notification| notification.read = true);
        state.unread_count = 0;
        // A poll that started before this point would resurrect a stale count.
        state.unread_generation.invalidate();
        Ok(())
    }

    /// Start the unread-count poller. Returns false when polling is
    /// disabled, already running, or there is no tokio runtime.
    pub fn start_polling(&self) -> bool {
        let Some(every) = self.options.poll_interval.filter(|d| !d.is_zero()) else {
            return false;
        };
        let mut poller = self.poller.lock();
        if poller.is_some() {
            return false;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no tokio runtime; unread count will not be polled");
            return false;
        };
        let handle = runtime.spawn(poll_unread(Arc::downgrade(&self.state), self.service.clone(), every));
        *poller = Some(Poller(handle));
        true
    }

    pub fn stop_polling(&self) {
        self.poller.lock().take();
    }

    pub fn is_polling(&self) -> bool {
        self.poller.lock().is_some()
    }
}

async fn refresh_unread(state: &Mutex<FeedState>, service: &FeedService) {
    let token = state.lock().begin_unread();
    let result = service.unread_count().await;
    state.lock().finish_unread(token, result);
}

async fn poll_unread(state: Weak<Mutex<FeedState>>, service: FeedService, every: Duration) {
    let mut ticker = time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(token) = state.upgrade().map(|state| state.lock().begin_unread()) else {
            break;
        };
        let result = service.unread_count().await;
        let Some(strong) = state.upgrade() else {
            break;
        };
        strong.lock().finish_unread(token, result);
    }
}
