//! Followers / following list for one user.

use parking_lot::Mutex;

use crate::client::FollowDirection;
use crate::generation::Generation;
use crate::guard::InFlight;
use crate::service::FeedService;
use crate::types::UserSummary;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FollowListView {
    pub users: Vec<UserSummary>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct ListState {
    users: Vec<UserSummary>,
    loading: bool,
    error: Option<String>,
    generation: Generation,
}

pub struct FollowList {
    service: FeedService,
    direction: FollowDirection,
    state: Mutex<ListState>,
}

impl FollowList {
    pub fn new(service: FeedService, direction: FollowDirection) -> Self {
        Self {
            service,
            direction,
            state: Mutex::new(ListState::default()),
        }
    }

    pub fn direction(&self) -> FollowDirection {
        self.direction
    }

    pub fn view(&self) -> FollowListView {
        let state = self.state.lock();
        FollowListView {
            users: state.users.clone(),
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    /// Load the list for `user_id`. A failure leaves the list empty.
    pub async fn load(&self, user_id: &str) {
        if user_id.is_empty() {
            return;
        }
        let token = {
            let mut state = self.state.lock();
            state.loading = true;
            state.error = None;
            state.generation.next()
        };
        let in_flight = InFlight::new(|| {
            let mut state = self.state.lock();
            if state.generation.is_current(token) {
                state.generation.invalidate();
                state.loading = false;
            }
        });
        let result = self.service.list_follows(user_id, self.direction).await;
        in_flight.complete();

        let mut state = self.state.lock();
        if !state.generation.is_current(token) {
            return;
        }
        state.loading = false;
        match result {
            Ok(users) => state.users = users,
            Err(err) => {
                state.users.clear();
                state.error = Some(err.message);
            }
        }
    }
}
