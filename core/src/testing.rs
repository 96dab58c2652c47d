//! Scripted in-memory `Transport` for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;

pub(crate) struct Reply {
    gate: Option<oneshot::Receiver<()>>,
    outcome: Result<HttpResponse, TransportError>,
}

impl Reply {
    pub(crate) fn json(status: u16, body: &str) -> Self {
        Self {
            gate: None,
            outcome: Ok(HttpResponse::new(status, body)),
        }
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            gate: None,
            outcome: Err(TransportError::Connect("connection refused".to_string())),
        }
    }

    /// Hold the reply until the returned sender fires (or is dropped).
    pub(crate) fn gated(mut self) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        self.gate = Some(rx);
        (self, tx)
    }

    fn reusable(&self) -> Option<Self> {
        if self.gate.is_some() {
            return None;
        }
        Some(Self {
            gate: None,
            outcome: self.outcome.clone(),
        })
    }
}

/// Replies are queued per (method, path-and-query). The last reply on a
/// route is reused unless it is gated.
#[derive(Default)]
pub(crate) struct StubTransport {
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn on(&self, method: HttpMethod, path: &str, reply: Reply) {
        self.routes
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Drop whatever is queued on the route and script `reply` instead.
    pub(crate) fn set(&self, method: HttpMethod, path: &str, reply: Reply) {
        let mut routes = self.routes.lock();
        let queue = routes.entry((method, path.to_string())).or_default();
        queue.clear();
        queue.push_back(reply);
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn count(&self, method: HttpMethod, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|req| req.method == method && path_of(&req.url) == path)
            .count()
    }
}

fn path_of(url: &str) -> &str {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[after_scheme..].find('/') {
        Some(i) => &url[after_scheme + i..],
        None => "/",
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let key = (request.method, path_of(&request.url).to_string());
        self.requests.lock().push(request);

        let reply = {
            let mut routes = self.routes.lock();
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => match queue.front().and_then(Reply::reusable) {
                    Some(copy) => Some(copy),
                    None => queue.pop_front(),
                },
                None => None,
            }
        };

        let Some(reply) = reply else {
            return Err(TransportError::Other(format!("no stub for {} {}", key.0, key.1)));
        };
        if let Some(gate) = reply.gate {
            let _ = gate.await;
        }
        reply.outcome
    }
}
