//! Deterministic fetcher over canned responses.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use offline_core::{url_path, RequestRecord, ResponseRecord, ResponseType, StoredResponse};

use crate::{FetchError, NetworkFetcher};

/// Fetcher answering from a table of canned responses.
///
/// Lookups try the exact URL first, then its path. Unknown URLs get a
/// same-origin `404`. Going offline makes every fetch fail with a connection
/// error; individual URLs can also be marked as failing. Every call is
/// counted, including failed ones.
#[derive(Debug)]
pub struct FixtureFetcher {
    routes: RwLock<HashMap<String, StoredResponse>>,
    failing: RwLock<HashSet<String>>,
    online: AtomicBool,
    calls: Mutex<HashMap<String, usize>>,
}

impl Default for FixtureFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureFetcher {
    /// Create an online fetcher with no routes.
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            online: AtomicBool::new(true),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Add a canned response.
    pub fn with_response(self, url: impl Into<String>, response: StoredResponse) -> Self {
        self.respond(url, response);
        self
    }

    /// Add a same-origin `200` response with the given body.
    pub fn with_body(self, url: impl Into<String>, body: impl AsRef<[u8]>) -> Self {
        self.respond(url, ok_response(body.as_ref()));
        self
    }

    /// Register or replace a canned response.
    pub fn respond(&self, url: impl Into<String>, response: StoredResponse) {
        if let Ok(mut routes) = self.routes.write() {
            routes.insert(url.into(), response);
        }
    }

    /// Make fetches of one URL fail with a connection error.
    pub fn fail_url(&self, url: impl Into<String>) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(url.into());
        }
    }

    /// Switch the network on or off.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Check whether the network is on.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of fetches issued for a URL.
    pub fn call_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of fetches issued overall.
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }

    fn record_call(&self, url: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(url.to_string()).or_insert(0) += 1;
        }
    }

    fn lookup(&self, url: &str) -> Option<StoredResponse> {
        let routes = self.routes.read().ok()?;
        routes
            .get(url)
            .or_else(|| routes.get(url_path(url)))
            .cloned()
    }
}

#[async_trait]
impl NetworkFetcher for FixtureFetcher {
    async fn fetch(&self, request: &RequestRecord) -> Result<ResponseRecord, FetchError> {
        let url = request.url();
        self.record_call(url);

        if !self.is_online() {
            return Err(FetchError::Connection(format!("offline: {}", url)));
        }

        let failing = self
            .failing
            .read()
            .map(|failing| failing.contains(url) || failing.contains(url_path(url)))
            .unwrap_or(false);
        if failing {
            return Err(FetchError::Connection(format!("unreachable: {}", url)));
        }

        Ok(match self.lookup(url) {
            Some(stored) => stored.to_response(),
            None => ResponseRecord::new(404, ResponseType::Basic, "Not Found"),
        })
    }
}

/// A same-origin `200` snapshot.
pub fn ok_response(body: &[u8]) -> StoredResponse {
    StoredResponse {
        status: 200,
        response_type: ResponseType::Basic,
        headers: Default::default(),
        body: body.to_vec(),
    }
}
