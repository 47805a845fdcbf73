//! Open clients and which version controls them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Identifier of an open client (a tab or window).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Registry of clients a version can take control of.
pub trait ClientRegistry: Send + Sync {
    /// Make `version` the controller of every open client.
    ///
    /// Returns the number of clients that changed controller.
    fn claim(&self, version: &str) -> usize;
}

/// In-memory client registry.
#[derive(Debug, Default)]
pub struct ClientSet {
    clients: RwLock<BTreeMap<ClientId, Option<String>>>,
    next_id: AtomicU64,
}

impl ClientSet {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new uncontrolled client.
    pub fn open(&self) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        if let Ok(mut clients) = self.clients.write() {
            clients.insert(id, None);
        }
        id
    }

    /// Remove a client. Returns whether it was open.
    pub fn close(&self, id: ClientId) -> bool {
        self.clients
            .write()
            .map(|mut clients| clients.remove(&id).is_some())
            .unwrap_or(false)
    }

    /// The version controlling a client, if any.
    pub fn controller(&self, id: ClientId) -> Option<String> {
        self.clients.read().ok()?.get(&id).cloned().flatten()
    }

    /// Number of open clients.
    pub fn len(&self) -> usize {
        self.clients.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Check whether no clients are open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of clients controlled by `version`.
    pub fn controlled_by(&self, version: &str) -> usize {
        self.clients
            .read()
            .map(|clients| {
                clients
                    .values()
                    .filter(|controller| controller.as_deref() == Some(version))
                    .count()
            })
            .unwrap_or(0)
    }
}

impl ClientRegistry for ClientSet {
    fn claim(&self, version: &str) -> usize {
        let Ok(mut clients) = self.clients.write() else {
            return 0;
        };

        let mut claimed = 0;
        for controller in clients.values_mut() {
            if controller.as_deref() != Some(version) {
                *controller = Some(version.to_string());
                claimed += 1;
            }
        }
        claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_close() {
        let clients = ClientSet::new();
        let a = clients.open();
        let b = clients.open();
        assert_ne!(a, b);
        assert_eq!(clients.len(), 2);

        assert!(clients.close(a));
        assert!(!clients.close(a));
        assert_eq!(clients.len(), 1);
        assert_eq!(clients.controller(a), None);
    }

    #[test]
    fn test_claim_takes_every_client() {
        let clients = ClientSet::new();
        let a = clients.open();
        let b = clients.open();
        clients.claim("v2");

        let c = clients.open();
        assert_eq!(clients.controller(c), None);

        assert_eq!(clients.claim("v4"), 3);
        assert_eq!(clients.controlled_by("v4"), 3);
        assert_eq!(clients.controller(a).as_deref(), Some("v4"));
        assert_eq!(clients.controller(b).as_deref(), Some("v4"));
    }

    #[test]
    fn test_claim_is_idempotent() {
        let clients = ClientSet::new();
        clients.open();
        assert_eq!(clients.claim("v4"), 1);
        assert_eq!(clients.claim("v4"), 0);
    }
}
