use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    future::Future,
    pin::Pin,
};

/// Initial payload delivered to a newly subscribed client.
pub enum InitialData {
    /// Send immediately, to the subscribing client only.
    Ready(Value),
    /// Resolve in the background. Membership is re-checked at resolution
    /// time, and a `None` outcome suppresses the send entirely.
    Deferred(Pin<Box<dyn Future<Output = Option<Value>> + Send>>),
}

impl InitialData {
    /// Wrap a future resolving to the initial payload.
    pub fn deferred<F>(fut: F) -> Self
    where
        F: Future<Output = Option<Value>> + Send + 'static,
    {
        Self::Deferred(Box::pin(fut))
    }
}

impl From<Value> for InitialData {
    fn from(value: Value) -> Self {
        Self::Ready(value)
    }
}

impl fmt::Debug for InitialData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Deferred(_) => f.debug_tuple("Deferred").finish_non_exhaustive(),
        }
    }
}

/// Bidirectional mapping between publish paths and subscribed clients.
///
/// Both directions are kept in lock-step under the server's state lock: a
/// `(client, path)` pairing is present in both maps or in neither, and
/// entries with no remaining members are pruned eagerly.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionRegistry {
    by_path: HashMap<String, HashSet<String>>,
    by_client: HashMap<String, HashSet<String>>,
}

impl SubscriptionRegistry {
    /// Record a pairing. Returns `false` when it was already present.
    pub(crate) fn insert(&mut self, client_id: &str, path: &str) -> bool {
        let added = self
            .by_path
            .entry(path.to_owned())
            .or_default()
            .insert(client_id.to_owned());
        if added {
            self.by_client
                .entry(client_id.to_owned())
                .or_default()
                .insert(path.to_owned());
        }
        added
    }

    /// Remove one pairing. Returns whether a change occurred.
    pub(crate) fn remove(&mut self, client_id: &str, path: &str) -> bool {
        let Some(clients) = self.by_path.get_mut(path) else {
            return false;
        };
        if !clients.remove(client_id) {
            return false;
        }
        if clients.is_empty() {
            self.by_path.remove(path);
        }
        if let Some(paths) = self.by_client.get_mut(client_id) {
            paths.remove(path);
            if paths.is_empty() {
                self.by_client.remove(client_id);
            }
        }
        true
    }

    /// Drop a path and every member on it. Returns whether anything was
    /// removed.
    pub(crate) fn remove_path(&mut self, path: &str) -> bool {
        let Some(clients) = self.by_path.remove(path) else {
            return false;
        };
        for client_id in clients {
            if let Some(paths) = self.by_client.get_mut(&client_id) {
                paths.remove(path);
                if paths.is_empty() {
                    self.by_client.remove(&client_id);
                }
            }
        }
        true
    }

    /// Drop every subscription of one client. Used on disconnect.
    pub(crate) fn remove_client(&mut self, client_id: &str) {
        let Some(paths) = self.by_client.remove(client_id) else {
            return;
        };
        for path in paths {
            if let Some(clients) = self.by_path.get_mut(&path) {
                clients.remove(client_id);
                if clients.is_empty() {
                    self.by_path.remove(&path);
                }
            }
        }
    }

    /// Whether the pairing is currently present.
    pub(crate) fn contains(&self, client_id: &str, path: &str) -> bool {
        self.by_path
            .get(path)
            .is_some_and(|clients| clients.contains(client_id))
    }

    /// Current members of a path.
    pub(crate) fn subscribers(&self, path: &str) -> Option<&HashSet<String>> {
        self.by_path.get(path)
    }

    #[cfg(test)]
    fn assert_symmetric(&self) {
        for (path, clients) in &self.by_path {
            assert!(!clients.is_empty(), "empty member set for {path}");
            for client in clients {
                assert!(
                    self.by_client[client].contains(path),
                    "{client} missing inverse entry for {path}"
                );
            }
        }
        for (client, paths) in &self.by_client {
            assert!(!paths.is_empty(), "empty path set for {client}");
            for path in paths {
                assert!(
                    self.by_path[path].contains(client),
                    "{path} missing entry for {client}"
                );
            }
        }
    }
}
