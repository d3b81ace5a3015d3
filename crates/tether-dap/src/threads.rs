//! Thread registry
//!
//! The debugger has no OS threads; each paused remote request is presented to
//! the client as one DAP thread. The registry maps monotonically increasing
//! protocol thread ids to remote request ids, both directions. Ids are never
//! reused within a session, so a stale thread id from the client resolves to
//! nothing instead of silently addressing a newer request.

use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct ThreadRegistry {
    by_thread: BTreeMap<i64, String>,
    by_request: HashMap<String, i64>,
    next_id: i64,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self {
            by_thread: BTreeMap::new(),
            by_request: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a remote request and return its thread id. Re-registering an
    /// already tracked request returns the existing id.
    pub fn track(&mut self, request_id: &str) -> i64 {
        if let Some(id) = self.by_request.get(request_id) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.by_thread.insert(id, request_id.to_string());
        self.by_request.insert(request_id.to_string(), id);
        id
    }

    /// Drop a finished request. Returns the thread id it occupied, which is
    /// retired permanently.
    pub fn release(&mut self, request_id: &str) -> Option<i64> {
        let id = self.by_request.remove(request_id)?;
        self.by_thread.remove(&id);
        Some(id)
    }

    pub fn request_for(&self, thread_id: i64) -> Option<&str> {
        self.by_thread.get(&thread_id).map(String::as_str)
    }

    pub fn thread_for(&self, request_id: &str) -> Option<i64> {
        self.by_request.get(request_id).copied()
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.by_request.contains_key(request_id)
    }

    /// Live threads in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.by_thread.iter().map(|(id, req)| (*id, req.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.by_thread.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_thread.clear();
        self.by_request.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_is_idempotent() {
        let mut registry = ThreadRegistry::new();
        let a = registry.track("07nAAA");
        assert_eq!(registry.track("07nAAA"), a);
        assert_eq!(registry.iter().count(), 1);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut registry = ThreadRegistry::new();
        let a = registry.track("07nAAA");
        assert_eq!(registry.release("07nAAA"), Some(a));
        let b = registry.track("07nBBB");
        assert!(b > a);
        assert!(registry.request_for(a).is_none());
    }

    #[test]
    fn test_bidirectional_lookup() {
        let mut registry = ThreadRegistry::new();
        let id = registry.track("07nAAA");
        assert_eq!(registry.request_for(id), Some("07nAAA"));
        assert_eq!(registry.thread_for("07nAAA"), Some(id));
    }

    #[test]
    fn test_release_unknown_request_is_none() {
        let mut registry = ThreadRegistry::new();
        assert_eq!(registry.release("07nZZZ"), None);
    }

    #[test]
    fn test_iteration_order_is_ascending() {
        let mut registry = ThreadRegistry::new();
        registry.track("07nAAA");
        registry.track("07nBBB");
        registry.track("07nCCC");
        registry.release("07nBBB");
        let ids: Vec<i64> = registry.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
