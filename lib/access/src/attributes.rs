//! Two-tier session attribute storage.
//!
//! [`DurableAttributes`] hold JSON values that travel with the session when
//! it is replicated. [`LocalAttributes`] hold arbitrary in-process values and
//! have no serialized form at all, so they cannot leak across a process
//! boundary. Both tiers are last-writer-wins per key.

use parking_lot::RwLock;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Attribute values that are replicated with the session.
#[derive(Debug, Default)]
pub struct DurableAttributes {
    values: RwLock<HashMap<String, Value>>,
}

impl DurableAttributes {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `name`, replacing any previous value.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.write().insert(name.into(), value.into());
    }

    /// Returns a copy of the value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.read().get(name).cloned()
    }

    /// Removes and returns the value stored under `name`.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.values.write().remove(name)
    }

    /// Returns the names currently stored.
    #[must_use]
    pub fn names(&self) -> BTreeSet<String> {
        self.values.read().keys().cloned().collect()
    }

    /// Returns a copy of every name and value.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values
            .read()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Rebuilds a store from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: BTreeMap<String, Value>) -> Self {
        Self {
            values: RwLock::new(snapshot.into_iter().collect()),
        }
    }
}

/// A process-local attribute value.
pub type LocalValue = Arc<dyn Any + Send + Sync>;

/// Attribute values confined to the current process.
#[derive(Default)]
pub struct LocalAttributes {
    values: RwLock<HashMap<String, LocalValue>>,
}

impl LocalAttributes {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `name`, replacing any previous value.
    pub fn set<T>(&self, name: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.values.write().insert(name.into(), Arc::new(value));
    }

    /// Returns the value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<LocalValue> {
        self.values.read().get(name).cloned()
    }

    /// Returns the value stored under `name` if it has type `T`.
    #[must_use]
    pub fn get_as<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.get(name).and_then(|value| value.downcast::<T>().ok())
    }

    /// Removes and returns the value stored under `name`.
    pub fn remove(&self, name: &str) -> Option<LocalValue> {
        self.values.write().remove(name)
    }

    /// Returns the names currently stored.
    #[must_use]
    pub fn names(&self) -> BTreeSet<String> {
        self.values.read().keys().cloned().collect()
    }
}

impl fmt::Debug for LocalAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalAttributes")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn durable_set_get_remove() {
        let store = DurableAttributes::new();
        store.set("region", "emea");
        store.set("limit", 250);

        assert_eq!(store.get("region"), Some(json!("emea")));
        assert_eq!(store.get("limit"), Some(json!(250)));
        assert_eq!(store.remove("region"), Some(json!("emea")));
        assert_eq!(store.get("region"), None);
        assert_eq!(store.remove("region"), None);
    }

    #[test]
    fn durable_last_writer_wins() {
        let store = DurableAttributes::new();
        store.set("region", "emea");
        store.set("region", "apac");
        assert_eq!(store.get("region"), Some(json!("apac")));
    }

    #[test]
    fn names_are_a_snapshot() {
        let store = DurableAttributes::new();
        store.set("a", 1);
        let names = store.names();
        store.set("b", 2);

        assert_eq!(names.len(), 1);
        assert_eq!(store.names().len(), 2);
    }

    #[test]
    fn durable_snapshot_roundtrip() {
        let store = DurableAttributes::new();
        store.set("region", "emea");
        store.set("tags", json!(["a", "b"]));

        let restored = DurableAttributes::from_snapshot(store.snapshot());
        assert_eq!(restored.snapshot(), store.snapshot());
    }

    #[test]
    fn local_values_keep_their_type() {
        struct Connection {
            port: u16,
        }

        let store = LocalAttributes::new();
        store.set("conn", Connection { port: 5432 });

        let conn = store.get_as::<Connection>("conn").expect("typed value");
        assert_eq!(conn.port, 5432);
        assert!(store.get_as::<String>("conn").is_none());
        assert!(store.get("conn").is_some());
    }

    #[test]
    fn local_remove_and_names() {
        let store = LocalAttributes::new();
        store.set("a", 1_u8);
        store.set("b", "two".to_string());

        assert_eq!(store.names().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(store.remove("a").is_some());
        assert!(store.remove("a").is_none());
        assert_eq!(store.names().len(), 1);
    }
}
