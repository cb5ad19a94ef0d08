use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Error types for key-value storage operations
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("value at key {0} is not a number")]
    NotANumber(String),

    #[error("value at key {0} is not a list")]
    NotAList(String),
}

/// Key-value storage with per-key atomicity
///
/// Single-key numeric and list operations are atomic; callers that need
/// multi-key invariants must build them on top of these primitives.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Sets the key only if absent. Returns true if the value was written.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StorageError>;

    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Atomically adds `delta` to the integer at `key` (missing key counts
    /// as zero) and returns the new value.
    async fn increment(&self, key: &str, delta: i64) -> Result<i64, StorageError>;

    /// Atomically subtracts `delta` from the integer at `key` and returns
    /// the new value.
    async fn decrement(&self, key: &str, delta: i64) -> Result<i64, StorageError>;

    /// Pushes a value to the front of the list at `key`, creating it if
    /// needed, then truncates the list to `max_len` entries.
    async fn push_front_trimmed(
        &self,
        key: &str,
        value: &str,
        max_len: usize,
    ) -> Result<(), StorageError>;

    /// Returns list entries in `[start, start + count)` order, front first.
    async fn list_range(
        &self,
        key: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<String>, StorageError>;
}

#[derive(Debug, Clone)]
enum Slot {
    Value(String),
    List(Vec<String>),
}

/// In-process store backed by a single locked map
///
/// Every operation holds the write lock for its full duration, which gives
/// the per-key atomicity the trait requires. Swappable for a Redis-style
/// backend without touching callers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: Arc<RwLock<HashMap<String, Slot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let slots = self.slots.read().await;
        match slots.get(key) {
            Some(Slot::Value(v)) => Ok(Some(v.clone())),
            Some(Slot::List(_)) => Err(StorageError::NotANumber(key.to_string())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut slots = self.slots.write().await;
        slots.insert(key.to_string(), Slot::Value(value.to_string()));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StorageError> {
        let mut slots = self.slots.write().await;
        if slots.contains_key(key) {
            return Ok(false);
        }
        slots.insert(key.to_string(), Slot::Value(value.to_string()));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let mut slots = self.slots.write().await;
        Ok(slots.remove(key).is_some())
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64, StorageError> {
        let mut slots = self.slots.write().await;
        let current = match slots.get(key) {
            Some(Slot::Value(v)) => v
                .parse::<i64>()
                .map_err(|_| StorageError::NotANumber(key.to_string()))?,
            Some(Slot::List(_)) => return Err(StorageError::NotANumber(key.to_string())),
            None => 0,
        };
        let updated = current + delta;
        slots.insert(key.to_string(), Slot::Value(updated.to_string()));
        debug!("🔢 {} {} -> {}", key, current, updated);
        Ok(updated)
    }

    async fn decrement(&self, key: &str, delta: i64) -> Result<i64, StorageError> {
        self.increment(key, -delta).await
    }

    async fn push_front_trimmed(
        &self,
        key: &str,
        value: &str,
        max_len: usize,
    ) -> Result<(), StorageError> {
        let mut slots = self.slots.write().await;
        let list = match slots
            .entry(key.to_string())
            .or_insert_with(|| Slot::List(Vec::new()))
        {
            Slot::List(list) => list,
            Slot::Value(_) => return Err(StorageError::NotAList(key.to_string())),
        };
        list.insert(0, value.to_string());
        list.truncate(max_len);
        Ok(())
    }

    async fn list_range(
        &self,
        key: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<String>, StorageError> {
        let slots = self.slots.read().await;
        match slots.get(key) {
            Some(Slot::List(list)) => Ok(list
                .iter()
                .skip(start)
                .take(count)
                .cloned()
                .collect()),
            Some(Slot::Value(_)) => Err(StorageError::NotAList(key.to_string())),
            None => Ok(Vec::new()),
        }
    }
}
