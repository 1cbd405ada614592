//! Durable storage of the counter record.
//!
//! The record lives under `{id: "visitor_count_id"}` and keeps its value in
//! the `visitor_count` attribute. A missing record reads as `None`; both
//! writes create it on demand.

use crate::error::StoreError;
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

mod dynamo;

pub use dynamo::DynamoStore;

/// Partition key attribute of the counter table.
pub const KEY_ATTRIBUTE: &str = "id";
/// Key value of the single counter record.
pub const COUNTER_ID: &str = "visitor_count_id";
/// Attribute holding the count.
pub const COUNT_ATTRIBUTE: &str = "visitor_count";

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current value of counter `id`, `None` when the record or attribute is absent.
    async fn fetch(&self, id: &str) -> Result<Option<u64>, StoreError>;

    /// Overwrites counter `id` with `value`, returning the committed value.
    async fn update(&self, id: &str, value: u64) -> Result<u64, StoreError>;

    /// Atomically adds `delta` to counter `id`, returning the committed value.
    ///
    /// An add that would pass `u64::MAX` fails with [`StoreError::Overflow`]
    /// and leaves the stored value unchanged.
    async fn add(&self, id: &str, delta: u64) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S: CounterStore + ?Sized> CounterStore for Arc<S> {
    async fn fetch(&self, id: &str) -> Result<Option<u64>, StoreError> {
        (**self).fetch(id).await
    }

    async fn update(&self, id: &str, value: u64) -> Result<u64, StoreError> {
        (**self).update(id, value).await
    }

    async fn add(&self, id: &str, delta: u64) -> Result<u64, StoreError> {
        (**self).add(id, delta).await
    }
}

/// Process-local store, used for tests and local runs against the simulated runtime.
#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose counter `id` already holds `value`.
    pub fn with_counter(id: &str, value: u64) -> Self {
        let mut counters = HashMap::new();
        counters.insert(id.to_owned(), value);
        Self {
            counters: Mutex::new(counters),
        }
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn fetch(&self, id: &str) -> Result<Option<u64>, StoreError> {
        Ok(self.counters.lock().await.get(id).copied())
    }

    async fn update(&self, id: &str, value: u64) -> Result<u64, StoreError> {
        self.counters.lock().await.insert(id.to_owned(), value);
        Ok(value)
    }

    async fn add(&self, id: &str, delta: u64) -> Result<u64, StoreError> {
        let mut counters = self.counters.lock().await;
        let count = counters.entry(id.to_owned()).or_insert(0);
        *count = count.checked_add(delta).ok_or(StoreError::Overflow)?;
        Ok(*count)
    }
}
