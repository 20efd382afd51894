//! Request cache for remote query operations.
//!
//! Entries are keyed by (operation name, serialized arguments). A
//! per-key async mutex de-duplicates in-flight work: the first caller
//! computes while later identical callers wait on the lock, then reuse
//! the stored value without a second delegated call. Invalidation is by
//! named tag, never by key pattern. Errors are recorded in the exposed
//! state but not cached, so the next identical call refetches.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use super::OpError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    op: &'static str,
    args: String,
}

impl QueryKey {
    fn new<A: Serialize>(op: &'static str, args: &A) -> Result<Self, OpError> {
        let args = serde_json::to_string(args).map_err(|e| {
            OpError::Delegated(format!("failed to serialize arguments for {op}: {e}"))
        })?;
        Ok(Self { op, args })
    }
}

/// Observable lifecycle of one cached query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Loading,
    Success,
    Error(String),
}

type Slot = Arc<Mutex<Option<serde_json::Value>>>;

#[derive(Default)]
pub struct QueryCache {
    slots: DashMap<QueryKey, Slot>,
    states: DashMap<QueryKey, QueryState>,
    tags: DashMap<&'static str, HashSet<QueryKey>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `fetch` unless an identical (op, args) call already cached a
    /// value. Concurrent identical calls share one delegated call.
    pub async fn fetch<A, T, F, Fut>(
        &self,
        op: &'static str,
        args: &A,
        tags: &[&'static str],
        fetch: F,
    ) -> Result<T, OpError>
    where
        A: Serialize,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, OpError>>,
    {
        let key = QueryKey::new(op, args)?;
        for &tag in tags {
            self.tags.entry(tag).or_default().insert(key.clone());
        }
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .value()
            .clone();

        let mut value = slot.lock().await;
        if let Some(cached) = value.as_ref() {
            return serde_json::from_value(cached.clone()).map_err(|e| {
                OpError::Delegated(format!("cached {op} result was unreadable: {e}"))
            });
        }

        self.states.insert(key.clone(), QueryState::Loading);
        match fetch().await {
            Ok(result) => {
                let cached = serde_json::to_value(&result).map_err(|e| {
                    OpError::Delegated(format!("failed to cache {op} result: {e}"))
                })?;
                *value = Some(cached);
                self.states.insert(key, QueryState::Success);
                Ok(result)
            }
            Err(e) => {
                self.states.insert(key, QueryState::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Current state for (op, args); `Idle` when the query never ran.
    pub fn state<A: Serialize>(&self, op: &'static str, args: &A) -> QueryState {
        QueryKey::new(op, args)
            .ok()
            .and_then(|key| self.states.get(&key).map(|state| state.value().clone()))
            .unwrap_or(QueryState::Idle)
    }

    /// Evicts every query registered under `tag`; each refetches on its
    /// next call.
    pub fn invalidate_tag(&self, tag: &str) {
        if let Some((_, keys)) = self.tags.remove(tag) {
            for key in keys {
                self.slots.remove(&key);
                self.states.remove(&key);
            }
        }
    }
}
