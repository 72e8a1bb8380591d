use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::OnceCell;

/// Lifecycle of one named lookup resource.
///
/// `Fetching → Ready`, or `Fetching → Failed → Fetching` on the next call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LookupState {
    Fetching,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupError {
    pub resource: String,
    pub message: String,
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lookup `{}` failed: {}", self.resource, self.message)
    }
}

impl std::error::Error for LookupError {}

#[derive(Debug)]
struct LookupEntry {
    cell: OnceCell<Arc<Value>>,
    state: Mutex<LookupState>,
}

impl LookupEntry {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            state: Mutex::new(LookupState::Fetching),
        }
    }
}

/// Memoized fetch cache for static lookup documents (service directories,
/// code lists), keyed by resource name.
///
/// Each resource is fetched at most once concurrently; a success is kept
/// until [`invalidate`](Self::invalidate), a failure is retried by the next
/// caller. Entries are kept in a `BTreeMap` for stable traversal order.
#[derive(Debug, Default)]
pub struct LookupCache {
    entries: Mutex<BTreeMap<String, Arc<LookupEntry>>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn state(&self, resource: &str) -> Option<LookupState> {
        let entry = self.entries.lock().get(resource).cloned()?;
        let state = *entry.state.lock();
        Some(state)
    }

    /// The cached document, if the resource is ready.
    pub fn get(&self, resource: &str) -> Option<Arc<Value>> {
        let entry = self.entries.lock().get(resource).cloned()?;
        entry.cell.get().cloned()
    }

    pub async fn get_or_fetch<F, Fut>(
        &self,
        resource: &str,
        fetch: F,
    ) -> Result<Arc<Value>, LookupError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, String>>,
    {
        let entry = self
            .entries
            .lock()
            .entry(resource.to_string())
            .or_insert_with(|| Arc::new(LookupEntry::new()))
            .clone();

        let result = entry
            .cell
            .get_or_try_init(|| {
                *entry.state.lock() = LookupState::Fetching;
                tracing::debug!(resource, "fetching lookup resource");
                async move { fetch().await.map(Arc::new) }
            })
            .await;

        match result {
            Ok(value) => {
                *entry.state.lock() = LookupState::Ready;
                Ok(value.clone())
            }
            Err(message) => {
                *entry.state.lock() = LookupState::Failed;
                tracing::warn!(resource, %message, "lookup resource fetch failed");
                Err(LookupError {
                    resource: resource.to_string(),
                    message,
                })
            }
        }
    }

    /// Forget a resource so the next call fetches it again.
    pub fn invalidate(&self, resource: &str) -> bool {
        self.entries.lock().remove(resource).is_some()
    }
}

/// Follow a JSON pointer (`/cyan/waterbodies`) to a string value.
pub fn lookup_string(document: &Value, pointer: &str) -> Option<String> {
    document.pointer(pointer)?.as_str().map(str::to_string)
}
