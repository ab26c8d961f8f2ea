//! Profile-scoped shared key-value store.
//!
//! This is the one piece of persistent state every UI region reads from
//! and writes to: connection directories, the active connection and
//! table pointers, the saved-query library, and per-section collapse
//! flags. The store is a single JSON file under the user's home
//! directory, read through on every access so that a write made by any
//! context (this process or another one sharing the profile) is the
//! authoritative value.
//!
//! Change notification follows the protocol in [`watcher`]: a write is
//! broadcast to every other context, the writer synthesizes the same
//! signal for its own subscribers, and a polling fallback re-reads the
//! file on a fixed interval. Consumers never trust the signal payload;
//! they re-read the key.

mod keys;
pub mod watcher;

pub use keys::*;

use anyhow::{Context as _, Result, anyhow};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Identifies one mounted UI context (a "document" in browser terms).
/// Native change notifications are delivered to every context except
/// the writer's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

/// A change signal carried on the notification channels. The payload is
/// advisory only; subscribers re-read the store.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub key: String,
    pub value: Option<Value>,
    pub writer: ContextId,
}

struct WatcherSub {
    id: u64,
    context: ContextId,
    key: Option<String>,
    tx: async_channel::Sender<StoreEvent>,
}

/// Process-wide handle to the backing file. UI regions do not use this
/// directly; they allocate a [`StoreContext`] per mounted region.
pub struct SharedStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process. Writers
    // in other processes race last-write-wins; read-repair covers it.
    file_lock: Mutex<()>,
    subs: Mutex<Vec<WatcherSub>>,
    next_context: AtomicU64,
    next_sub: AtomicU64,
}

impl SharedStore {
    /// Open (or create) the store at an explicit path.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create store directory")?;
        }
        Ok(Arc::new(Self {
            path,
            file_lock: Mutex::new(()),
            subs: Mutex::new(Vec::new()),
            next_context: AtomicU64::new(1),
            next_sub: AtomicU64::new(1),
        }))
    }

    /// Open the store at the default profile location
    /// (`~/.pgdesk/store.json`).
    pub fn open_default() -> Result<Arc<Self>> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
        Self::open(home.join(".pgdesk").join("store.json"))
    }

    /// Allocate a context for one mounted UI region.
    pub fn context(self: &Arc<Self>) -> StoreContext {
        let id = ContextId(self.next_context.fetch_add(1, Ordering::SeqCst));
        StoreContext {
            store: self.clone(),
            id,
        }
    }

    /// Read the full map from disk. A missing file is an empty store; a
    /// file that fails to parse is treated as empty rather than raised,
    /// so a corrupt profile never takes a view down with it.
    fn read_map(&self) -> BTreeMap<String, Value> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return BTreeMap::new(),
        };
        if content.trim().is_empty() {
            return BTreeMap::new();
        }
        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!("Store file is corrupt, treating as empty: {}", e);
                BTreeMap::new()
            }
        }
    }

    fn persist(&self, map: &BTreeMap<String, Value>) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow!("Store path has no parent directory"))?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .context("Failed to create temporary store file")?;
        serde_json::to_writer_pretty(&mut tmp, map).context("Failed to serialize store")?;
        tmp.persist(&self.path)
            .map_err(|e| anyhow!("Failed to persist store file: {}", e))?;
        Ok(())
    }

    fn get_raw(&self, key: &str) -> Option<Value> {
        let _guard = self.file_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_map().get(key).cloned()
    }

    fn write_raw(&self, key: &str, value: Option<Value>, writer: ContextId) -> Result<()> {
        {
            let _guard = self.file_lock.lock().unwrap_or_else(|e| e.into_inner());
            let mut map = self.read_map();
            match &value {
                Some(v) => {
                    map.insert(key.to_string(), v.clone());
                }
                None => {
                    map.remove(key);
                }
            }
            self.persist(&map)?;
        }

        // Channel 1: native notification, delivered to every context
        // other than the writer's.
        self.broadcast(StoreEvent {
            key: key.to_string(),
            value,
            writer,
        });
        Ok(())
    }

    fn broadcast(&self, event: StoreEvent) {
        let mut subs = self.subs.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|sub| {
            if sub.context == event.writer {
                return true;
            }
            if let Some(key) = &sub.key {
                if key != &event.key {
                    return true;
                }
            }
            // The channel is unbounded, so a failed send means the
            // watcher is gone; drop its registration.
            sub.tx.try_send(event.clone()).is_ok()
        });
    }

    /// Channel 2: the writer's own context dispatches the signal to its
    /// local subscribers, since the native broadcast excludes it.
    fn notify_context(&self, context: ContextId, event: StoreEvent) {
        let mut subs = self.subs.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|sub| {
            if sub.context != context {
                return true;
            }
            if let Some(key) = &sub.key {
                if key != &event.key {
                    return true;
                }
            }
            sub.tx.try_send(event.clone()).is_ok()
        });
    }

    pub(crate) fn register_sub(
        &self,
        context: ContextId,
        key: Option<String>,
    ) -> (u64, async_channel::Receiver<StoreEvent>) {
        let (tx, rx) = async_channel::unbounded();
        let id = self.next_sub.fetch_add(1, Ordering::SeqCst);
        self.subs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(WatcherSub {
                id,
                context,
                key,
                tx,
            });
        (id, rx)
    }

    pub(crate) fn unregister_sub(&self, id: u64) {
        self.subs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|sub| sub.id != id);
    }
}

/// Per-region handle to the shared store. Reads are synchronous and go
/// to the file; writes persist and then fan out change signals.
#[derive(Clone)]
pub struct StoreContext {
    store: Arc<SharedStore>,
    id: ContextId,
}

impl StoreContext {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub(crate) fn shared(&self) -> &Arc<SharedStore> {
        &self.store
    }

    /// Read a key, deserializing into the expected shape. A value that
    /// fails to parse reads back as `None` rather than an error.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.store.get_raw(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Store key {:?} failed to parse, ignoring: {}", key, e);
                None
            }
        }
    }

    /// Write a key and fan out change signals on both notification
    /// channels.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).context("Failed to serialize store value")?;
        self.store
            .write_raw(key, Some(value.clone()), self.id)?;
        self.store.notify_context(
            self.id,
            StoreEvent {
                key: key.to_string(),
                value: Some(value),
                writer: self.id,
            },
        );
        Ok(())
    }

    /// Remove a key entirely (used for the active-table pointer when
    /// navigating back to the query screen).
    pub fn remove(&self, key: &str) -> Result<()> {
        self.store.write_raw(key, None, self.id)?;
        self.store.notify_context(
            self.id,
            StoreEvent {
                key: key.to_string(),
                value: None,
                writer: self.id,
            },
        );
        Ok(())
    }
}
