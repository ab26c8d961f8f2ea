//! Typed access to the shared-store keys.
//!
//! Collections are bounded rings: insertion prepends, eviction removes
//! from the tail once the cap is exceeded, newest entry is always at
//! index 0. Entries are never mutated in place.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StoreContext;

pub const RECENT_CONNECTIONS: &str = "recent_connections";
pub const SAVED_CONNECTIONS: &str = "saved_connections";
pub const SAVED_QUERIES: &str = "saved_queries";
pub const ACTIVE_CONNECTION: &str = "current_conn_id";
pub const ACTIVE_TABLE: &str = "current_active_table";

pub const RECENT_CONNECTIONS_CAP: usize = 5;
pub const SAVED_CONNECTIONS_CAP: usize = 10;
pub const SAVED_QUERIES_CAP: usize = 50;

/// A registered PostgreSQL connection. Recent entries are unnamed;
/// saved entries carry a user-chosen name and color tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub id: Uuid,
    pub host: String,
    pub port: String,
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// One entry in the saved-query library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedQuery {
    pub id: Uuid,
    pub name: String,
    pub query: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl SavedQuery {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            query: query.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

fn ring_prepend<T>(mut list: Vec<T>, item: T, cap: usize) -> Vec<T> {
    list.insert(0, item);
    list.truncate(cap);
    list
}

impl StoreContext {
    // ========== Connection directories ==========

    pub fn recent_connections(&self) -> Vec<ConnectionEntry> {
        self.get(RECENT_CONNECTIONS).unwrap_or_default()
    }

    /// Record a successful connect attempt, newest first, cap 5.
    pub fn push_recent_connection(&self, entry: ConnectionEntry) -> Result<()> {
        let list = ring_prepend(self.recent_connections(), entry, RECENT_CONNECTIONS_CAP);
        self.set(RECENT_CONNECTIONS, &list)
    }

    pub fn saved_connections(&self) -> Vec<ConnectionEntry> {
        self.get(SAVED_CONNECTIONS).unwrap_or_default()
    }

    /// Save a named connection, newest first, cap 10.
    pub fn push_saved_connection(&self, entry: ConnectionEntry) -> Result<()> {
        let list = ring_prepend(self.saved_connections(), entry, SAVED_CONNECTIONS_CAP);
        self.set(SAVED_CONNECTIONS, &list)
    }

    pub fn delete_saved_connection(&self, id: Uuid) -> Result<()> {
        let list: Vec<_> = self
            .saved_connections()
            .into_iter()
            .filter(|c| c.id != id)
            .collect();
        self.set(SAVED_CONNECTIONS, &list)
    }

    /// Swap the id of a saved entry after a reconnect. Reconnecting
    /// never reuses an identifier; the backend registers the session
    /// under a fresh one.
    pub fn replace_saved_connection_id(&self, old: Uuid, new: Uuid) -> Result<Option<ConnectionEntry>> {
        let mut replaced = None;
        let list: Vec<_> = self
            .saved_connections()
            .into_iter()
            .map(|mut c| {
                if c.id == old {
                    c.id = new;
                    replaced = Some(c.clone());
                }
                c
            })
            .collect();
        if replaced.is_some() {
            self.set(SAVED_CONNECTIONS, &list)?;
        }
        Ok(replaced)
    }

    // ========== Saved-query library ==========

    pub fn saved_queries(&self) -> Vec<SavedQuery> {
        self.get(SAVED_QUERIES).unwrap_or_default()
    }

    /// Add to the library, newest first, cap 50.
    pub fn push_saved_query(&self, query: SavedQuery) -> Result<()> {
        let list = ring_prepend(self.saved_queries(), query, SAVED_QUERIES_CAP);
        self.set(SAVED_QUERIES, &list)
    }

    pub fn delete_saved_query(&self, id: Uuid) -> Result<()> {
        let list: Vec<_> = self
            .saved_queries()
            .into_iter()
            .filter(|q| q.id != id)
            .collect();
        self.set(SAVED_QUERIES, &list)
    }

    // ========== Active pointers ==========

    pub fn active_connection_id(&self) -> Option<Uuid> {
        self.get(ACTIVE_CONNECTION)
    }

    /// Set on every successful connect; persists until overwritten.
    pub fn set_active_connection_id(&self, id: Uuid) -> Result<()> {
        self.set(ACTIVE_CONNECTION, &id)
    }

    pub fn active_table(&self) -> Option<String> {
        self.get(ACTIVE_TABLE)
    }

    pub fn set_active_table(&self, table: &str) -> Result<()> {
        self.set(ACTIVE_TABLE, &table)
    }

    /// Cleared when navigating back to the query screen.
    pub fn clear_active_table(&self) -> Result<()> {
        self.remove(ACTIVE_TABLE)
    }

    // ========== UI preference flags ==========

    /// Per-section open/collapsed flag, e.g. `saved-queries`. Created
    /// lazily on first toggle; `None` means the section has never been
    /// toggled and the view applies its own default.
    pub fn section_open(&self, section: &str) -> Option<bool> {
        self.get(&format!("{}-section-open", section))
    }

    pub fn set_section_open(&self, section: &str, open: bool) -> Result<()> {
        self.set(&format!("{}-section-open", section), &open)
    }

    pub fn sidebar_collapsed(&self, sidebar: &str) -> Option<bool> {
        self.get(&format!("{}-sidebar-collapsed", sidebar))
    }

    pub fn set_sidebar_collapsed(&self, sidebar: &str, collapsed: bool) -> Result<()> {
        self.set(&format!("{}-sidebar-collapsed", sidebar), &collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SharedStore;
    use tempfile::tempdir;

    fn entry(host: &str) -> ConnectionEntry {
        ConnectionEntry {
            id: Uuid::new_v4(),
            host: host.to_string(),
            port: "5432".to_string(),
            database: "postgres".to_string(),
            username: "postgres".to_string(),
            password: "secret".to_string(),
            name: None,
            color: None,
        }
    }

    #[test]
    fn recent_connections_cap_at_five_newest_first() {
        let dir = tempdir().unwrap();
        let store = SharedStore::open(dir.path().join("store.json")).unwrap();
        let cx = store.context();

        for i in 0..7 {
            cx.push_recent_connection(entry(&format!("host-{}", i))).unwrap();
        }

        let recents = cx.recent_connections();
        assert_eq!(recents.len(), 5);
        assert_eq!(recents[0].host, "host-6");
        assert_eq!(recents[4].host, "host-2");
    }

    #[test]
    fn saved_connections_cap_at_ten() {
        let dir = tempdir().unwrap();
        let store = SharedStore::open(dir.path().join("store.json")).unwrap();
        let cx = store.context();

        for i in 0..12 {
            let mut e = entry(&format!("host-{}", i));
            e.name = Some(format!("conn {}", i));
            cx.push_saved_connection(e).unwrap();
        }

        let saved = cx.saved_connections();
        assert_eq!(saved.len(), 10);
        assert_eq!(saved[0].host, "host-11");
    }

    #[test]
    fn saving_a_sixth_query_lands_at_index_zero() {
        let dir = tempdir().unwrap();
        let store = SharedStore::open(dir.path().join("store.json")).unwrap();
        let cx = store.context();

        for i in 0..5 {
            cx.push_saved_query(SavedQuery::new(format!("q{}", i), "SELECT 1"))
                .unwrap();
        }
        cx.push_saved_query(SavedQuery::new("t-check", "SELECT 2")).unwrap();

        let queries = cx.saved_queries();
        assert_eq!(queries.len(), 6);
        assert_eq!(queries[0].name, "t-check");
    }

    #[test]
    fn saved_queries_cap_at_fifty() {
        let dir = tempdir().unwrap();
        let store = SharedStore::open(dir.path().join("store.json")).unwrap();
        let cx = store.context();

        for i in 0..55 {
            cx.push_saved_query(SavedQuery::new(format!("q{}", i), "SELECT 1"))
                .unwrap();
        }
        assert_eq!(cx.saved_queries().len(), 50);
        assert_eq!(cx.saved_queries()[0].name, "q54");
    }

    #[test]
    fn replacing_a_saved_connection_id_keeps_list_length() {
        let dir = tempdir().unwrap();
        let store = SharedStore::open(dir.path().join("store.json")).unwrap();
        let cx = store.context();

        let mut e = entry("db.internal");
        e.name = Some("prod".to_string());
        let old_id = e.id;
        cx.push_saved_connection(e).unwrap();
        cx.push_saved_connection(entry("other")).unwrap();

        let new_id = Uuid::new_v4();
        let replaced = cx.replace_saved_connection_id(old_id, new_id).unwrap();
        assert_eq!(replaced.unwrap().id, new_id);

        let saved = cx.saved_connections();
        assert_eq!(saved.len(), 2);
        assert!(saved.iter().any(|c| c.id == new_id));
        assert!(!saved.iter().any(|c| c.id == old_id));
    }

    #[test]
    fn section_flags_are_lazy_and_independent() {
        let dir = tempdir().unwrap();
        let store = SharedStore::open(dir.path().join("store.json")).unwrap();
        let cx = store.context();

        assert_eq!(cx.section_open("saved-queries"), None);
        cx.set_section_open("saved-queries", true).unwrap();
        cx.set_section_open("database-schema", false).unwrap();
        assert_eq!(cx.section_open("saved-queries"), Some(true));
        assert_eq!(cx.section_open("database-schema"), Some(false));
        assert_eq!(cx.sidebar_collapsed("connections"), None);
    }
}
