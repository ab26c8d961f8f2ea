//! Windowed SQL execution for the result table.
//!
//! The engine fetches fixed-size pages (`LIMIT <N> OFFSET <offset>`),
//! replacing the result set on `run` and appending on `load_more`.
//! `has_more` is true iff the last page came back full; that is the
//! sole termination signal, there is no total-count query. The
//! `loading` flag is the only concurrency control: it is set before
//! every fetch, cleared on every exit path, and refuses overlapping
//! continuation fetches. In-flight fetches are never cancelled; a
//! generation counter discards responses that a newer `run` has
//! superseded.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_channel::{Receiver, Sender, unbounded};
use async_lock::RwLock;

use crate::services::api::{BackendApi, FieldInfo};
use crate::store::StoreContext;

/// Fixed window size.
pub const PAGE_SIZE: usize = 50;

/// How close to the bottom (in scroll units) the viewport must be
/// before a continuation fetch is triggered.
pub const SCROLL_THRESHOLD: f32 = 50.0;

/// Transient result-table state. Never persisted; recreated on every
/// `run`.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    pub fields: Vec<FieldInfo>,
    /// Running total of fetched rows; the offset of the next page.
    pub offset: usize,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<String>,
    /// The statement the current result set was produced from, kept
    /// for continuation fetches.
    pub sql: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    Updated,
}

/// Strip trailing statement terminators from the trimmed SQL, then
/// append the pagination window. Idempotent over repeated terminators:
/// `"SELECT 1;;;"` gains exactly one `LIMIT`/`OFFSET` clause.
pub fn paged_sql(sql: &str, limit: usize, offset: usize) -> String {
    let base = sql.trim().trim_end_matches(';');
    format!("{} LIMIT {} OFFSET {}", base, limit, offset)
}

pub struct QueryEngine<A> {
    api: Arc<A>,
    store: StoreContext,
    state: Arc<RwLock<ResultSet>>,
    generation: Arc<AtomicU64>,
    // Count of run futures created and not yet resolved. Claimed
    // synchronously when `run` is called, not when its future is first
    // polled, so the shortcut gate sees the press immediately.
    pending: Arc<AtomicUsize>,
    page_size: usize,
    events_tx: Sender<EngineEvent>,
    events_rx: Receiver<EngineEvent>,
}

/// Releases one pending-run claim when the run resolves, or when an
/// unpolled run future is dropped.
struct FetchClaim(Arc<AtomicUsize>);

impl Drop for FetchClaim {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<A: BackendApi> QueryEngine<A> {
    pub fn new(api: Arc<A>, store: StoreContext) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            api,
            store,
            state: Arc::new(RwLock::new(ResultSet::default())),
            generation: Arc::new(AtomicU64::new(0)),
            pending: Arc::new(AtomicUsize::new(0)),
            page_size: PAGE_SIZE,
            events_tx,
            events_rx,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Receiver for result-table re-renders.
    pub fn events(&self) -> Receiver<EngineEvent> {
        self.events_rx.clone()
    }

    pub async fn snapshot(&self) -> ResultSet {
        self.state.read().await.clone()
    }

    /// Synchronous probe for the shortcut path. True from the moment a
    /// `run` is issued (before its future is ever polled) until it
    /// resolves, and while the state lock is held for writing.
    pub fn is_loading_now(&self) -> bool {
        if self.pending.load(Ordering::SeqCst) > 0 {
            return true;
        }
        match self.state.try_read() {
            Some(state) => state.loading,
            None => true,
        }
    }

    fn emit(&self) {
        let _ = self.events_tx.try_send(EngineEvent::Updated);
    }

    /// Reset pagination and fetch the first window. The loading claim
    /// is taken in the synchronous prologue, before the returned future
    /// is first polled, so two shortcut presses in one tick cannot both
    /// pass an [`is_loading_now`] check. A blank statement or a missing
    /// active connection makes the returned future a silent no-op: no
    /// network call, no state change, no error.
    ///
    /// [`is_loading_now`]: QueryEngine::is_loading_now
    pub fn run(&self, sql: &str) -> impl Future<Output = ()> + Send + 'static {
        let sql = sql.trim().to_string();
        let connection_id = self
            .store
            .active_connection_id()
            .filter(|_| !sql.is_empty());
        let claim = connection_id.is_some().then(|| {
            self.pending.fetch_add(1, Ordering::SeqCst);
            FetchClaim(self.pending.clone())
        });

        let api = self.api.clone();
        let state_lock = self.state.clone();
        let generation = self.generation.clone();
        let events_tx = self.events_tx.clone();
        let page_size = self.page_size;

        async move {
            let Some(connection_id) = connection_id else {
                return;
            };
            let _claim = claim;

            // The bump shares the state lock so that generation changes
            // serialize with state mutations.
            let current = {
                let mut state = state_lock.write().await;
                let current = generation.fetch_add(1, Ordering::SeqCst) + 1;
                state.loading = true;
                state.error = None;
                state.sql = sql.clone();
                current
            };
            let _ = events_tx.try_send(EngineEvent::Updated);

            let result = api
                .query(connection_id, &paged_sql(&sql, page_size, 0))
                .await;

            let mut state = state_lock.write().await;
            if generation.load(Ordering::SeqCst) != current {
                // A newer run owns the result set and the loading flag;
                // this response is stale and must not overwrite it.
                return;
            }
            match result {
                Ok(data) => {
                    state.rows = data.rows;
                    state.fields = data.fields;
                    state.offset = state.rows.len();
                    state.has_more = state.rows.len() == page_size;
                    state.loading = false;
                }
                Err(e) => {
                    tracing::warn!("Query failed: {}", e);
                    state.rows.clear();
                    state.fields.clear();
                    state.offset = 0;
                    state.has_more = false;
                    state.loading = false;
                    state.error = Some(e.to_string());
                }
            }
            drop(state);
            let _ = events_tx.try_send(EngineEvent::Updated);
        }
    }

    /// Fetch the next window and append. Refused while a fetch is in
    /// flight or once the previous page came back short.
    pub async fn load_more(&self) {
        let Some(connection_id) = self.store.active_connection_id() else {
            return;
        };

        let (sql, offset, generation) = {
            let mut state = self.state.write().await;
            if state.loading || !state.has_more {
                return;
            }
            if state.sql.trim().is_empty() {
                return;
            }
            state.loading = true;
            state.error = None;
            // Snapshot under the same lock the generation is bumped
            // under; a racing run cannot slip in between.
            (
                state.sql.clone(),
                state.offset,
                self.generation.load(Ordering::SeqCst),
            )
        };
        self.emit();

        let result = self
            .api
            .query(connection_id, &paged_sql(&sql, self.page_size, offset))
            .await;

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        match result {
            Ok(data) => {
                let fetched = data.rows.len();
                state.rows.extend(data.rows);
                state.fields = data.fields;
                state.offset = state.rows.len();
                state.has_more = fetched == self.page_size;
                state.loading = false;
            }
            Err(e) => {
                // A failed continuation must not discard what is
                // already on screen.
                tracing::warn!("Continuation fetch failed: {}", e);
                state.has_more = false;
                state.loading = false;
                state.error = Some(e.to_string());
            }
        }
        drop(state);
        self.emit();
    }

    /// Scroll handler for the result table: continue only when the
    /// viewport is within [`SCROLL_THRESHOLD`] of the bottom.
    pub async fn on_scroll(&self, scroll_top: f32, viewport: f32, content: f32) {
        if scroll_top + viewport >= content - SCROLL_THRESHOLD {
            self.load_more().await;
        }
    }
}
