//! Per-trace view store
//!
//! One store per open trace, explicitly created when the viewer opens the
//! trace and explicitly released when it navigates away. All mutation goes
//! through the load/merge/select pipeline; handlers only take snapshots.
//!
//! Loads and realtime merges are async and can outlive the view they were
//! started for. Every async completion carries the epoch it was started
//! under; a release or reset bumps the epoch, so late completions for a dead
//! view are dropped instead of resurrecting its state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::watch;

use super::merge::{materialize, merge_span_update, widen_trace_aggregate};
use super::select::resolve_selection;
use super::span::{SpanRecord, SpanRef};
use crate::upstream::TraceSummary;

/// Everything the viewer needs to render one open trace
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub spans: Vec<SpanRecord>,
    pub trace: Option<TraceSummary>,
    pub selected_span_id: Option<String>,
    /// Structural name path of the last selection, used to re-resolve after
    /// a reload when the explicit reference no longer exists
    pub saved_path: Option<Vec<String>>,
    pub is_loading: bool,
    pub error: Option<String>,
}

pub struct TraceViewStore {
    trace_id: String,
    epoch: AtomicU64,
    state: RwLock<ViewState>,
    /// Flipped to true exactly once, when the store is released
    stop_tx: watch::Sender<bool>,
}

impl TraceViewStore {
    fn new(trace_id: &str) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            trace_id: trace_id.to_string(),
            epoch: AtomicU64::new(0),
            state: RwLock::new(ViewState::default()),
            stop_tx,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Observers of this receiver terminate when the store is released
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.read().clone()
    }

    /// Mark a load in flight and return the epoch its completion must carry
    pub fn begin_load(&self) -> u64 {
        let mut state = self.state.write();
        state.is_loading = true;
        state.error = None;
        self.epoch.load(Ordering::Acquire)
    }

    /// Apply a finished load. Returns false (and changes nothing) when the
    /// store was reset after the load started.
    pub fn finish_load(
        &self,
        epoch: u64,
        result: Result<(Option<TraceSummary>, Vec<SpanRecord>), String>,
    ) -> bool {
        let mut state = self.state.write();
        if self.epoch.load(Ordering::Acquire) != epoch {
            return false;
        }
        state.is_loading = false;
        match result {
            Ok((trace, spans)) => {
                state.trace = trace;
                state.spans = materialize(spans);
                state.error = None;
                let saved = state.saved_path.clone();
                let selected = resolve_selection(&state.spans, None, saved.as_deref())
                    .map(|s| s.span_id.clone());
                state.selected_span_id = selected;
            }
            Err(message) => {
                state.error = Some(message);
            }
        }
        true
    }

    /// Fold one realtime span record into the set and re-materialize.
    /// Returns the fresh snapshot, or `None` when the epoch is stale.
    pub fn merge_update(&self, epoch: u64, incoming: SpanRecord) -> Option<ViewState> {
        let mut state = self.state.write();
        if self.epoch.load(Ordering::Acquire) != epoch {
            return None;
        }

        let previous = state
            .spans
            .iter()
            .find(|s| s.span_id == incoming.span_id)
            .cloned();
        if let Some(trace) = state.trace.as_mut() {
            widen_trace_aggregate(trace, &incoming, previous.as_ref());
        }

        let spans = std::mem::take(&mut state.spans);
        state.spans = merge_span_update(spans, incoming);

        // Re-resolve so a replaced or removed selection still lands somewhere
        let explicit = state.selected_span_id.clone().map(SpanRef::Real);
        let saved = state.saved_path.clone();
        let selected = resolve_selection(&state.spans, explicit.as_ref(), saved.as_deref())
            .map(|s| s.span_id.clone());
        state.selected_span_id = selected;

        Some(state.clone())
    }

    /// Record a user selection. Synthetic references land on their parent.
    pub fn select(&self, reference: &SpanRef) -> Option<String> {
        self.apply_selection(Some(reference), None)
    }

    /// Resolve and persist a selection from an explicit reference and/or a
    /// remembered structural path, in that priority order.
    pub fn apply_selection(
        &self,
        explicit: Option<&SpanRef>,
        path: Option<&[String]>,
    ) -> Option<String> {
        let mut state = self.state.write();
        let (span_id, saved_path) = {
            let selected = resolve_selection(&state.spans, explicit, path)?;
            let path = selected
                .attributes
                .ancestry()
                .map(|(_, names)| names.to_vec());
            (selected.span_id.clone(), path)
        };
        state.selected_span_id = Some(span_id.clone());
        state.saved_path = saved_path;
        Some(span_id)
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Clear all view state and invalidate every in-flight completion
    pub fn reset(&self) {
        let mut state = self.state.write();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        *state = ViewState::default();
    }

    fn release(&self) {
        self.reset();
        let _ = self.stop_tx.send(true);
    }
}

/// Owns one store per open trace
#[derive(Default)]
pub struct TraceViewRegistry {
    stores: DashMap<String, Arc<TraceViewStore>>,
}

impl TraceViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, trace_id: &str) -> Option<Arc<TraceViewStore>> {
        self.stores.get(trace_id).map(|e| e.value().clone())
    }

    pub fn get_or_create(&self, trace_id: &str) -> Arc<TraceViewStore> {
        self.stores
            .entry(trace_id.to_string())
            .or_insert_with(|| Arc::new(TraceViewStore::new(trace_id)))
            .value()
            .clone()
    }

    /// Tear down the store for a trace. Returns whether one existed.
    /// In-flight work for it sees a bumped epoch and a stop signal.
    pub fn release(&self, trace_id: &str) -> bool {
        match self.stores.remove(trace_id) {
            Some((_, store)) => {
                store.release();
                true
            }
            None => false,
        }
    }

    pub fn open_traces(&self) -> usize {
        self.stores.len()
    }
}
