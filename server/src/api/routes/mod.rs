//! API route handlers

use std::sync::Arc;

use tokio::sync::watch;

use crate::data::SummaryCache;
use crate::domain::live::LiveService;
use crate::domain::tree::store::TraceViewRegistry;
use crate::upstream::BackendClient;

pub mod health;
pub mod live;
pub mod passthrough;
pub mod policies;
pub mod shields;
pub mod traces;

/// Shared state for all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub client: Arc<dyn BackendClient>,
    pub registry: Arc<TraceViewRegistry>,
    pub live: Arc<LiveService>,
    pub summaries: Arc<SummaryCache>,
    pub shutdown_rx: watch::Receiver<bool>,
    pub live_max_events_per_second: u32,
}
