//! Span model for the trace viewer
//!
//! A [`SpanRecord`] is one node in the materialized trace tree. The set of
//! records for an open trace is kept sorted by start time, has exactly one
//! node per span id, and is fully connected: spans whose ancestors have not
//! arrived yet are backed by synthesized `pending` placeholders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Kind of work a span represents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SpanType {
    #[default]
    Default,
    /// Cost-bearing kind: carries token/cost metrics of its own
    Llm,
    HumanEvaluator,
    Tool,
}

impl SpanType {
    /// Whether this kind carries its own token/cost metrics
    pub fn is_metric_bearing(&self) -> bool {
        matches!(self, SpanType::Llm)
    }
}

/// Terminal status of a span
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    #[default]
    Success,
    Error,
}

// ============================================================================
// ATTRIBUTES
// ============================================================================

/// A guard event embedded in a span's attributes by the analysis backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GuardEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A function-call attempt evaluated by the analysis backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FunctionAttempt {
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Typed view over the span's open attribute bag.
///
/// Known security/ancestry fields are parsed eagerly; everything else passes
/// through untouched in `extra`. Attribute presence depends on the upstream
/// backend's instrumentation completeness, so every accessor here degrades to
/// "absent" instead of erroring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SpanAttributes {
    /// Ids of the span's ancestors, root first. Used only for gap-filling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestor_id_path: Option<Vec<String>>,
    /// Display names parallel to `ancestor_id_path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestor_name_path: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guard_events: Vec<GuardEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub function_attempts: Vec<FunctionAttempt>,
    /// Opaque pass-through for everything the viewer does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

impl SpanAttributes {
    /// The ancestor id/name path pair, if both are present with equal,
    /// non-zero length. Mismatched or missing paths mean "no ancestry gap".
    pub fn ancestry(&self) -> Option<(&[String], &[String])> {
        match (&self.ancestor_id_path, &self.ancestor_name_path) {
            (Some(ids), Some(names)) if !ids.is_empty() && ids.len() == names.len() => {
                Some((ids.as_slice(), names.as_slice()))
            }
            _ => None,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Bottom-up rollup over a subtree's LLM descendants.
///
/// Owned and refreshed exclusively by the aggregator; nothing else writes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AggregatedMetrics {
    pub has_llm_descendants: bool,
    pub total_cost: f64,
    pub total_tokens: i64,
}

// ============================================================================
// SPAN RECORD
// ============================================================================

/// One node in the materialized trace tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SpanRecord {
    pub span_id: String,
    /// Weak reference, no ownership. Root spans have none.
    #[serde(default)]
    pub parent_span_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub span_type: SpanType,
    #[serde(default)]
    pub status: SpanStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    // Own-span metric values, independent of rollups
    #[serde(default)]
    pub input_tokens: i64,
    #[serde(default)]
    pub output_tokens: i64,
    #[serde(default)]
    pub total_tokens: i64,
    #[serde(default)]
    pub input_cost: f64,
    #[serde(default)]
    pub output_cost: f64,
    #[serde(default)]
    pub total_cost: f64,

    #[serde(default)]
    pub attributes: SpanAttributes,

    /// True for synthesized placeholders whose real data has not arrived.
    /// A non-pending record with the same id replaces a pending one.
    #[serde(default)]
    pub pending: bool,
    /// UI expand/collapse state, not structural. Survives realtime replace.
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregated: Option<AggregatedMetrics>,
}

impl SpanRecord {
    /// A synthesized placeholder standing in for a not-yet-fetched ancestor.
    /// Its time window is seeded from the first descendant that referenced it
    /// and widened as more descendants arrive.
    pub fn placeholder(
        span_id: &str,
        parent_span_id: Option<String>,
        name: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            span_id: span_id.to_string(),
            parent_span_id,
            name: name.to_string(),
            span_type: SpanType::Default,
            status: SpanStatus::Success,
            start_time,
            end_time,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            input_cost: 0.0,
            output_cost: 0.0,
            total_cost: 0.0,
            attributes: SpanAttributes::default(),
            pending: true,
            collapsed: false,
            aggregated: None,
        }
    }
}

// ============================================================================
// SPAN REFERENCES
// ============================================================================

/// Kind of a synthetic display row derived from a real span's attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticKind {
    GuardEvent,
    FunctionAttempt,
}

/// Reference to a row in the trace viewer.
///
/// Synthetic rows are rendering decorations, never nodes in the span set, so
/// the type system forces navigation code to resolve them to their parent
/// before touching trace state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanRef {
    Real(String),
    Synthetic {
        parent: String,
        kind: SyntheticKind,
        local_id: String,
    },
}

const GUARD_EVENT_INFIX: &str = "-guard-event-";
const FUNCTION_ATTEMPT_INFIX: &str = "-function-attempt-";

impl SpanRef {
    /// Parse the string form used in URLs. Synthetic rows are keyed
    /// `{parent}-guard-event-{id}` or `{parent}-function-attempt-{index}`;
    /// anything else is a real span id.
    pub fn parse(s: &str) -> Self {
        if let Some(pos) = s.rfind(GUARD_EVENT_INFIX) {
            let (parent, local) = (&s[..pos], &s[pos + GUARD_EVENT_INFIX.len()..]);
            if !parent.is_empty() && !local.is_empty() {
                return SpanRef::Synthetic {
                    parent: parent.to_string(),
                    kind: SyntheticKind::GuardEvent,
                    local_id: local.to_string(),
                };
            }
        }
        if let Some(pos) = s.rfind(FUNCTION_ATTEMPT_INFIX) {
            let (parent, local) = (&s[..pos], &s[pos + FUNCTION_ATTEMPT_INFIX.len()..]);
            // Attempt rows are indexed; a non-numeric suffix is not ours
            if !parent.is_empty() && local.parse::<usize>().is_ok() {
                return SpanRef::Synthetic {
                    parent: parent.to_string(),
                    kind: SyntheticKind::FunctionAttempt,
                    local_id: local.to_string(),
                };
            }
        }
        SpanRef::Real(s.to_string())
    }

    /// The real span id this reference resolves to for selection/navigation
    pub fn real_id(&self) -> &str {
        match self {
            SpanRef::Real(id) => id,
            SpanRef::Synthetic { parent, .. } => parent,
        }
    }

    /// Stable display key for the UI (the string form `parse` accepts)
    pub fn display_key(&self) -> String {
        match self {
            SpanRef::Real(id) => id.clone(),
            SpanRef::Synthetic {
                parent,
                kind,
                local_id,
            } => match kind {
                SyntheticKind::GuardEvent => {
                    format!("{}{}{}", parent, GUARD_EVENT_INFIX, local_id)
                }
                SyntheticKind::FunctionAttempt => {
                    format!("{}{}{}", parent, FUNCTION_ATTEMPT_INFIX, local_id)
                }
            },
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, SpanRef::Synthetic { .. })
    }
}
