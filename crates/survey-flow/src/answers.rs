use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::{PageDescriptor, ParameterMeta};

/// Result of validating one page.
///
/// `data: None` means "nothing to remember", which is distinct from an empty
/// value.
#[derive(Debug, Clone, PartialEq)]
pub enum PageValidation {
    Valid { data: Option<Value> },
    Invalid { message: Option<String> },
}

impl PageValidation {
    pub fn valid() -> Self {
        PageValidation::Valid { data: None }
    }

    pub fn valid_with(data: Value) -> Self {
        PageValidation::Valid { data: Some(data) }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        PageValidation::Invalid {
            message: Some(message.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, PageValidation::Valid { .. })
    }
}

/// Lifecycle phase of a paginator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    Idle,
    Showing,
    Transitioning,
    Complete,
}

/// Read-only snapshot of where the flow stands. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowState {
    pub index: usize,
    pub total: usize,
    pub has_next: bool,
    pub has_prev: bool,
    pub progress: f64,
    pub key: String,
    pub next_enabled: bool,
    pub phase: FlowPhase,
}

/// Outcome of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Moved { from: usize, to: usize },
    /// The page refused to validate; the flow stays where it was.
    Rejected { message: String },
    Completed,
    /// Dropped: a transition was in flight, the flow was not showing a page,
    /// or the request targeted the current page.
    Ignored,
}

/// Terminal artifact built once per flow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionPayload {
    pub descriptors: Vec<PageDescriptor>,
    pub data_by_id: BTreeMap<String, Value>,
    pub page_durations_ms: BTreeMap<String, u64>,
    pub page_parameters: BTreeMap<String, ParameterMeta>,
}

impl CompletionPayload {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_uses_wire_field_names() {
        let payload = CompletionPayload {
            descriptors: vec![PageDescriptor::new("text").with_id("intro")],
            data_by_id: BTreeMap::from([("intro".to_string(), json!({"seen": true}))]),
            page_durations_ms: BTreeMap::from([("intro".to_string(), 1200)]),
            page_parameters: BTreeMap::new(),
        };
        let value = serde_json::to_value(&payload).expect("encode");
        assert_eq!(value["dataById"]["intro"]["seen"], true);
        assert_eq!(value["pageDurationsMs"]["intro"], 1200);
        assert_eq!(value["descriptors"][0]["type"], "text");
        assert!(value["pageParameters"].as_object().is_some_and(|m| m.is_empty()));
    }
}
