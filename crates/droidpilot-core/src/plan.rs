//! Plan file format and execution result records
//!
//! A plan is a named, ordered, replayable list of steps. Each step names a
//! tool plus a flat parameter map. Plans are immutable once loaded: the
//! executor only reads them.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::observation::Observation;

/// A single plan step: a tool identifier plus its parameters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Tool identifier (e.g. "tap", "type_text").
    pub tool: String,

    /// Flat parameter map, tool-specific.
    #[serde(default)]
    pub params: Map<String, Value>,

    /// Optional human-readable label shown in results and logs.
    #[serde(default)]
    pub label: Option<String>,
}

impl Step {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            params: Map::new(),
            label: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Display name: the label if set, else the tool id.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.tool)
    }
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Plan {
    /// Parse a plan from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a plan from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Outcome of one executed step.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    /// 0-based step index within the plan.
    pub index: usize,

    pub success: bool,

    /// Observation captured before the step's action ran.
    #[serde(default)]
    pub before: Option<Observation>,

    /// Observation captured after the step's action ran (best effort on
    /// failure; absent if the device became unreachable).
    #[serde(default)]
    pub after: Option<Observation>,

    #[serde(default)]
    pub error: Option<String>,
}

/// Terminal status of a plan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanStatus {
    /// Every step from the start index onward succeeded.
    Completed,
    /// Execution halted at `failed_at`.
    Failed,
    /// The plan had no steps at or after the start index.
    Empty,
}

/// Accumulated result of a plan run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResult {
    pub status: PlanStatus,

    /// One entry per executed step, in order.
    pub results: Vec<ActionResult>,

    /// Index of the first failed step, when `status` is `Failed`.
    #[serde(default)]
    pub failed_at: Option<usize>,
}

impl PlanResult {
    pub fn completed(results: Vec<ActionResult>) -> Self {
        Self {
            status: PlanStatus::Completed,
            results,
            failed_at: None,
        }
    }

    pub fn failed(results: Vec<ActionResult>, failed_at: usize) -> Self {
        Self {
            status: PlanStatus::Failed,
            results,
            failed_at: Some(failed_at),
        }
    }

    pub fn empty() -> Self {
        Self {
            status: PlanStatus::Empty,
            results: Vec::new(),
            failed_at: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, PlanStatus::Completed)
    }

    /// Step index a caller should pass as `start_index` to resume a failed
    /// run, retrying the failed step.
    pub fn resume_index(&self) -> Option<usize> {
        self.failed_at
    }

    /// The failed step's result record, for external diagnosis/recovery.
    pub fn failed_result(&self) -> Option<&ActionResult> {
        let failed_at = self.failed_at?;
        self.results.iter().find(|r| r.index == failed_at)
    }
}
