use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::target::TargetUrl;
use crate::task::TaskKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    ToolMissing,
    ExecutionFailed,
    EmptyResult,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ToolMissing => "tool_missing",
            Self::ExecutionFailed => "execution_failed",
            Self::EmptyResult => "empty_result",
        }
    }

    /// `EmptyResult` is informational and does not count as a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ToolMissing | Self::ExecutionFailed)
    }
}

fn serialize_millis<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(value.as_millis() as u64)
}

/// Result of one task execution. Built once by an adapter and never mutated
/// afterwards, except for the dispatcher stamping the elapsed time.
#[derive(Clone, Debug, Serialize)]
pub struct TaskOutcome {
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// Set only for [`TaskStatus::Success`].
    pub output_path: Option<PathBuf>,
    pub detail: Option<String>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl TaskOutcome {
    fn new(kind: TaskKind, status: TaskStatus, detail: Option<String>) -> Self {
        Self {
            kind,
            status,
            output_path: None,
            detail,
            elapsed: Duration::ZERO,
        }
    }

    pub fn success(kind: TaskKind, output_path: &Path) -> Self {
        Self {
            output_path: Some(output_path.to_path_buf()),
            ..Self::new(kind, TaskStatus::Success, None)
        }
    }

    pub fn tool_missing(kind: TaskKind, detail: impl Into<String>) -> Self {
        Self::new(kind, TaskStatus::ToolMissing, Some(detail.into()))
    }

    pub fn execution_failed(kind: TaskKind, detail: impl Into<String>) -> Self {
        Self::new(kind, TaskStatus::ExecutionFailed, Some(detail.into()))
    }

    pub fn timed_out(kind: TaskKind, what: &str, budget: Duration) -> Self {
        Self::execution_failed(
            kind,
            format!(
                "timeout: {what} exceeded its {}s execution budget",
                budget.as_secs_f64()
            ),
        )
    }

    pub fn empty(kind: TaskKind, detail: impl Into<String>) -> Self {
        Self::new(kind, TaskStatus::EmptyResult, Some(detail.into()))
    }

    pub fn is_timeout(&self) -> bool {
        self.status == TaskStatus::ExecutionFailed
            && self
                .detail
                .as_deref()
                .is_some_and(|d| d.starts_with("timeout"))
    }

    pub(crate) fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }
}

/// Outcomes of one dispatch, in resolution order.
#[derive(Clone, Debug, Serialize)]
pub struct DispatchResult {
    pub target: TargetUrl,
    pub outcomes: Vec<TaskOutcome>,
}

impl DispatchResult {
    pub fn new(target: TargetUrl, outcomes: Vec<TaskOutcome>) -> Self {
        Self { target, outcomes }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, kind: TaskKind) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.kind == kind)
    }

    pub fn kinds(&self) -> Vec<TaskKind> {
        self.outcomes.iter().map(|o| o.kind).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failure())
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}
