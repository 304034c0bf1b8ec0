use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::Serialize;

use crate::error::ConfigError;

/// Pseudo task name that expands to every concrete task.
pub const AGGREGATE: &str = "all";

/// Every name accepted on the command line, aliases included.
pub const TASK_NAMES: &[&str] = &[
    "csp",
    "dir_brute",
    "dir-brute",
    "gobuster",
    "header_audit",
    "header-audit",
    "humble",
    "template_scan",
    "template-scan",
    "nuclei",
    AGGREGATE,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Csp,
    DirBrute,
    HeaderAudit,
    TemplateScan,
}

impl TaskKind {
    /// Execution and reporting order used when `all` is requested.
    pub const CANONICAL: [TaskKind; 4] = [
        TaskKind::Csp,
        TaskKind::DirBrute,
        TaskKind::HeaderAudit,
        TaskKind::TemplateScan,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "csp" => Some(Self::Csp),
            "dir_brute" | "dir-brute" | "gobuster" => Some(Self::DirBrute),
            "header_audit" | "header-audit" | "humble" => Some(Self::HeaderAudit),
            "template_scan" | "template-scan" | "nuclei" => Some(Self::TemplateScan),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csp => "csp",
            Self::DirBrute => "dir_brute",
            Self::HeaderAudit => "header_audit",
            Self::TemplateScan => "template_scan",
        }
    }

    pub fn file_prefix(&self) -> &'static str {
        self.as_str()
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csp => "html",
            Self::DirBrute => "txt",
            Self::HeaderAudit => "pdf",
            Self::TemplateScan => "txt",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ConfigError::UnknownTask {
            name: s.to_string(),
        })
    }
}

fn is_aggregate(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case(AGGREGATE)
}

/// Turns the requested task names into the ordered list of concrete tasks to run.
///
/// `all` must be the only name given (repeating it is tolerated) and expands to
/// [`TaskKind::CANONICAL`]. Otherwise the caller's order is kept and repeated
/// names, including aliases of the same task, run once.
pub fn resolve_tasks<S: AsRef<str>>(requested: &[S]) -> Result<Vec<TaskKind>, ConfigError> {
    if requested.is_empty() {
        return Err(ConfigError::NoTasks);
    }

    let names: Vec<&str> = requested.iter().map(|s| s.as_ref()).collect();
    if names.iter().any(|n| is_aggregate(n)) {
        if names.iter().any(|n| !is_aggregate(n)) {
            return Err(ConfigError::AggregateNotAlone {
                requested: names.join(", "),
            });
        }
        return Ok(TaskKind::CANONICAL.to_vec());
    }

    let kinds = names
        .iter()
        .map(|n| n.parse::<TaskKind>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(kinds.into_iter().unique().collect())
}
