pub mod report;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::target::TargetUrl;
use crate::task::TaskKind;

/// Second granularity, so repeated runs in one project directory do not collide.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\s]"#).unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn timestamp_label<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// File-name-safe rendering of a target: `://` becomes `_`, and any remaining
/// path separator or reserved character is replaced by `_` as well.
pub fn filename_component(url: &TargetUrl) -> String {
    let flattened = url.as_str().replace("://", "_");
    RE_UNSAFE.replace_all(&flattened, "_").into_owned()
}

pub fn output_filename<Tz: TimeZone>(kind: TaskKind, url: &TargetUrl, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}_{}_{}.{}",
        kind.file_prefix(),
        filename_component(url),
        timestamp_label(at),
        kind.extension()
    )
}

/// Path of the artifact for one task run, under `project_dir`.
///
/// The directory is not created here; it must already exist.
pub fn resolve_path<Tz: TimeZone>(
    kind: TaskKind,
    url: &TargetUrl,
    project_dir: &Path,
    at: &DateTime<Tz>,
) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    project_dir.join(output_filename(kind, url, at))
}

pub fn resolve_path_now(kind: TaskKind, url: &TargetUrl, project_dir: &Path) -> PathBuf {
    resolve_path(kind, url, project_dir, &Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn csp_path_matches_expected_shape() {
        let url = crate::target::normalize("https://a.com");
        let path = resolve_path(TaskKind::Csp, &url, Path::new("/out"), &at(0));
        assert_eq!(path, PathBuf::from("/out/csp_https_a.com_20231114_221320.html"));
    }

    #[test]
    fn path_starts_with_project_dir_and_has_no_scheme_separator() {
        let url = crate::target::normalize("http://a.com:8080/app/login?x=1");
        for kind in TaskKind::CANONICAL {
            let path = resolve_path(kind, &url, Path::new("/out/project"), &at(0));
            assert!(path.starts_with("/out/project"));
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            assert!(!name.contains("://"));
            assert!(!name.contains('/'));
            assert_eq!(path.parent(), Some(Path::new("/out/project")));
        }
    }

    #[test]
    fn paths_differ_by_kind_and_timestamp() {
        let url = crate::target::normalize("a.com");
        let dir = Path::new("/out");
        let a = resolve_path(TaskKind::DirBrute, &url, dir, &at(0));
        let b = resolve_path(TaskKind::TemplateScan, &url, dir, &at(0));
        let c = resolve_path(TaskKind::DirBrute, &url, dir, &at(1));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, resolve_path(TaskKind::DirBrute, &url, dir, &at(0)));
    }

    #[test]
    fn extensions_follow_the_task() {
        let url = crate::target::normalize("a.com");
        let name = output_filename(TaskKind::HeaderAudit, &url, &at(0));
        assert!(name.starts_with("header_audit_https_a.com_"));
        assert!(name.ends_with(".pdf"));
    }
}
