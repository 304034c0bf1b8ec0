use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::process::{self, Invocation};
use super::TaskRunner;
use crate::options::ToolOptions;
use crate::outcome::TaskOutcome;
use crate::target::TargetUrl;
use crate::task::TaskKind;

/// HTTP header hardening analysis through `humble`, rendered as PDF.
///
/// humble takes the report's file name and directory separately and writes
/// the file itself, so success is judged by the report existing afterwards.
#[derive(Clone, Debug)]
pub struct HeaderAuditAdapter {
    options: ToolOptions,
}

impl HeaderAuditAdapter {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }

    pub fn invocation(&self, url: &TargetUrl, output_path: &Path) -> Invocation {
        let file_name = output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = match output_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_string_lossy().into_owned(),
            _ => ".".to_string(),
        };
        Invocation::new(&self.options.binary, self.options.timeout)
            .args(["-u", url.as_str(), "-o", "pdf", "-of"])
            .arg(file_name)
            .arg("-op")
            .arg(dir)
            .args(self.options.extra_args.iter().cloned())
    }
}

#[async_trait]
impl TaskRunner for HeaderAuditAdapter {
    fn kind(&self) -> TaskKind {
        TaskKind::HeaderAudit
    }

    async fn execute(&self, url: &TargetUrl, output_path: &Path) -> TaskOutcome {
        let inv = self.invocation(url, output_path);
        info!(command = %inv.command_line(), "running header analysis");
        process::execute(self.kind(), &inv, output_path).await
    }
}
