use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::process::{self, Invocation};
use super::TaskRunner;
use crate::options::ToolOptions;
use crate::outcome::TaskOutcome;
use crate::target::TargetUrl;
use crate::task::TaskKind;

/// Vulnerability-template scanning through `nuclei`.
///
/// nuclei only creates the `-o` file when a template matched, so a clean scan
/// ends as `EmptyResult`.
#[derive(Clone, Debug)]
pub struct TemplateScanAdapter {
    options: ToolOptions,
    cookies: Option<String>,
}

impl TemplateScanAdapter {
    pub fn new(options: ToolOptions, cookies: Option<String>) -> Self {
        Self { options, cookies }
    }

    pub fn invocation(&self, url: &TargetUrl, output_path: &Path) -> Invocation {
        let mut inv = Invocation::new(&self.options.binary, self.options.timeout)
            .args(["-u", url.as_str(), "-o"])
            .arg(output_path.to_string_lossy());
        if let Some(cookies) = self.cookies.as_deref() {
            inv = inv.arg("-H").arg(format!("Cookie: {cookies}"));
        }
        inv.args(self.options.extra_args.iter().cloned())
    }
}

#[async_trait]
impl TaskRunner for TemplateScanAdapter {
    fn kind(&self) -> TaskKind {
        TaskKind::TemplateScan
    }

    async fn execute(&self, url: &TargetUrl, output_path: &Path) -> TaskOutcome {
        let inv = self.invocation(url, output_path);
        info!(command = %inv.command_line(), "running template scan");
        process::execute(self.kind(), &inv, output_path).await
    }
}
