use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::process::{self, Invocation};
use super::TaskRunner;
use crate::options::DirBruteOptions;
use crate::outcome::TaskOutcome;
use crate::target::TargetUrl;
use crate::task::TaskKind;

/// Directory brute-forcing through `gobuster dir`.
#[derive(Clone, Debug)]
pub struct DirBruteAdapter {
    options: DirBruteOptions,
    cookies: Option<String>,
}

impl DirBruteAdapter {
    pub fn new(options: DirBruteOptions, cookies: Option<String>) -> Self {
        Self { options, cookies }
    }

    pub fn invocation(&self, url: &TargetUrl, output_path: &Path) -> Invocation {
        let mut inv = Invocation::new(&self.options.tool.binary, self.options.tool.timeout)
            .args(["dir", "--url", url.as_str(), "--wordlist"])
            .arg(self.options.wordlist.to_string_lossy())
            .arg("--threads")
            .arg(self.options.threads.to_string())
            .arg("--no-error");
        if let Some(cookies) = self.cookies.as_deref() {
            inv = inv.args(["--cookies", cookies]);
        }
        inv.args(self.options.tool.extra_args.iter().cloned())
            .stdout_to(output_path)
    }
}

#[async_trait]
impl TaskRunner for DirBruteAdapter {
    fn kind(&self) -> TaskKind {
        TaskKind::DirBrute
    }

    async fn execute(&self, url: &TargetUrl, output_path: &Path) -> TaskOutcome {
        let binary = &self.options.tool.binary;
        if process::locate(binary).is_none() {
            return TaskOutcome::tool_missing(
                self.kind(),
                format!("{binary} is not installed or not found in PATH"),
            );
        }
        if !self.options.wordlist.is_file() {
            return TaskOutcome::execution_failed(
                self.kind(),
                format!("wordlist not found: {}", self.options.wordlist.display()),
            );
        }

        info!(url = %url, wordlist = %self.options.wordlist.display(), "running directory brute force");
        let inv = self.invocation(url, output_path);
        process::execute(self.kind(), &inv, output_path).await
    }
}
