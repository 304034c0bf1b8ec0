//! Per-task adapters around the external tools.
//!
//! Every adapter implements [`TaskRunner`] and turns all of its failure modes
//! into a [`TaskOutcome`]; nothing escapes `execute` as an error.

pub mod csp;
pub mod dir_brute;
pub mod header_audit;
pub mod process;
pub mod render;
pub mod template_scan;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::options::Options;
use crate::outcome::TaskOutcome;
use crate::target::TargetUrl;
use crate::task::TaskKind;

#[async_trait]
pub trait TaskRunner: Send + Sync {
    fn kind(&self) -> TaskKind;

    /// Runs the task against `url`, writing its artifact to `output_path`.
    async fn execute(&self, url: &TargetUrl, output_path: &Path) -> TaskOutcome;
}

/// The production adapter for every concrete task, in canonical order.
pub fn default_runners(options: &Options) -> Vec<Arc<dyn TaskRunner>> {
    vec![
        Arc::new(csp::CspAdapter::new(
            options.csp.clone(),
            options.cookies.clone(),
            Arc::new(render::ChromeRenderer::new(options.csp.clone())),
        )),
        Arc::new(dir_brute::DirBruteAdapter::new(
            options.dir_brute.clone(),
            options.cookies.clone(),
        )),
        Arc::new(header_audit::HeaderAuditAdapter::new(
            options.header_audit.clone(),
        )),
        Arc::new(template_scan::TemplateScanAdapter::new(
            options.template_scan.clone(),
            options.cookies.clone(),
        )),
    ]
}
