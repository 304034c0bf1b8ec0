use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::{self, JoinHandle};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::adapters::{self, TaskRunner};
use crate::error::ConfigError;
use crate::options::Options;
use crate::outcome::{DispatchResult, TaskOutcome, TaskStatus};
use crate::output;
use crate::target::{self, TargetUrl};
use crate::task::{self as tasks, TaskKind};

/// Routes resolved task kinds to their runners and collects one outcome each.
pub struct Dispatcher {
    options: Options,
    runners: HashMap<TaskKind, Arc<dyn TaskRunner>>,
}

impl Dispatcher {
    pub fn new(options: Options) -> Result<Self, ConfigError> {
        let runners = adapters::default_runners(&options);
        Self::with_runners(options, runners)
    }

    /// Uses the given runners instead of the stock tool adapters. A later
    /// runner for the same kind replaces an earlier one.
    pub fn with_runners(
        options: Options,
        runners: Vec<Arc<dyn TaskRunner>>,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        let runners = runners.into_iter().map(|r| (r.kind(), r)).collect();
        Ok(Self { options, runners })
    }

    /// Runs every requested task once against `raw_url`.
    ///
    /// Request errors are returned before any adapter starts. After that the
    /// call always succeeds: failures are reported per task in the result,
    /// in the same order as the resolved tasks.
    pub async fn run<S: AsRef<str>>(
        &self,
        raw_url: &str,
        requested: &[S],
        project_dir: &Path,
    ) -> Result<DispatchResult, ConfigError> {
        let kinds = tasks::resolve_tasks(requested)?;
        let url = target::normalize(raw_url);
        info!(
            url = %url,
            tasks = %kinds.iter().map(TaskKind::as_str).collect::<Vec<_>>().join(","),
            parallel = self.options.parallel,
            "dispatching"
        );

        let mut outcomes = Vec::with_capacity(kinds.len());
        if self.options.parallel {
            let handles: Vec<_> = kinds
                .iter()
                .map(|&kind| (kind, Instant::now(), self.spawn(kind, &url, project_dir)))
                .collect();
            for (kind, started, handle) in handles {
                outcomes.push(join(kind, started, handle).await);
            }
        } else {
            for &kind in &kinds {
                let started = Instant::now();
                let handle = self.spawn(kind, &url, project_dir);
                outcomes.push(join(kind, started, handle).await);
            }
        }

        Ok(DispatchResult::new(url, outcomes))
    }

    fn spawn(
        &self,
        kind: TaskKind,
        url: &TargetUrl,
        project_dir: &Path,
    ) -> Option<JoinHandle<TaskOutcome>> {
        let runner = self.runners.get(&kind)?.clone();
        let url = url.clone();
        let output_path: PathBuf = output::resolve_path_now(kind, &url, project_dir);
        Some(task::spawn(async move {
            info!(task = %kind, output = %output_path.display(), "starting");
            let started = Instant::now();
            let outcome = runner.execute(&url, &output_path).await;
            outcome.with_elapsed(started.elapsed())
        }))
    }
}

async fn join(
    kind: TaskKind,
    started: Instant,
    handle: Option<JoinHandle<TaskOutcome>>,
) -> TaskOutcome {
    let outcome = match handle {
        None => TaskOutcome::tool_missing(kind, format!("no runner registered for {kind}")),
        Some(handle) => match handle.await {
            Ok(outcome) => outcome,
            Err(e) => TaskOutcome::execution_failed(kind, format!("task aborted: {e}"))
                .with_elapsed(started.elapsed()),
        },
    };
    log_outcome(&outcome);
    outcome
}

fn log_outcome(outcome: &TaskOutcome) {
    let detail = outcome.detail.as_deref().unwrap_or("");
    match outcome.status {
        TaskStatus::Success => info!(
            task = %outcome.kind,
            output = %outcome.output_path.as_deref().map(|p| p.display().to_string()).unwrap_or_default(),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "completed"
        ),
        TaskStatus::EmptyResult => info!(task = %outcome.kind, detail, "no findings"),
        TaskStatus::ToolMissing => warn!(task = %outcome.kind, detail, "tool missing"),
        TaskStatus::ExecutionFailed => error!(task = %outcome.kind, detail, "failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    /// Writes a fixed body (or nothing) after an optional delay.
    struct FakeRunner {
        kind: TaskKind,
        delay: Duration,
        status: TaskStatus,
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, PathBuf)>>,
    }

    impl FakeRunner {
        fn new(kind: TaskKind, status: TaskStatus) -> Arc<Self> {
            Self::with_delay(kind, status, Duration::ZERO)
        }

        fn with_delay(kind: TaskKind, status: TaskStatus, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                kind,
                delay,
                status,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TaskRunner for FakeRunner {
        fn kind(&self) -> TaskKind {
            self.kind
        }

        async fn execute(&self, url: &TargetUrl, output_path: &Path) -> TaskOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((url.to_string(), output_path.to_path_buf()));
            tokio::time::sleep(self.delay).await;
            match self.status {
                TaskStatus::Success => {
                    std::fs::write(output_path, "finding\n").unwrap();
                    TaskOutcome::success(self.kind, output_path)
                }
                TaskStatus::EmptyResult => TaskOutcome::empty(self.kind, "nothing"),
                TaskStatus::ToolMissing => TaskOutcome::tool_missing(self.kind, "not installed"),
                TaskStatus::ExecutionFailed => TaskOutcome::execution_failed(self.kind, "boom"),
            }
        }
    }

    struct PanickingRunner;

    #[async_trait]
    impl TaskRunner for PanickingRunner {
        fn kind(&self) -> TaskKind {
            TaskKind::HeaderAudit
        }

        async fn execute(&self, _url: &TargetUrl, _output_path: &Path) -> TaskOutcome {
            panic!("adapter bug")
        }
    }

    fn dispatcher(parallel: bool, runners: Vec<Arc<dyn TaskRunner>>) -> Dispatcher {
        let options = Options {
            parallel,
            ..Options::default()
        };
        Dispatcher::with_runners(options, runners).unwrap()
    }

    fn all_succeeding() -> Vec<Arc<FakeRunner>> {
        TaskKind::CANONICAL
            .iter()
            .map(|&k| FakeRunner::new(k, TaskStatus::Success))
            .collect()
    }

    fn as_runners(fakes: &[Arc<FakeRunner>]) -> Vec<Arc<dyn TaskRunner>> {
        fakes.iter().map(|f| f.clone() as Arc<dyn TaskRunner>).collect()
    }

    #[tokio::test]
    async fn all_runs_every_kind_once_in_canonical_order() {
        let dir = tempfile::tempdir().unwrap();
        let fakes = all_succeeding();
        let d = dispatcher(false, as_runners(&fakes));
        let result = d.run("example.com", &["all"], dir.path()).await.unwrap();

        assert_eq!(result.kinds(), TaskKind::CANONICAL.to_vec());
        assert_eq!(result.target.as_str(), "https://example.com");
        for fake in &fakes {
            assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
            let seen = fake.seen.lock().unwrap();
            assert_eq!(seen[0].0, "https://example.com");
            assert!(seen[0].1.starts_with(dir.path()));
        }
        assert_eq!(result.count(TaskStatus::Success), 4);
    }

    #[tokio::test]
    async fn failures_do_not_stop_later_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let fakes = [
            FakeRunner::new(TaskKind::Csp, TaskStatus::Success),
            FakeRunner::new(TaskKind::DirBrute, TaskStatus::ToolMissing),
            FakeRunner::new(TaskKind::HeaderAudit, TaskStatus::ExecutionFailed),
            FakeRunner::new(TaskKind::TemplateScan, TaskStatus::EmptyResult),
        ];
        let d = dispatcher(false, as_runners(&fakes));
        let result = d
            .run("http://a.com", &["dir_brute", "header_audit", "template_scan", "csp"], dir.path())
            .await
            .unwrap();

        let statuses: Vec<_> = result.outcomes.iter().map(|o| o.status).collect();
        assert_eq!(
            statuses,
            vec![
                TaskStatus::ToolMissing,
                TaskStatus::ExecutionFailed,
                TaskStatus::EmptyResult,
                TaskStatus::Success,
            ]
        );
        assert_eq!(result.failures().count(), 2);
        let csp = result.get(TaskKind::Csp).unwrap();
        assert!(csp.output_path.as_ref().unwrap().exists());
    }

    #[tokio::test]
    async fn parallel_mode_keeps_resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        let delays = [400, 10, 300, 0];
        let fakes: Vec<_> = TaskKind::CANONICAL
            .iter()
            .zip(delays)
            .map(|(&k, ms)| FakeRunner::with_delay(k, TaskStatus::Success, Duration::from_millis(ms)))
            .collect();
        let d = dispatcher(true, as_runners(&fakes));
        let started = Instant::now();
        let result = d.run("a.com", &["all"], dir.path()).await.unwrap();

        assert_eq!(result.kinds(), TaskKind::CANONICAL.to_vec());
        assert!(started.elapsed() < Duration::from_millis(650));
    }

    #[tokio::test]
    async fn request_errors_run_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let fakes = all_succeeding();
        let d = dispatcher(false, as_runners(&fakes));

        let err = d.run("a.com", &["csp", "all"], dir.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::AggregateNotAlone { .. }));
        let err = d.run("a.com", &["bogus"], dir.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTask { .. }));
        let none: [&str; 0] = [];
        let err = d.run("a.com", &none, dir.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::NoTasks));

        assert!(fakes.iter().all(|f| f.calls.load(Ordering::SeqCst) == 0));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn duplicate_requests_run_once() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeRunner::new(TaskKind::Csp, TaskStatus::EmptyResult);
        let d = dispatcher(false, as_runners(&[fake.clone()]));
        let result = d.run("a.com", &["csp", "CSP", "csp"], dir.path()).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_runner_becomes_execution_failed() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeRunner::new(TaskKind::TemplateScan, TaskStatus::EmptyResult);
        let mut runners = as_runners(&[fake.clone()]);
        runners.push(Arc::new(PanickingRunner));
        let d = dispatcher(false, runners);
        let result = d
            .run("a.com", &["header_audit", "template_scan"], dir.path())
            .await
            .unwrap();
        assert_eq!(result.outcomes[0].status, TaskStatus::ExecutionFailed);
        assert_eq!(result.outcomes[1].status, TaskStatus::EmptyResult);
    }

    #[tokio::test]
    async fn unregistered_kind_is_tool_missing() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(false, Vec::new());
        let result = d.run("a.com", &["csp"], dir.path()).await.unwrap();
        assert_eq!(result.outcomes[0].status, TaskStatus::ToolMissing);
    }

    #[test]
    fn invalid_options_are_rejected_up_front() {
        let mut options = Options::default();
        options.dir_brute.threads = 0;
        assert!(matches!(
            Dispatcher::new(options),
            Err(ConfigError::InvalidSetting { field: "threads", .. })
        ));
    }
}
