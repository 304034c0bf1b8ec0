use std::path::{Path, PathBuf};
use std::time::Duration;

use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::dispatcher::Dispatcher;
use crate::options::Options;
use crate::outcome::TaskStatus;
use crate::task::TaskKind;

#[cfg(unix)]
fn stub_tool(dir: &Path, name: &str, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

fn options_with_wordlist(dir: &Path) -> Options {
    let wordlist = dir.join("words.txt");
    std::fs::write(&wordlist, "admin\nlogin\n").unwrap();
    let mut options = Options::default();
    options.dir_brute.wordlist = wordlist;
    options.dir_brute.tool.timeout = Duration::from_secs(10);
    options.header_audit.timeout = Duration::from_secs(10);
    options.template_scan.timeout = Duration::from_secs(10);
    options.csp.fetch_timeout = Duration::from_secs(5);
    options
}

fn file_name(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
#[tokio::test]
async fn missing_csp_does_not_block_directory_brute_force() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let tools = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let mut options = options_with_wordlist(tools.path());
    options.dir_brute.tool.binary = stub_tool(
        tools.path(),
        "gobuster",
        "echo '/admin (Status: 301) [Size: 0]'\necho '/login (Status: 200) [Size: 512]'",
    );

    let dispatcher = Dispatcher::new(options).unwrap();
    let result = dispatcher
        .run(&server.uri(), &["csp", "dir_brute"], project.path())
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    let csp = result.get(TaskKind::Csp).unwrap();
    assert_eq!(csp.status, TaskStatus::EmptyResult);
    assert!(csp.output_path.is_none());

    let brute = result.get(TaskKind::DirBrute).unwrap();
    assert_eq!(brute.status, TaskStatus::Success, "{:?}", brute.detail);
    let name = file_name(&brute.output_path);
    assert!(name.starts_with("dir_brute_http_127.0.0.1_"), "{name}");
    assert!(name.ends_with(".txt"), "{name}");
    let body = std::fs::read_to_string(brute.output_path.as_ref().unwrap()).unwrap();
    assert!(body.contains("/admin (Status: 301)"));

    let written: Vec<_> = std::fs::read_dir(project.path()).unwrap().collect();
    assert_eq!(written.len(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn absent_tool_is_isolated_from_later_tasks() {
    let tools = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let mut options = options_with_wordlist(tools.path());
    options.header_audit.binary = "pluto-test-no-such-humble".to_string();
    options.template_scan.binary = stub_tool(
        tools.path(),
        "nuclei",
        r#"while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then echo '[tech-detect:nginx] [http] [info] https://a.com' > "$2"; fi
  shift
done"#,
    );

    let dispatcher = Dispatcher::new(options).unwrap();
    let result = dispatcher
        .run("a.com", &["header_audit", "template_scan"], project.path())
        .await
        .unwrap();

    assert_eq!(result.target.as_str(), "https://a.com");
    assert_eq!(result.outcomes[0].status, TaskStatus::ToolMissing);
    assert!(result.outcomes[0]
        .detail
        .as_deref()
        .unwrap()
        .contains("pluto-test-no-such-humble"));
    assert_eq!(result.outcomes[1].status, TaskStatus::Success);
    let name = file_name(&result.outcomes[1].output_path);
    assert!(name.starts_with("template_scan_https_a.com_"), "{name}");
}

#[cfg(unix)]
#[tokio::test]
async fn hung_tool_is_killed_and_reported_as_timeout() {
    let tools = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let mut options = options_with_wordlist(tools.path());
    options.dir_brute.tool.binary = stub_tool(tools.path(), "gobuster", "sleep 30");
    options.dir_brute.tool.timeout = Duration::from_secs(1);
    options.template_scan.binary = "true".to_string();

    let dispatcher = Dispatcher::new(options).unwrap();
    let started = std::time::Instant::now();
    let result = dispatcher
        .run("a.com", &["dir_brute", "template_scan"], project.path())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(result.outcomes[0].is_timeout(), "{:?}", result.outcomes[0].detail);
    assert_eq!(result.outcomes[1].status, TaskStatus::EmptyResult);
    assert_eq!(std::fs::read_dir(project.path()).unwrap().count(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn unreachable_target_and_missing_wordlist_fail_independently() {
    let tools = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let mut options = options_with_wordlist(tools.path());
    options.dir_brute.tool.binary = "true".to_string();
    options.dir_brute.wordlist = tools.path().join("missing.txt");

    let dispatcher = Dispatcher::new(options).unwrap();
    let result = dispatcher
        .run("http://127.0.0.1:9", &["csp", "dir_brute"], project.path())
        .await
        .unwrap();

    assert_eq!(result.kinds(), vec![TaskKind::Csp, TaskKind::DirBrute]);
    assert_eq!(result.outcomes[0].status, TaskStatus::ExecutionFailed);
    assert_eq!(result.outcomes[1].status, TaskStatus::ExecutionFailed);
    assert!(result.outcomes[1]
        .detail
        .as_deref()
        .unwrap()
        .contains("wordlist not found"));
}

#[tokio::test]
async fn json_summary_lists_outcomes_in_order() {
    let project = tempfile::tempdir().unwrap();
    let dispatcher = Dispatcher::with_runners(Options::default(), Vec::new()).unwrap();
    let result = dispatcher.run("a.com", &["all"], project.path()).await.unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&crate::output::report::render_json(&result)).unwrap();
    let kinds: Vec<_> = json["outcomes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, ["csp", "dir_brute", "header_audit", "template_scan"]);
    assert_eq!(json["target"], "https://a.com");
    assert!(json["outcomes"][0]["status"].is_string());
}

#[cfg(unix)]
#[tokio::test]
async fn missing_gobuster_leaves_header_audit_unaffected() {
    let tools = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let mut options = options_with_wordlist(tools.path());
    options.dir_brute.tool.binary = "pluto-test-no-such-gobuster".to_string();
    options.header_audit.binary = "true".to_string();

    let result = Dispatcher::new(options)
        .unwrap()
        .run("example.com", &["dir_brute", "header_audit"], project.path())
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.outcomes[0].status, TaskStatus::ToolMissing);
    assert_eq!(result.outcomes[1].kind, TaskKind::HeaderAudit);
    assert_eq!(result.outcomes[1].status, TaskStatus::EmptyResult);
}

#[tokio::test]
async fn absent_gobuster_is_tool_missing_with_stock_wordlist() {
    let project = tempfile::tempdir().unwrap();
    let mut options = Options::default();
    options.dir_brute.tool.binary = "pluto-test-no-such-gobuster".to_string();
    options.header_audit.binary = "pluto-test-no-such-humble".to_string();

    let result = Dispatcher::new(options)
        .unwrap()
        .run("a.com", &["dir_brute", "header_audit"], project.path())
        .await
        .unwrap();

    assert_eq!(result.outcomes[0].kind, TaskKind::DirBrute);
    assert_eq!(
        result.outcomes[0].status,
        TaskStatus::ToolMissing,
        "{:?}",
        result.outcomes[0].detail
    );
    assert_eq!(result.outcomes[1].status, TaskStatus::ToolMissing);
    assert_eq!(std::fs::read_dir(project.path()).unwrap().count(), 0);
}
