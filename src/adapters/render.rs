//! Rendering a policy through the CSP evaluator web UI in headless Chrome.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::options::CspOptions;
use crate::target::TargetUrl;

const EXPAND_ALL_SELECTOR: &str = "#expand_all";
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Elements of the evaluator UI that make no sense in a saved report.
const REMOVED_IDS: &[&str] = &[
    "example_bad",
    "example_good",
    "check",
    "csp-version",
    "version-help",
    "expand_all",
];

const CLEANUP_TEMPLATE: &str = r#"(() => {
  const base = __BASE__;
  const target = __TARGET__;
  for (const link of document.querySelectorAll('link[href]')) {
    const href = link.getAttribute('href');
    if (href.startsWith('/')) link.setAttribute('href', base + href);
  }
  const logo = document.getElementById('evaluator_logo');
  if (logo && (logo.getAttribute('src') || '').startsWith('/')) {
    logo.setAttribute('src', base + logo.getAttribute('src'));
  }
  for (const id of __IDS__) {
    const el = document.getElementById(id);
    if (el) el.remove();
  }
  const footer = document.querySelector('footer');
  if (footer) footer.remove();
  for (const p of document.querySelectorAll('p')) {
    if (p.textContent.includes('CSP Evaluator allows developers')) {
      p.remove();
      break;
    }
  }
  document.querySelectorAll('br').forEach((br) => br.remove());
  for (const h3 of document.querySelectorAll('h3')) {
    if (h3.textContent.trim() === 'CSP Evaluator') {
      h3.textContent = 'CSP Evaluator report for ' + target;
      break;
    }
  }
  return true;
})()"#;

#[derive(Debug, Error)]
pub enum RenderError {
    /// Chrome is not installed, not found, or would not start.
    #[error("{0}")]
    BrowserUnavailable(String),

    #[error("rendering exceeded {0:?}")]
    Timeout(Duration),

    #[error("invalid evaluator URL '{url}': {reason}")]
    EvaluatorUrl { url: String, reason: String },

    #[error("evaluator page failed: {0}")]
    Page(String),
}

/// Turns a policy into a self-contained findings document.
#[async_trait]
pub trait PolicyRenderer: Send + Sync {
    async fn render(&self, policy: &str, target: &TargetUrl) -> Result<String, RenderError>;
}

/// `<evaluator>?csp=<policy>`, with the policy percent-encoded.
pub fn evaluator_page_url(evaluator_url: &str, policy: &str) -> Result<reqwest::Url, RenderError> {
    reqwest::Url::parse_with_params(evaluator_url, &[("csp", policy)]).map_err(|e| {
        RenderError::EvaluatorUrl {
            url: evaluator_url.to_string(),
            reason: e.to_string(),
        }
    })
}

/// In-page script that makes the expanded report standalone: absolute
/// stylesheet and logo URLs, UI chrome removed, heading naming the target.
pub fn cleanup_script(evaluator_url: &str, target: &TargetUrl) -> String {
    let base = evaluator_url.trim_end_matches('/');
    let quote = |s: &str| serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string());
    let ids = serde_json::to_string(REMOVED_IDS).unwrap_or_else(|_| "[]".to_string());
    CLEANUP_TEMPLATE
        .replace("__BASE__", &quote(base))
        .replace("__TARGET__", &quote(target.as_str()))
        .replace("__IDS__", &ids)
}

fn page_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::Page(e.to_string())
}

async fn wait_for_element(page: &Page, selector: &str) -> Element {
    loop {
        if let Ok(element) = page.find_element(selector).await {
            return element;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn wait_for_condition(page: &Page, expression: &str) {
    loop {
        let ready = match page.evaluate(expression).await {
            Ok(result) => result.into_value::<bool>().unwrap_or(false),
            Err(_) => false,
        };
        if ready {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn capture(browser: &Browser, page_url: &str, script: &str) -> Result<String, RenderError> {
    let page = browser.new_page(page_url).await.map_err(page_error)?;
    let expand_all = wait_for_element(&page, EXPAND_ALL_SELECTOR).await;
    expand_all.click().await.map_err(page_error)?;
    wait_for_condition(&page, "document.readyState === 'complete'").await;
    page.evaluate(script).await.map_err(page_error)?;
    page.content().await.map_err(page_error)
}

/// Headless Chrome driven over CDP. A fresh browser is launched per render
/// and is shut down before `render` returns.
#[derive(Clone, Debug)]
pub struct ChromeRenderer {
    options: CspOptions,
}

impl ChromeRenderer {
    pub fn new(options: CspOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-dev-shm-usage")
            .request_timeout(self.options.render_timeout);
        if let Some(path) = self.options.chrome_binary.as_ref() {
            if !path.is_file() {
                return Err(RenderError::BrowserUnavailable(format!(
                    "chrome binary not found: {}",
                    path.display()
                )));
            }
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(RenderError::BrowserUnavailable)
    }
}

#[async_trait]
impl PolicyRenderer for ChromeRenderer {
    async fn render(&self, policy: &str, target: &TargetUrl) -> Result<String, RenderError> {
        let page_url = evaluator_page_url(&self.options.evaluator_url, policy)?;
        let script = cleanup_script(&self.options.evaluator_url, target);
        let config = self.browser_config()?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::BrowserUnavailable(format!("failed to launch chrome: {e}")))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        info!(evaluator = %self.options.evaluator_url, "rendering CSP evaluation");
        let budget = self.options.render_timeout;
        let captured =
            tokio::time::timeout(budget, capture(&browser, page_url.as_str(), &script)).await;

        let closed = matches!(
            tokio::time::timeout(SHUTDOWN_GRACE, browser.close()).await,
            Ok(Ok(_))
        );
        if !closed {
            debug!("graceful browser close failed, killing");
            if let Some(Err(e)) = browser.kill().await {
                warn!(error = %e, "failed to kill chrome");
            }
        }
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, browser.wait()).await;
        handler_task.abort();

        match captured {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout(budget)),
        }
    }
}
