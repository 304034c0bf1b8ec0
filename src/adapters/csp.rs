use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, info};

use super::render::{PolicyRenderer, RenderError};
use super::TaskRunner;
use crate::options::CspOptions;
use crate::outcome::TaskOutcome;
use crate::target::TargetUrl;
use crate::task::TaskKind;

pub const CSP_HEADER: &str = "content-security-policy";
pub const CSP_REPORT_ONLY_HEADER: &str = "content-security-policy-report-only";

static META_HTTP_EQUIV: Lazy<Selector> = Lazy::new(|| Selector::parse("meta[http-equiv]").unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicySource {
    Header,
    ReportOnlyHeader,
    MetaTag,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredPolicy {
    pub policy: String,
    pub source: PolicySource,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("cookies are not a valid header value")]
    InvalidCookie,

    #[error("error fetching CSP from {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request { source, .. } if source.is_timeout())
    }
}

fn header_policy(headers: &HeaderMap, name: &str) -> Option<String> {
    let values: Vec<String> = headers
        .get_all(name)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

/// Enforced policy first, then the report-only one. Empty values count as absent.
pub fn policy_from_headers(headers: &HeaderMap) -> Option<DiscoveredPolicy> {
    if let Some(policy) = header_policy(headers, CSP_HEADER) {
        return Some(DiscoveredPolicy {
            policy,
            source: PolicySource::Header,
        });
    }
    header_policy(headers, CSP_REPORT_ONLY_HEADER).map(|policy| DiscoveredPolicy {
        policy,
        source: PolicySource::ReportOnlyHeader,
    })
}

/// Content of the first `<meta http-equiv="Content-Security-Policy">` with a
/// non-empty `content`. The attribute value is matched case-insensitively.
pub fn policy_from_html(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    document
        .select(&META_HTTP_EQUIV)
        .filter(|el| {
            el.value()
                .attr("http-equiv")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(CSP_HEADER))
        })
        .filter_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

/// Fetches the target's policy and has it rendered by the evaluator.
pub struct CspAdapter {
    options: CspOptions,
    cookies: Option<String>,
    renderer: Arc<dyn PolicyRenderer>,
}

impl CspAdapter {
    pub fn new(
        options: CspOptions,
        cookies: Option<String>,
        renderer: Arc<dyn PolicyRenderer>,
    ) -> Self {
        Self {
            options,
            cookies,
            renderer,
        }
    }

    fn client(&self) -> Result<reqwest::Client, FetchError> {
        let mut headers = HeaderMap::new();
        if let Some(cookies) = self.cookies.as_deref() {
            let value = HeaderValue::from_str(cookies).map_err(|_| FetchError::InvalidCookie)?;
            headers.insert(COOKIE, value);
        }
        reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(self.options.user_agent.clone())
            .timeout(self.options.fetch_timeout)
            .danger_accept_invalid_hostnames(true)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(FetchError::Client)
    }

    /// GETs the target and looks for a policy in the headers, then in the HTML.
    ///
    /// `Ok(None)` means the page was fetched but carries no policy. Network
    /// errors and non-success statuses are errors.
    pub async fn fetch_policy(&self, url: &TargetUrl) -> Result<Option<DiscoveredPolicy>, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        info!(url = %url, "fetching CSP");
        let response = self
            .client()?
            .get(url.as_str())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(request_error)?;

        if let Some(found) = policy_from_headers(response.headers()) {
            return Ok(Some(found));
        }

        debug!(url = %url, "no CSP in headers, checking meta tags");
        let body = response.text().await.map_err(request_error)?;
        Ok(policy_from_html(&body).map(|policy| DiscoveredPolicy {
            policy,
            source: PolicySource::MetaTag,
        }))
    }
}

#[async_trait]
impl TaskRunner for CspAdapter {
    fn kind(&self) -> TaskKind {
        TaskKind::Csp
    }

    async fn execute(&self, url: &TargetUrl, output_path: &Path) -> TaskOutcome {
        let kind = self.kind();
        let found = match self.fetch_policy(url).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                return TaskOutcome::empty(
                    kind,
                    format!("no CSP found in headers or meta tags of {url}"),
                )
            }
            Err(e) if e.is_timeout() => {
                return TaskOutcome::timed_out(kind, "CSP fetch", self.options.fetch_timeout)
            }
            Err(e) => return TaskOutcome::execution_failed(kind, e.to_string()),
        };
        info!(url = %url, source = ?found.source, policy = %found.policy, "CSP found");

        let html = match self.renderer.render(&found.policy, url).await {
            Ok(html) => html,
            Err(RenderError::BrowserUnavailable(reason)) => {
                return TaskOutcome::tool_missing(kind, reason)
            }
            Err(RenderError::Timeout(budget)) => {
                return TaskOutcome::timed_out(kind, "CSP evaluator rendering", budget)
            }
            Err(e) => return TaskOutcome::execution_failed(kind, e.to_string()),
        };

        if let Err(e) = tokio::fs::write(output_path, html).await {
            return TaskOutcome::execution_failed(
                kind,
                format!("cannot write {}: {e}", output_path.display()),
            );
        }
        TaskOutcome::success(kind, output_path)
    }
}
