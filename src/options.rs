use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_WORDLIST: &str = "/usr/share/wordlists/seclists/Discovery/Web-Content/big.txt";
pub const DEFAULT_EVALUATOR_URL: &str = "https://csp-evaluator.withgoogle.com";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0";

/// An external program and how long it may run.
#[derive(Clone, Debug)]
pub struct ToolOptions {
    /// Executable name (looked up in `PATH`) or path.
    pub binary: String,
    /// Hard ceiling; the process is killed once it is exceeded.
    pub timeout: Duration,
    /// Appended verbatim after the generated arguments.
    pub extra_args: Vec<String>,
}

impl ToolOptions {
    pub fn new(binary: &str, timeout_secs: u64) -> Self {
        Self {
            binary: binary.to_string(),
            timeout: Duration::from_secs(timeout_secs),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CspOptions {
    /// Budget for fetching the target page.
    pub fetch_timeout: Duration,
    /// Budget for loading, expanding and capturing the evaluator report.
    pub render_timeout: Duration,
    pub evaluator_url: String,
    /// Chrome/Chromium executable; auto-detected when unset.
    pub chrome_binary: Option<PathBuf>,
    pub user_agent: String,
}

#[derive(Clone, Debug)]
pub struct DirBruteOptions {
    pub tool: ToolOptions,
    pub wordlist: PathBuf,
    pub threads: u32,
}

#[derive(Clone, Debug)]
pub struct Options {
    pub csp: CspOptions,
    pub dir_brute: DirBruteOptions,
    pub header_audit: ToolOptions,
    pub template_scan: ToolOptions,
    /// Raw `Cookie` header value, e.g. `C1=V1; C2=V2`.
    pub cookies: Option<String>,
    /// Run the requested tasks concurrently instead of one after another.
    pub parallel: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            csp: CspOptions {
                fetch_timeout: Duration::from_secs(10),
                render_timeout: Duration::from_secs(60),
                evaluator_url: DEFAULT_EVALUATOR_URL.to_string(),
                chrome_binary: None,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            dir_brute: DirBruteOptions {
                tool: ToolOptions::new("gobuster", 1800),
                wordlist: PathBuf::from(DEFAULT_WORDLIST),
                threads: 10,
            },
            header_audit: ToolOptions::new("humble", 300),
            template_scan: ToolOptions::new("nuclei", 3600),
            cookies: None,
            parallel: false,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidSetting {
        field,
        reason: reason.into(),
    }
}

fn check_tool(
    field_binary: &'static str,
    field_timeout: &'static str,
    tool: &ToolOptions,
) -> Result<(), ConfigError> {
    if tool.binary.trim().is_empty() {
        return Err(invalid(field_binary, "binary name is empty"));
    }
    if tool.timeout.is_zero() {
        return Err(invalid(field_timeout, "expected a positive number of seconds"));
    }
    Ok(())
}

impl Options {
    /// Startup checks. Anything that depends on the filesystem at run time
    /// (wordlist, browser) is left to the adapters so it only affects one task.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.csp.fetch_timeout.is_zero() {
            return Err(invalid("csp_fetch_timeout", "expected a positive number of seconds"));
        }
        if self.csp.render_timeout.is_zero() {
            return Err(invalid("csp_render_timeout", "expected a positive number of seconds"));
        }
        match reqwest::Url::parse(&self.csp.evaluator_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            _ => {
                return Err(invalid(
                    "evaluator_url",
                    format!("'{}' is not an http(s) URL", self.csp.evaluator_url),
                ))
            }
        }
        if self.dir_brute.threads == 0 {
            return Err(invalid("threads", "expected a positive integer"));
        }
        check_tool("gobuster_binary", "gobuster_timeout", &self.dir_brute.tool)?;
        check_tool("humble_binary", "humble_timeout", &self.header_audit)?;
        check_tool("nuclei_binary", "nuclei_timeout", &self.template_scan)?;
        if let Some(cookies) = self.cookies.as_deref() {
            if cookies.contains(|c: char| c == '\r' || c == '\n') {
                return Err(invalid("cookies", "must be a single line"));
            }
        }
        Ok(())
    }
}
