use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const DEFAULT_SCHEME: &str = "https";

static RE_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").unwrap());

/// Scan target with an explicit scheme.
///
/// The text is kept exactly as normalized (no trailing slash is added), since
/// output file names are derived from it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TargetUrl(String);

impl TargetUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn scheme(&self) -> &str {
        self.0.split_once("://").map(|(s, _)| s).unwrap_or_default()
    }

    pub fn is_valid_url(&self) -> bool {
        reqwest::Url::parse(&self.0).is_ok()
    }
}

impl fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TargetUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn has_scheme(input: &str) -> bool {
    RE_SCHEME.is_match(input)
}

/// Makes sure `input` carries a scheme, prepending `https://` when it has none.
///
/// `host:port` inputs are treated as scheme-less. Nothing else is rewritten;
/// input that still does not parse as a URL is kept as-is and only logged.
pub fn normalize(input: &str) -> TargetUrl {
    if has_scheme(input) {
        return TargetUrl(input.to_string());
    }

    tracing::info!(url = input, "no scheme found, defaulting to {DEFAULT_SCHEME}://");
    let url = TargetUrl(format!("{DEFAULT_SCHEME}://{input}"));
    if !url.is_valid_url() {
        tracing::warn!(url = %url, "target does not parse as a URL, passing it through unchanged");
    }
    url
}
