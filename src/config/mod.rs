use std::env;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;

/// On-disk settings. Every field is optional; command-line flags win over
/// these and these win over built-in defaults.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigFile {
    pub wordlist: Option<String>,
    pub threads: Option<u32>,
    pub gobuster_binary: Option<String>,
    pub humble_binary: Option<String>,
    pub nuclei_binary: Option<String>,
    pub gobuster_timeout: Option<u64>,
    pub humble_timeout: Option<u64>,
    pub nuclei_timeout: Option<u64>,
    pub gobuster_args: Option<Vec<String>>,
    pub humble_args: Option<Vec<String>>,
    pub nuclei_args: Option<Vec<String>>,
    pub csp_fetch_timeout: Option<u64>,
    pub csp_render_timeout: Option<u64>,
    pub evaluator_url: Option<String>,
    #[serde(alias = "chrome")]
    pub chrome_binary: Option<String>,
    pub user_agent: Option<String>,
    pub cookies: Option<String>,
    pub parallel: Option<bool>,
    pub no_color: Option<bool>,
    pub output_format: Option<String>,
    pub log_file: Option<String>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

/// `~/.pluto/config.yml`, if a home directory can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".pluto").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Reads and parses `path`. A missing file yields the empty config only when
/// `allow_missing` is set.
pub fn load_config(path: &Path, allow_missing: bool) -> Result<ConfigFile, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound && allow_missing => {
            return Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ConfigError::ConfigNotFound {
                path: path.display().to_string(),
            })
        }
        Err(source) => {
            return Err(ConfigError::ConfigRead {
                path: path.display().to_string(),
                source,
            })
        }
    };
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::ConfigParse {
        path: path.display().to_string(),
        source,
    })
}

fn default_config_yaml() -> &'static str {
    r#"# pluto config
#
# Location (default):
#   ~/.pluto/config.yml
#
# Command-line flags take precedence over everything in this file.

# Directory brute force (gobuster)
wordlist: /usr/share/wordlists/seclists/Discovery/Web-Content/big.txt
threads: 10
gobuster_binary: gobuster
gobuster_timeout: 1800
# gobuster_args: ["--status-codes-blacklist", "404"]

# Header audit (humble)
humble_binary: humble
humble_timeout: 300
# humble_args: []

# Template scan (nuclei)
nuclei_binary: nuclei
nuclei_timeout: 3600
# nuclei_args: ["-severity", "medium,high,critical"]

# CSP evaluation
csp_fetch_timeout: 10
csp_render_timeout: 60
evaluator_url: https://csp-evaluator.withgoogle.com
# chrome_binary: /usr/bin/chromium
# user_agent: "Mozilla/5.0 ..."

# Sent to the CSP fetch, gobuster and nuclei
# cookies: "session=abc; theme=dark"

# Run requested tasks concurrently
parallel: false

# Output
no_color: false
# text or json
output_format: text
# log_file: ~/.pluto/pluto.log
"#
}

/// Writes the commented default config unless a file already exists.
/// Returns whether a file was written.
pub fn ensure_default_config_file(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }
    let write_error = |source| ConfigError::ConfigWrite {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }
    std::fs::write(path, default_config_yaml()).map_err(write_error)?;
    Ok(true)
}
