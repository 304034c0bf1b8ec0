use crate::cli::args::CliArgs;

/// Checks on flag values that clap cannot express.
pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(url) = args.url.as_deref() {
        if url.trim().is_empty() {
            return Err("invalid --url, expected a non-empty target".to_string());
        }
    }
    if let Some(threads) = args.threads {
        if threads == 0 {
            return Err("invalid --threads, expected positive integer".to_string());
        }
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid --timeout, expected a positive number of seconds".to_string());
        }
    }
    if let Some(raw) = args.evaluator_url.as_deref() {
        reqwest::Url::parse(raw).map_err(|e| format!("invalid --evaluator-url '{raw}': {e}"))?;
    }
    if let Some(raw) = args.cookies.as_deref() {
        if raw.contains(|c: char| c == '\r' || c == '\n') {
            return Err("invalid --cookies, must be a single line".to_string());
        }
    }
    Ok(())
}
