use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tracing::debug;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::dispatcher::Dispatcher;
use crate::error::ConfigError;
use crate::logging;
use crate::options::{self, Options, ToolOptions};
use crate::output::{report, OutputFormat};
use crate::target;
use crate::task::{self, TaskKind};

fn print_banner() {
    const BANNER: &str = r#"
           __      __
    ____  / /_  __/ /_____
   / __ \/ / / / / __/ __ \
  / /_/ / / /_/ / /_/ /_/ /
 / .___/_/\__,_/\__/\____/
/_/
"#;
    print!("{}", BANNER.bright_cyan());
    println!(
        "       v{} - web security task dispatcher",
        env!("CARGO_PKG_VERSION")
    );
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[derive(Clone, Debug)]
struct RunConfig {
    url: String,
    tasks: Vec<String>,
    resolved: Vec<TaskKind>,
    project_dir: PathBuf,
    options: Options,
    format: OutputFormat,
    no_color: bool,
    log_file: Option<PathBuf>,
    verbosity: u8,
    config_path: Option<PathBuf>,
}

fn tool_options(
    binary: Option<String>,
    default_binary: &str,
    timeout_override: Option<u64>,
    timeout: Option<u64>,
    default_timeout: u64,
    extra_args: Option<Vec<String>>,
) -> ToolOptions {
    let mut tool = ToolOptions::new(
        &binary.unwrap_or_else(|| default_binary.to_string()),
        timeout_override.or(timeout).unwrap_or(default_timeout),
    );
    tool.extra_args = extra_args.unwrap_or_default();
    tool
}

/// CLI flags over config file over defaults.
fn build_options(args: &CliArgs, cfg: ConfigFile) -> Result<Options, ConfigError> {
    let defaults = Options::default();
    let secs = |d: Duration| d.as_secs();

    let mut options = Options {
        csp: options::CspOptions {
            fetch_timeout: Duration::from_secs(
                cfg.csp_fetch_timeout
                    .unwrap_or(secs(defaults.csp.fetch_timeout)),
            ),
            render_timeout: Duration::from_secs(
                cfg.csp_render_timeout
                    .unwrap_or(secs(defaults.csp.render_timeout)),
            ),
            evaluator_url: args
                .evaluator_url
                .clone()
                .or(cfg.evaluator_url)
                .unwrap_or(defaults.csp.evaluator_url),
            chrome_binary: args
                .chrome
                .as_deref()
                .or(cfg.chrome_binary.as_deref())
                .map(config::expand_tilde),
            user_agent: cfg.user_agent.unwrap_or(defaults.csp.user_agent),
        },
        dir_brute: options::DirBruteOptions {
            tool: tool_options(
                cfg.gobuster_binary,
                "gobuster",
                args.timeout,
                cfg.gobuster_timeout,
                secs(defaults.dir_brute.tool.timeout),
                cfg.gobuster_args,
            ),
            wordlist: args
                .wordlist
                .as_deref()
                .or(cfg.wordlist.as_deref())
                .map(config::expand_tilde)
                .unwrap_or(defaults.dir_brute.wordlist),
            threads: args
                .threads
                .or(cfg.threads)
                .unwrap_or(defaults.dir_brute.threads),
        },
        header_audit: tool_options(
            cfg.humble_binary,
            "humble",
            args.timeout,
            cfg.humble_timeout,
            secs(defaults.header_audit.timeout),
            cfg.humble_args,
        ),
        template_scan: tool_options(
            cfg.nuclei_binary,
            "nuclei",
            args.timeout,
            cfg.nuclei_timeout,
            secs(defaults.template_scan.timeout),
            cfg.nuclei_args,
        ),
        cookies: args.cookies.clone().or(cfg.cookies),
        parallel: args.parallel || cfg.parallel.unwrap_or(false),
    };
    options.cookies = options.cookies.filter(|c| !c.trim().is_empty());
    options.validate()?;
    Ok(options)
}

fn ensure_project_dir(raw: &str) -> Result<PathBuf, ConfigError> {
    let path = config::expand_tilde(raw);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(ConfigError::ProjectDirMissing {
            path: path.display().to_string(),
        })
    }
}

fn build_run_config(
    args: CliArgs,
    cfg: ConfigFile,
    config_path: Option<PathBuf>,
) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let url = args
        .url
        .clone()
        .ok_or_else(|| "missing --url".to_string())?;
    let project_raw = args
        .project_path
        .clone()
        .ok_or_else(|| "missing --project-path".to_string())?;

    let resolved = task::resolve_tasks(&args.tasks[..]).map_err(|e| e.to_string())?;
    let project_dir = ensure_project_dir(&project_raw).map_err(|e| e.to_string())?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);
    let log_file = args
        .log_file
        .as_deref()
        .or(cfg.log_file.as_deref())
        .map(config::expand_tilde);
    let format = if args.json {
        OutputFormat::Json
    } else {
        match cfg.output_format.as_deref() {
            None => OutputFormat::Text,
            Some(raw) => OutputFormat::parse(raw)
                .ok_or_else(|| format!("invalid output_format '{raw}', expected text or json"))?,
        }
    };
    let options = build_options(&args, cfg).map_err(|e| e.to_string())?;

    Ok(RunConfig {
        url: url.trim().to_string(),
        tasks: args.tasks,
        resolved,
        project_dir,
        options,
        format,
        no_color,
        log_file,
        verbosity: args.verbose,
        config_path,
    })
}

fn print_run_summary(run: &RunConfig) {
    print_banner();
    format_kv_line("Target", target::normalize(&run.url).as_str());
    format_kv_line(
        "Tasks",
        &run.resolved
            .iter()
            .map(TaskKind::as_str)
            .collect::<Vec<_>>()
            .join(", "),
    );
    format_kv_line("Project", &run.project_dir.display().to_string());
    format_kv_line("Parallel", format_bool(run.options.parallel));
    if run.resolved.contains(&TaskKind::DirBrute) {
        format_kv_line("Wordlist", &run.options.dir_brute.wordlist.display().to_string());
        format_kv_line("Threads", &run.options.dir_brute.threads.to_string());
    }
    if run.resolved.contains(&TaskKind::Csp) {
        format_kv_line("Evaluator", &run.options.csp.evaluator_url);
    }
    format_kv_line("Cookies", format_bool(run.options.cookies.is_some()));
    if let Some(path) = run.config_path.as_deref() {
        format_kv_line("Config", &path.display().to_string());
    }
    println!();
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    let dispatcher = Dispatcher::new(run.options.clone()).map_err(|e| e.to_string())?;

    if run.format == OutputFormat::Text {
        print_run_summary(&run);
    }

    let result = dispatcher
        .run(&run.url, &run.tasks[..], &run.project_dir)
        .await
        .map_err(|e| e.to_string())?;

    if run.format == OutputFormat::Text {
        println!();
    }
    println!("{}", report::render(&result, run.format));
    Ok(())
}

fn init_config_file(path: Option<&Path>) -> Result<(), String> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config::default_config_path()
            .ok_or_else(|| "cannot determine home directory for ~/.pluto/config.yml".to_string())?,
    };
    let written = config::ensure_default_config_file(&path).map_err(|e| e.to_string())?;
    if written {
        println!("Wrote default config to {}", path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    // Help, version and usage errors are printed by clap, which exits with
    // its own status.
    let args = CliArgs::parse();

    let user_config_path = args.config.as_deref().map(config::expand_tilde);
    if args.init_config {
        return init_config_file(user_config_path.as_deref());
    }

    let (cfg, config_path) = match user_config_path {
        Some(path) => (config::load_config(&path, false).map_err(|e| e.to_string())?, Some(path)),
        None => match config::default_config_path() {
            Some(path) if path.is_file() => {
                (config::load_config(&path, true).map_err(|e| e.to_string())?, Some(path))
            }
            _ => (ConfigFile::default(), None),
        },
    };

    let run = build_run_config(args, cfg, config_path)?;
    if run.no_color {
        colored::control::set_override(false);
    }
    logging::initialize_logging(run.verbosity, run.log_file.as_deref(), run.no_color)?;
    debug!(?run.options, "resolved options");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
