use clap::builder::PossibleValuesParser;
use clap::{ArgAction, Parser};

use crate::task::TASK_NAMES;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pluto",
    version,
    about = "web security task dispatcher",
    long_about = "Pluto runs web security checks against one target and saves each tool's report into a project directory.\n\nTasks:\n  csp            fetch the Content-Security-Policy and render a CSP Evaluator report (HTML)\n  dir_brute      directory brute force with gobuster (TXT)\n  header_audit   HTTP header analysis with humble (PDF)\n  template_scan  vulnerability templates with nuclei (TXT)\n  all            every task above, in that order\n\nExamples:\n  pluto csp -u example.com -p ./project\n  pluto all -u https://example.com -p ./project --parallel\n  pluto dir_brute template_scan -u example.com -p ./project --cookies 'sid=1'\n\nTip: Use --init-config to write ~/.pluto/config.yml and keep tool paths there."
)]
pub struct CliArgs {
    #[arg(
        value_name = "TASK",
        value_parser = PossibleValuesParser::new(TASK_NAMES.iter().copied()),
        ignore_case = true,
        required_unless_present = "init_config",
        help = "Tasks to run; `all` cannot be combined with other tasks."
    )]
    pub tasks: Vec<String>,

    #[arg(
        short = 'u',
        long = "url",
        value_name = "URL",
        required_unless_present = "init_config",
        help_heading = "Target",
        help = "Target URL; https:// is assumed when no scheme is given."
    )]
    pub url: Option<String>,

    #[arg(
        short = 'p',
        long = "project-path",
        visible_alias = "project",
        value_name = "DIR",
        required_unless_present = "init_config",
        help_heading = "Target",
        help = "Existing directory that receives the reports."
    )]
    pub project_path: Option<String>,

    #[arg(
        short = 'c',
        long = "cookies",
        value_name = "COOKIES",
        help_heading = "Target",
        help = "Cookie header value, e.g. 'C1=V1; C2=V2'."
    )]
    pub cookies: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        help_heading = "Config",
        help = "Path to config file (defaults to ~/.pluto/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "init-config",
        help_heading = "Config",
        help = "Write a default config file and exit."
    )]
    pub init_config: bool,

    #[arg(
        short = 'w',
        long = "wordlist",
        value_name = "FILE",
        help_heading = "Tools",
        help = "Wordlist for dir_brute."
    )]
    pub wordlist: Option<String>,

    #[arg(
        short = 't',
        long = "threads",
        value_name = "N",
        help_heading = "Tools",
        help = "gobuster thread count."
    )]
    pub threads: Option<u32>,

    #[arg(
        long = "timeout",
        value_name = "SECS",
        help_heading = "Tools",
        help = "Execution ceiling applied to every external tool."
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "parallel",
        help_heading = "Tools",
        help = "Run the requested tasks concurrently."
    )]
    pub parallel: bool,

    #[arg(
        long = "chrome",
        visible_alias = "chrome-binary",
        value_name = "FILE",
        help_heading = "CSP",
        help = "Chrome/Chromium executable used to render the CSP report."
    )]
    pub chrome: Option<String>,

    #[arg(
        long = "evaluator-url",
        value_name = "URL",
        help_heading = "CSP",
        help = "CSP Evaluator base URL."
    )]
    pub evaluator_url: Option<String>,

    #[arg(
        long = "json",
        help_heading = "Output",
        help = "Print the run summary as JSON."
    )]
    pub json: bool,

    #[arg(
        long = "no-color",
        visible_alias = "nc",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        long = "log-file",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write logs to FILE instead of stderr."
    )]
    pub log_file: Option<String>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase log verbosity (-v debug, -vv trace)."
    )]
    pub verbose: u8,
}
