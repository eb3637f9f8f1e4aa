//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use stepwise::config::DEFAULT_BASE_URL;
use stepwise::{StaleAuth, StepikSimulation, LOGIN_ENV, PASSWORD_ENV};

/// Stepwise: drive the Stepik catalog from sign-in to a free course
#[derive(Parser, Debug)]
#[command(name = "stepwise")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the free-course journey
    Run(RunArgs),

    /// Show the effective URLs and wait budgets
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Search term
    #[arg(long)]
    pub query: String,

    /// Site root
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Account e-mail
    #[arg(long, env = LOGIN_ENV, hide_env_values = true)]
    pub login: Option<String>,

    /// Account password
    #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
    pub password: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Chromium executable
    #[arg(long)]
    pub chromium_path: Option<PathBuf>,

    /// Save a full-page screenshot here when the journey fails
    #[arg(long)]
    pub screenshot_dir: Option<PathBuf>,

    /// Write the JSON run report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Run against a scripted in-memory site instead of a browser
    #[arg(long, value_enum)]
    pub simulate: Option<SimulatedSite>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Site root
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
}

/// Scripted site behaviors for smoke runs
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulatedSite {
    /// Everything converges
    Healthy,
    /// The auth-intent parameter survives until cookies are cleared
    StaleAuth,
    /// The free filter leaves no results
    NoFreeResults,
    /// The login form is missing
    NoLoginForm,
}

impl SimulatedSite {
    /// Scripted site for this behavior
    #[must_use]
    pub fn simulation(self) -> StepikSimulation {
        let site = StepikSimulation::new();
        match self {
            Self::Healthy => site,
            Self::StaleAuth => site.stale_auth(StaleAuth::UntilCookiesCleared),
            Self::NoFreeResults => site.free_results(0),
            Self::NoLoginForm => site.without_login_form(),
        }
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
