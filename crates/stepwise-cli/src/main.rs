//! Stepwise CLI: run the Stepik free-course journey
//!
//! ## Usage
//!
//! ```bash
//! STEPIK_LOGIN=me@example.com STEPIK_PASSWORD=... stepwise run --query python
//! stepwise run --query python --headed --screenshot-dir shots --report run.json
//! stepwise run --query python --simulate stale-auth
//! stepwise config
//! ```

use clap::Parser;
use std::process::ExitCode;
use stepwise::JourneyConfig;
use stepwise_cli::{
    logging, Cli, CliConfig, CliResult, Commands, ConfigArgs, JourneyRunner, RunArgs, Verbosity,
};

const EXIT_JOURNEY_FAILED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);

    match run(cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            if e.is_config() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::from(EXIT_JOURNEY_FAILED)
            }
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.clone().into())
        .with_log_json(cli.log_json)
}

fn run(command: Commands, config: &CliConfig) -> CliResult<ExitCode> {
    match command {
        Commands::Run(args) => {
            logging::init(config)?;
            run_journey(config, args)
        }
        Commands::Config(args) => {
            show_config(&args);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_journey(config: &CliConfig, args: RunArgs) -> CliResult<ExitCode> {
    let mut runner = JourneyRunner::new(config, args)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(runner.run())?;

    if outcome.is_success() {
        return Ok(ExitCode::SUCCESS);
    }
    let json = outcome
        .report
        .to_json()
        .map_err(|e| stepwise_cli::CliError::report_generation(e.to_string()))?;
    println!("{json}");
    Ok(ExitCode::from(EXIT_JOURNEY_FAILED))
}

fn show_config(args: &ConfigArgs) {
    let config = JourneyConfig::new().base_url(args.base_url.clone());
    let t = &config.timeouts;
    println!("Journey configuration:");
    println!("  base_url:            {}", config.base_url);
    println!("  login_url:           {}", config.login_url());
    println!("  catalog_url:         {}", config.catalog_url());
    println!("  search_url:          {}", config.search_url());
    println!("  default_timeout:     {:?}", config.default_timeout);
    println!("  navigation_timeout:  {:?}", config.navigation_timeout);
    println!("  settle_budget:       {:?}", config.settle_budget);
    println!("  poll_interval:       {:?}", config.poll_interval);
    println!("  filter_settle_delay: {:?}", config.filter_settle_delay);
    println!("Wait budgets:");
    for (name, budget) in [
        ("login_form", t.login_form),
        ("login_redirect", t.login_redirect),
        ("marker_attached", t.marker_attached),
        ("marker_visible", t.marker_visible),
        ("search_route", t.search_route),
        ("search_query", t.search_query),
        ("filter_flag", t.filter_flag),
        ("result_cards", t.result_cards),
        ("course_open", t.course_open),
        ("fallback", t.fallback),
    ] {
        println!("  {name:<19}  {budget:?}");
    }
}
