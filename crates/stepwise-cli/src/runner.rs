//! Journey runner: driver selection, failure artifacts and the report file

use crate::commands::RunArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use std::path::{Path, PathBuf};
use stepwise::{
    BrowserDriver, Credentials, FreeCourseJourney, JourneyConfig, JourneyOutcome, JourneyReport,
    Session, LOGIN_ENV, PASSWORD_ENV,
};

/// Runs one free-course journey from parsed CLI arguments
#[derive(Debug)]
pub struct JourneyRunner {
    journey: FreeCourseJourney,
    config: JourneyConfig,
    args: RunArgs,
    reporter: ProgressReporter,
}

impl JourneyRunner {
    /// Validate the arguments. Missing credentials and a blank query are
    /// configuration errors.
    pub fn new(cli: &CliConfig, args: RunArgs) -> CliResult<Self> {
        let config = JourneyConfig::new().base_url(args.base_url.clone());
        let credentials = credentials(&args)?;
        tracing::debug!(
            login = %credentials.masked_login(),
            base_url = %config.base_url,
            "credentials resolved"
        );
        let journey = FreeCourseJourney::new(args.query.clone(), credentials)?;
        let reporter = ProgressReporter::new(cli.color.should_color(), cli.verbosity.is_quiet());
        Ok(Self {
            journey,
            config,
            args,
            reporter,
        })
    }

    /// Effective journey configuration
    #[must_use]
    pub const fn journey_config(&self) -> &JourneyConfig {
        &self.config
    }

    /// Launch the selected driver and run the journey
    pub async fn run(&mut self) -> CliResult<JourneyOutcome> {
        let message = format!("searching free courses for {:?}", self.journey.query());
        self.reporter.start_spinner(&message);
        let outcome = self.dispatch().await;
        self.reporter.finish();
        let outcome = outcome?;

        self.reporter.summary(&outcome.report);
        if let Some(path) = &self.args.report {
            write_report(&outcome.report, path).await?;
            self.reporter.info(&format!("report written to {}", path.display()));
        }
        Ok(outcome)
    }

    async fn dispatch(&self) -> CliResult<JourneyOutcome> {
        if let Some(site) = self.args.simulate {
            tracing::info!(site = ?site, "running against simulated site");
            let driver = site.simulation().config(&self.config).build();
            return self.execute(driver).await;
        }
        self.launch_browser().await
    }

    #[cfg(feature = "browser")]
    async fn launch_browser(&self) -> CliResult<JourneyOutcome> {
        let mut driver_config = stepwise::DriverConfig::new().headless(!self.args.headed);
        if let Some(path) = &self.args.chromium_path {
            driver_config = driver_config.executable_path(path.to_string_lossy());
        }
        let driver = stepwise::ChromiumDriver::launch(driver_config)
            .await
            .map_err(stepwise::JourneyError::from)?;
        self.execute(driver).await
    }

    #[cfg(not(feature = "browser"))]
    async fn launch_browser(&self) -> CliResult<JourneyOutcome> {
        Err(CliError::config(
            "built without the `browser` feature; pass --simulate or rebuild with --features browser",
        ))
    }

    async fn execute<D: BrowserDriver>(&self, driver: D) -> CliResult<JourneyOutcome> {
        let journey = &self.journey;
        let screenshot_dir = self.args.screenshot_dir.as_deref();
        let outcome = Session::scope(driver, self.config.clone(), |session| async move {
            let mut outcome = journey.run(&*session).await;
            if let (false, Some(dir)) = (outcome.is_success(), screenshot_dir) {
                match capture_failure(&session, dir, &outcome.report).await {
                    Ok(path) => outcome.report.attach_screenshot(&path),
                    Err(err) => tracing::warn!(error = %err, "failure screenshot not saved"),
                }
            }
            Ok(outcome)
        })
        .await?;
        Ok(outcome)
    }
}

fn credentials(args: &RunArgs) -> CliResult<Credentials> {
    let found = Credentials::from_lookup(|key| match key {
        LOGIN_ENV => args.login.clone(),
        PASSWORD_ENV => args.password.clone(),
        _ => None,
    })?;
    Ok(found)
}

async fn capture_failure<D: BrowserDriver>(
    session: &Session<D>,
    dir: &Path,
    report: &JourneyReport,
) -> CliResult<PathBuf> {
    let shot = session.active_tab().screenshot().await?;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("failure-{}.png", report.run_id));
    tokio::fs::write(&path, &shot.data).await?;
    tracing::info!(path = %path.display(), bytes = shot.size_bytes(), "failure screenshot saved");
    Ok(path)
}

async fn write_report(report: &JourneyReport, path: &Path) -> CliResult<()> {
    let json = report
        .to_json()
        .map_err(|e| CliError::report_generation(e.to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json)
        .await
        .map_err(|e| CliError::report_generation(format!("{}: {e}", path.display())))
}
