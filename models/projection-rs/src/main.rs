pub mod error;
pub mod output;
pub mod parameters;
pub mod policy;
pub mod projection;

use std::path::Path;

use anyhow::{Context, bail};
use cases::{
    DailyReport, Environment, ROSTER_FILE, SchoolRoster, SummaryTable, default_quarantine_cutoff,
    read_report_dir,
};
use chrono::NaiveDate;
use flexi_logger::Logger;
use log::{info, warn};
use serde::Deserialize;

use parameters::{ModelParameters, StepLength};
use policy::PolicyConfig;
use projection::ProjectionRun;

#[derive(Debug, Deserialize)]
struct ProjectionInput {
    anchor_date: NaiveDate,
    horizon: Horizon,
    #[serde(default)]
    step_length: StepLength,
    #[serde(default)]
    policy: PolicyConfig,
    parameters: ModelParameters,
    /// Overrides the date after which report quarantine counts are ignored.
    #[serde(default = "default_quarantine_cutoff")]
    quarantine_cutoff: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Horizon {
    Steps(u32),
    Until(NaiveDate),
}

fn main() -> anyhow::Result<()> {
    let _logger = Logger::try_with_env_or_str("info")?.start()?;

    let env = match std::env::args_os().nth(1) {
        Some(path) => Environment::from_path(Path::new(&path)),
        None => Environment::from_stdin(),
    }
    .context("failed to read run description")?
    .with_input_type::<ProjectionInput>()
    .context("invalid model input")?;
    let input = env.input.as_ref().context("missing model input")?;

    let table = load_summary(&env, input)?;
    for gap in table.gaps() {
        warn!("summary table has no row for {gap}");
    }

    let policy = input.policy.build()?;
    let mut run = ProjectionRun::new(
        &table,
        input.anchor_date,
        input.parameters.clone(),
        input.step_length,
        policy,
    )?;
    match input.horizon {
        Horizon::Steps(steps) => run.run_for(steps)?,
        Horizon::Until(end) => run.run_until(end)?,
    };

    if let Some(first) = run.warnings().first() {
        warn!(
            "{} of {} steps had a negative susceptible population, starting at step {}",
            run.warnings().len(),
            run.records().len(),
            first.step()
        );
    }
    info!(
        "{} projection from {} produced {} records",
        run.policy_name(),
        run.anchor_date(),
        run.records().len()
    );

    env.write_csv(
        "projection_output.csv",
        &output::HEADERS,
        &output::rows(run.records(), run.parameters()),
    )?;
    Ok(())
}

fn load_summary(
    env: &Environment<ProjectionInput>,
    input: &ProjectionInput,
) -> anyhow::Result<SummaryTable> {
    if let Some(path) = env.file("summary") {
        return SummaryTable::read_csv(path)
            .with_context(|| format!("failed to load summary table {}", path.display()));
    }

    let Some(dir) = env.file("reports") else {
        bail!("model.files must name a `summary` table or a `reports` directory");
    };
    let reports = read_report_dir(dir)
        .with_context(|| format!("failed to read reports from {}", dir.display()))?;
    check_roster(env, dir, &reports)?;
    let table = SummaryTable::from_reports(&reports, input.quarantine_cutoff)?;
    if let Some(out) = env.output_dir() {
        std::fs::create_dir_all(&out)?;
        table.write_csv(&out.join("summary.csv"))?;
    }
    Ok(table)
}

/// Warns about reporting schools missing from the school list. The list is
/// `model.files.roster`, or `school_list_geo` next to the reports.
fn check_roster(
    env: &Environment<ProjectionInput>,
    reports_dir: &Path,
    reports: &[DailyReport],
) -> anyhow::Result<()> {
    let path = match env.file("roster") {
        Some(path) => path.to_path_buf(),
        None => reports_dir.join(ROSTER_FILE),
    };
    if !path.is_file() {
        info!("no school list at {}; skipping roster check", path.display());
        return Ok(());
    }
    let roster = SchoolRoster::read(&path)
        .with_context(|| format!("failed to read school list {}", path.display()))?;
    let unaccounted = roster.unaccounted(reports);
    if !unaccounted.is_empty() {
        warn!("schools not in school list: {}", unaccounted.join(", "));
    }
    Ok(())
}
