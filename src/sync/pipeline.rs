use crate::sync::config::RunConfig;
use crate::sync::executor::{ExecutionReport, RetryPolicy, execute};
use crate::sync::model::{Plan, ReconciliationWindow, SotRecords, WindowSpec};
use crate::sync::reconcile::reconcile;
use crate::sync::remote::{RemoteGoal, SotSource};
use anyhow::{Context, Result};
use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct PlannedRun {
    pub plan: Plan,
    pub records: SotRecords,
}

pub fn resolve_window(
    spec: WindowSpec,
    today: NaiveDate,
    sot: &dyn SotSource,
    remote: &dyn RemoteGoal,
) -> Result<ReconciliationWindow> {
    let earliest = match spec {
        WindowSpec::LastDays(_) => None,
        WindowSpec::FullHistory => {
            let sot_first = sot
                .earliest_date()
                .context("failed to read earliest session date")?;
            let remote_first = remote
                .earliest_date()
                .context("failed to read earliest goal datapoint")?;
            sot_first.into_iter().chain(remote_first).min()
        }
    };
    Ok(ReconciliationWindow::resolve(spec, today, earliest))
}

pub fn plan_run(
    run: &RunConfig,
    today: NaiveDate,
    sot: &dyn SotSource,
    remote: &dyn RemoteGoal,
) -> Result<PlannedRun> {
    let window = resolve_window(run.window, today, sot, remote)?;
    tracing::info!(%window, days = window.len_days(), strict_purge = run.strict_purge, "reconciling");

    let records = sot
        .records(&window)
        .context("failed to build source of truth")?;
    let snapshot = remote
        .datapoints(&window)
        .context("failed to fetch goal datapoints")?;
    tracing::debug!(
        sot_days = records.len(),
        remote_days = snapshot.len(),
        "snapshots loaded"
    );

    let plan = reconcile(&window, &records, &snapshot, run.strict_purge);
    tracing::info!(
        operations = plan.operations.len(),
        skipped = plan.skipped.len(),
        "plan ready"
    );
    Ok(PlannedRun { plan, records })
}

pub fn run_once(
    run: &RunConfig,
    today: NaiveDate,
    sot: &dyn SotSource,
    remote: &mut dyn RemoteGoal,
    retry: &RetryPolicy,
) -> Result<(PlannedRun, ExecutionReport)> {
    let planned = plan_run(run, today, sot, &*remote)?;
    let report = execute(&planned.plan, run.dry_run, remote, retry);
    tracing::info!(
        applied = report.applied,
        failed = report.failed.len(),
        skipped = report.skipped,
        dry_run = run.dry_run,
        "sync finished"
    );
    Ok((planned, report))
}
