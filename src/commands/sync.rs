use anyhow::Result;

use crate::commands::{CommandReport, connect, describe_plan, effective_config};
use crate::error::SyncError;
use crate::sync::audit;
use crate::sync::config::RunOverrides;
use crate::sync::lock::RunLock;
use crate::sync::paths::resolve_paths;
use crate::sync::pipeline::run_once;
use crate::sync::sot_store;
use crate::sync::util::today_in;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub overrides: RunOverrides,
}

pub fn run(opts: &SyncOptions) -> Result<CommandReport> {
    let cfg = effective_config(&opts.overrides)?;
    let run = cfg.run_config();
    if !run.dry_run && cfg.beeminder.auth_token.is_none() {
        return Err(SyncError::MissingAuthToken.into());
    }

    let paths = resolve_paths()?;
    let lock = RunLock::acquire(&paths.lock_file())?;
    let mut report = CommandReport::new("sync");
    report.detail(format!("goal={}/{}", cfg.beeminder.username, cfg.beeminder.target_goal));
    report.detail(format!("dry_run={}", run.dry_run));
    report.detail(format!("strict_purge={}", run.strict_purge));

    let (source, mut goal) = connect(&cfg)?;
    let today = today_in(cfg.timezone()?);
    let outcome = run_once(&run, today, &source, &mut goal, &cfg.retry_policy());
    let (planned, exec) = match outcome {
        Ok(done) => done,
        Err(err) => {
            if let Err(audit_err) = audit::append_event(&paths, "sync", "error", &format!("{err:#}")) {
                tracing::warn!(error = %audit_err, "failed to append audit event");
            }
            return Err(err);
        }
    };

    describe_plan(&mut report, &planned.plan);
    report.detail(format!("applied={}", exec.applied));
    report.detail(format!("skipped={}", exec.skipped));
    report.detail(format!("failed={}", exec.failed.len()));
    for failed in &exec.failed {
        report.issue(format!(
            "{} failed after {} attempt(s): {}",
            failed.operation, failed.attempts, failed.error
        ));
    }

    if run.dry_run {
        report.detail("dry-run: source of truth not persisted");
    } else {
        match sot_store::persist(&paths.sot_file(), &planned.plan.window, &planned.records) {
            Ok(written) => report.detail(format!(
                "sot_file={} days_written={written}",
                paths.sot_file().display()
            )),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "failed to persist source of truth");
                report.issue(format!("source of truth not persisted: {err:#}"));
            }
        }
    }

    let status = if report.ok { "ok" } else { "failed" };
    let message = format!(
        "window={} operations={} applied={} failed={} skipped={} dry_run={}",
        planned.plan.window,
        planned.plan.operations.len(),
        exec.applied,
        exec.failed.len(),
        exec.skipped,
        run.dry_run
    );
    if let Err(err) = audit::append_event(&paths, "sync", status, &message) {
        report.issue(format!("audit event not written: {err:#}"));
    }
    report.detail(format!("lock={}", lock.path().display()));

    Ok(report)
}
