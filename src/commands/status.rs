use anyhow::Result;

use crate::commands::{CommandReport, effective_config};
use crate::sync::audit;
use crate::sync::config::{RunOverrides, resolve_config_path};
use crate::sync::paths::resolve_paths;
use crate::sync::sot_store;

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("sync_home={}", paths.sync_home.display()));
    report.detail(format!("state_dir={}", paths.state_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    if let Some(path) = resolve_config_path() {
        let state = if path.exists() { "found" } else { "absent" };
        report.detail(format!("config_file={} ({state})", path.display()));
    }

    match effective_config(&RunOverrides::default()) {
        Ok(cfg) => {
            let bm = &cfg.beeminder;
            report.detail(format!("beeminder.username={}", bm.username));
            report.detail(format!(
                "beeminder.auth_token={}",
                if bm.auth_token.is_some() {
                    "set"
                } else {
                    "unset (live sync will refuse to start)"
                }
            ));
            report.detail(format!("beeminder.api_base={}", bm.api_base));
            report.detail(format!("beeminder.target_goal={}", bm.target_goal));
            report.detail(format!("beeminder.source_goal={}", bm.source_goal));
            report.detail(format!("beeminder.timezone={}", bm.timezone));
            report.detail(format!(
                "rules=min {}min by {}",
                cfg.rules.min_session_minutes, cfg.rules.cutoff
            ));
            report.detail(format!(
                "run.window={}",
                if cfg.run.full_history {
                    "full-history".to_string()
                } else {
                    format!("last {} days", cfg.run.history_days)
                }
            ));
            report.detail(format!("run.strict_purge={}", cfg.run.strict_purge));
            report.detail(format!("run.dry_run={}", cfg.run.dry_run));
        }
        Err(err) => report.issue(format!("config invalid: {err:#}")),
    }

    match sot_store::load(&paths.sot_file()) {
        Ok(store) => {
            let qualifying = store.days.values().filter(|d| d.value == 1).count();
            report.detail(format!(
                "sot.days={} sot.qualifying={qualifying}",
                store.days.len()
            ));
            if let Some((first, _)) = store.days.first_key_value() {
                report.detail(format!("sot.first_day={first}"));
            }
            if let Some((last, _)) = store.days.last_key_value() {
                report.detail(format!("sot.last_day={last}"));
            }
        }
        Err(err) => report.issue(format!("sot file unreadable: {err:#}")),
    }

    match audit::last_event(&paths) {
        Ok(Some(event)) => report.detail(format!(
            "last_run at={} status={} {}",
            event.at_epoch_secs, event.status, event.message
        )),
        Ok(None) => report.detail("last_run=none"),
        Err(err) => report.issue(format!("audit log unreadable: {err:#}")),
    }

    Ok(report)
}
