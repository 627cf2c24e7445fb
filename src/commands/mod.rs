pub mod plan;
pub mod status;
pub mod sync;

use crate::beeminder::client::BeeminderClient;
use crate::beeminder::goal::{BeeminderGoal, FocusmateSource};
use crate::sync::config::{RunOverrides, SyncConfig, load_config, validate};
use crate::sync::model::Plan;
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn render_text(&self) -> String {
        let mut out = format!(
            "{}: {}\n",
            self.command,
            if self.ok { "ok" } else { "issues found" }
        );
        for detail in &self.details {
            out.push_str(&format!("  - {detail}\n"));
        }
        if !self.issues.is_empty() {
            out.push_str("issues:\n");
            for issue in &self.issues {
                out.push_str(&format!("  - {issue}\n"));
            }
        }
        out
    }
}

pub fn effective_config(overrides: &RunOverrides) -> Result<SyncConfig> {
    let mut cfg = load_config()?;
    cfg.apply_overrides(overrides);
    validate(&cfg)?;
    Ok(cfg)
}

pub fn connect(cfg: &SyncConfig) -> Result<(FocusmateSource, BeeminderGoal)> {
    let tz = cfg.timezone()?;
    let bm = &cfg.beeminder;
    let client = BeeminderClient::new(&bm.api_base, &bm.username, bm.auth_token.clone())?;
    let source = FocusmateSource::new(client.clone(), &bm.source_goal, tz, cfg.rules()?);
    let goal = BeeminderGoal::new(client, &bm.target_goal, tz);
    Ok((source, goal))
}

pub fn describe_plan(report: &mut CommandReport, plan: &Plan) {
    report.detail(format!("window={}", plan.window));
    report.detail(format!("operations={}", plan.operations.len()));
    if plan.is_empty() {
        report.detail("goal already matches the source of truth");
    }
    for op in &plan.operations {
        report.detail(format!("op {op}"));
    }
    for skipped in &plan.skipped {
        report.detail(format!("skipped {} reason={}", skipped.date, skipped.reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_flip_ok_and_render_after_details() {
        let mut report = CommandReport::new("sync");
        report.detail("window=2024-05-01..=2024-05-02");
        assert!(report.ok);
        report.issue("failed delete");
        assert!(!report.ok);

        let text = report.render_text();
        assert!(text.starts_with("sync: issues found\n"));
        let detail_at = text.find("window=").expect("detail");
        let issue_at = text.find("failed delete").expect("issue");
        assert!(detail_at < issue_at);
    }
}
