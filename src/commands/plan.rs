use anyhow::Result;

use crate::commands::{CommandReport, connect, describe_plan, effective_config};
use crate::sync::config::RunOverrides;
use crate::sync::pipeline::plan_run;
use crate::sync::util::today_in;

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub overrides: RunOverrides,
}

pub fn run(opts: &PlanOptions) -> Result<CommandReport> {
    let cfg = effective_config(&opts.overrides)?;
    let run = cfg.run_config();
    let mut report = CommandReport::new("plan");
    report.detail(format!("goal={}/{}", cfg.beeminder.username, cfg.beeminder.target_goal));
    report.detail(format!("strict_purge={}", run.strict_purge));

    let (source, goal) = connect(&cfg)?;
    let planned = plan_run(&run, today_in(cfg.timezone()?), &source, &goal)?;
    let qualifying = planned.records.values().filter(|r| r.qualifies).count();
    report.detail(format!("sot_days={} qualifying={qualifying}", planned.records.len()));
    describe_plan(&mut report, &planned.plan);

    Ok(report)
}
