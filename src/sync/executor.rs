use crate::error::RemoteError;
use crate::sync::model::{Operation, Plan};
use crate::sync::remote::RemoteGoal;
use serde::Serialize;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, doubling from the base.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedOperation {
    pub operation: Operation,
    pub error: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub applied: usize,
    pub failed: Vec<FailedOperation>,
    pub skipped: usize,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub fn execute(
    plan: &Plan,
    dry_run: bool,
    remote: &mut dyn RemoteGoal,
    retry: &RetryPolicy,
) -> ExecutionReport {
    let mut report = ExecutionReport {
        skipped: plan.skipped.len(),
        ..ExecutionReport::default()
    };
    for skipped in &plan.skipped {
        tracing::warn!(date = %skipped.date, reason = %skipped.reason, "date skipped by reconciler");
    }

    for op in &plan.operations {
        if dry_run {
            tracing::info!(op = %op, "dry-run: would apply");
            report.applied += 1;
            continue;
        }

        match apply_with_retry(op, remote, retry) {
            Ok(attempts) => {
                tracing::info!(op = %op, attempts, "applied");
                report.applied += 1;
            }
            Err((err, attempts)) => {
                tracing::warn!(date = %op.date(), op = %op, attempts, error = %err, "operation failed");
                report.failed.push(FailedOperation {
                    operation: op.clone(),
                    error: err.to_string(),
                    attempts,
                });
            }
        }
    }

    report
}

fn apply_with_retry(
    op: &Operation,
    remote: &mut dyn RemoteGoal,
    retry: &RetryPolicy,
) -> Result<u32, (RemoteError, u32)> {
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match apply_once(op, remote) {
            Ok(()) => return Ok(attempt),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let wait = retry.backoff(attempt);
                tracing::debug!(op = %op, attempt, error = %err, ?wait, "retrying transient failure");
                if !wait.is_zero() {
                    thread::sleep(wait);
                }
                attempt += 1;
            }
            Err(err) => return Err((err, attempt)),
        }
    }
}

fn apply_once(op: &Operation, remote: &mut dyn RemoteGoal) -> Result<(), RemoteError> {
    match op {
        Operation::Create {
            date,
            value,
            comment,
        } => {
            let id = remote.create(*date, *value, comment)?;
            tracing::debug!(%date, id = id.as_deref().unwrap_or("unknown"), "created");
            Ok(())
        }
        Operation::Update {
            id,
            date,
            value,
            comment,
        } => remote.update(id, *date, *value, comment),
        Operation::Delete { id, .. } => remote.delete(id),
    }
}
