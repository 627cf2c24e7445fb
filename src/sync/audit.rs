use crate::sync::paths::SyncPaths;
use crate::sync::util::now_epoch_secs;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub at_epoch_secs: u64,
    pub phase: String,
    pub status: String,
    pub message: String,
}

pub fn append_event(paths: &SyncPaths, phase: &str, status: &str, message: &str) -> Result<()> {
    fs::create_dir_all(&paths.logs_dir)
        .with_context(|| format!("failed to create {}", paths.logs_dir.display()))?;
    let event = AuditEvent {
        at_epoch_secs: now_epoch_secs()?,
        phase: phase.to_string(),
        status: status.to_string(),
        message: message.to_string(),
    };

    let line = format!("{}\n", serde_json::to_string(&event)?);
    let path = paths.audit_log();
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

pub fn last_event(paths: &SyncPaths) -> Result<Option<AuditEvent>> {
    let path = paths.audit_log();
    if !path.exists() {
        return Ok(None);
    }
    let raw =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let Some(line) = raw.lines().rev().find(|l| !l.trim().is_empty()) else {
        return Ok(None);
    };
    let event = serde_json::from_str(line)
        .with_context(|| format!("failed to parse last event in {}", path.display()))?;
    Ok(Some(event))
}
