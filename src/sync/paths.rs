use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SyncPaths {
    pub sync_home: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl SyncPaths {
    pub fn sot_file(&self) -> PathBuf {
        self.state_dir.join("sot.json")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.state_dir.join("sync.lock")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.logs_dir.join("audit.log")
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<SyncPaths> {
    let sync_home = match env::var("WAKE_FOCUS_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join(".wake-focus"),
    };
    let state_dir = env_or_default_path("WAKE_FOCUS_STATE_DIR", sync_home.join("state"));
    let logs_dir = env_or_default_path("WAKE_FOCUS_LOGS_DIR", sync_home.join("logs"));

    Ok(SyncPaths {
        sync_home,
        state_dir,
        logs_dir,
    })
}
