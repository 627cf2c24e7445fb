use crate::beeminder::client::DEFAULT_API_BASE;
use crate::sync::executor::RetryPolicy;
use crate::sync::model::WindowSpec;
use crate::sync::sot::QualifyingRules;
use anyhow::{Result, anyhow};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeeminderConfig {
    pub username: String,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub api_base: String,
    pub target_goal: String,
    pub source_goal: String,
    pub timezone: String,
}

impl Default for BeeminderConfig {
    fn default() -> Self {
        Self {
            username: "zarathustra".to_string(),
            auth_token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            target_goal: "wakeandfocus".to_string(),
            source_goal: "focusmate".to_string(),
            timezone: "America/New_York".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub min_session_minutes: u32,
    /// `HH:MM`, inclusive.
    pub cutoff: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            min_session_minutes: 50,
            cutoff: "09:15".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub full_history: bool,
    pub history_days: u32,
    pub strict_purge: bool,
    pub dry_run: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            full_history: false,
            history_days: 90,
            strict_purge: false,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    pub beeminder: BeeminderConfig,
    pub rules: RulesConfig,
    pub run: RunSettings,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialSyncConfig {
    beeminder: Option<BeeminderConfig>,
    rules: Option<RulesConfig>,
    run: Option<RunSettings>,
    retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub strict_purge: bool,
    pub dry_run: bool,
    pub window: WindowSpec,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOverrides {
    pub dry_run: Option<bool>,
    pub strict_purge: Option<bool>,
    pub full_history: Option<bool>,
    pub history_days: Option<u32>,
}

impl SyncConfig {
    pub fn apply_overrides(&mut self, overrides: &RunOverrides) {
        if let Some(v) = overrides.dry_run {
            self.run.dry_run = v;
        }
        if let Some(v) = overrides.strict_purge {
            self.run.strict_purge = v;
        }
        if let Some(v) = overrides.full_history {
            self.run.full_history = v;
        }
        if let Some(v) = overrides.history_days {
            self.run.history_days = v;
        }
    }

    pub fn run_config(&self) -> RunConfig {
        let window = if self.run.full_history {
            WindowSpec::FullHistory
        } else {
            WindowSpec::LastDays(self.run.history_days)
        };
        RunConfig {
            strict_purge: self.run.strict_purge,
            dry_run: self.run.dry_run,
            window,
        }
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.beeminder
            .timezone
            .trim()
            .parse::<Tz>()
            .map_err(|err| anyhow!("invalid timezone `{}`: {err}", self.beeminder.timezone))
    }

    pub fn rules(&self) -> Result<QualifyingRules> {
        let cutoff = NaiveTime::parse_from_str(self.rules.cutoff.trim(), "%H:%M")
            .map_err(|err| anyhow!("invalid cutoff `{}`: {err}", self.rules.cutoff))?;
        Ok(QualifyingRules {
            min_session_minutes: self.rules.min_session_minutes,
            cutoff,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_backoff: Duration::from_millis(self.retry.base_backoff_ms),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "TRUE" | "yes" | "on" => Some(true),
        "0" | "false" | "FALSE" | "no" | "off" => Some(false),
        _ => None,
    }
}

struct EnvSource<F: Fn(&str) -> Option<String>> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvSource<F> {
    fn non_empty(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, var: &str, fallback: &str) -> String {
        self.non_empty(var).unwrap_or_else(|| fallback.to_string())
    }

    fn bool(&self, var: &str, fallback: bool) -> bool {
        self.non_empty(var)
            .and_then(|v| parse_bool(&v))
            .unwrap_or(fallback)
    }

    fn u32(&self, var: &str, fallback: u32) -> u32 {
        self.non_empty(var)
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(fallback)
    }

    fn u64(&self, var: &str, fallback: u64) -> u64 {
        self.non_empty(var)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(fallback)
    }
}

fn apply_env<F: Fn(&str) -> Option<String>>(cfg: &mut SyncConfig, lookup: F) {
    let env = EnvSource { lookup };
    let bm = &mut cfg.beeminder;
    bm.username = env.string("BM_USERNAME", &bm.username);
    if let Some(token) = env.non_empty("BM_AUTH_TOKEN") {
        bm.auth_token = Some(token);
    }
    bm.api_base = env.string("WAKE_FOCUS_API_BASE", &bm.api_base);
    bm.target_goal = env.string("WAKE_FOCUS_GOAL", &bm.target_goal);
    bm.source_goal = env.string("WAKE_FOCUS_SOURCE_GOAL", &bm.source_goal);
    bm.timezone = env.string("WAKE_FOCUS_TZ", &bm.timezone);

    cfg.rules.min_session_minutes =
        env.u32("WAKE_FOCUS_MIN_MINUTES", cfg.rules.min_session_minutes);
    cfg.rules.cutoff = env.string("WAKE_FOCUS_CUTOFF", &cfg.rules.cutoff);

    cfg.run.full_history = env.bool("FULL_HISTORY", cfg.run.full_history);
    cfg.run.history_days = env.u32("HISTORY_DAYS", cfg.run.history_days);
    cfg.run.strict_purge = env.bool("STRICT_PURGE", cfg.run.strict_purge);
    cfg.run.dry_run = env.bool("DRY_RUN", cfg.run.dry_run);

    cfg.retry.max_attempts = env.u32("WAKE_FOCUS_MAX_ATTEMPTS", cfg.retry.max_attempts);
    cfg.retry.base_backoff_ms = env.u64("WAKE_FOCUS_BACKOFF_MS", cfg.retry.base_backoff_ms);
}

pub fn validate(cfg: &SyncConfig) -> Result<()> {
    if cfg.beeminder.username.trim().is_empty() {
        return Err(anyhow!("invalid beeminder username: cannot be empty"));
    }
    if cfg.beeminder.api_base.trim().is_empty() {
        return Err(anyhow!("invalid beeminder api base: cannot be empty"));
    }
    if cfg.beeminder.target_goal.trim().is_empty() || cfg.beeminder.source_goal.trim().is_empty()
    {
        return Err(anyhow!("invalid goal names: target and source must be set"));
    }
    if cfg.beeminder.target_goal == cfg.beeminder.source_goal {
        return Err(anyhow!(
            "invalid goal names: target and source must differ"
        ));
    }
    cfg.timezone()?;
    cfg.rules()?;
    if cfg.rules.min_session_minutes == 0 {
        return Err(anyhow!("invalid min session minutes: must be >= 1"));
    }
    if cfg.run.history_days == 0 {
        return Err(anyhow!("invalid history days: must be >= 1"));
    }
    if cfg.retry.max_attempts == 0 {
        return Err(anyhow!("invalid retry max attempts: must be >= 1"));
    }
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("WAKE_FOCUS_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".wake-focus").join("config.toml"))
}

fn merge_file_config(base: &mut SyncConfig, raw: &str, origin: &str) -> Result<()> {
    let parsed: PartialSyncConfig = toml::from_str(raw)
        .map_err(|err| anyhow!("failed to parse sync config {origin}: {err}"))?;
    if let Some(beeminder) = parsed.beeminder {
        base.beeminder = beeminder;
    }
    if let Some(rules) = parsed.rules {
        base.rules = rules;
    }
    if let Some(run) = parsed.run {
        base.run = run;
    }
    if let Some(retry) = parsed.retry {
        base.retry = retry;
    }
    Ok(())
}

fn load_with<F: Fn(&str) -> Option<String>>(file: Option<(String, String)>, lookup: F) -> Result<SyncConfig> {
    let mut cfg = SyncConfig::default();
    if let Some((origin, raw)) = file {
        merge_file_config(&mut cfg, &raw, &origin)?;
    }
    apply_env(&mut cfg, lookup);
    Ok(cfg)
}

pub fn load_config() -> Result<SyncConfig> {
    let file = match resolve_config_path() {
        Some(path) if path.exists() => {
            let raw = fs::read_to_string(&path)
                .map_err(|err| anyhow!("failed to read sync config {}: {err}", path.display()))?;
            Some((path.display().to_string(), raw))
        }
        _ => None,
    };
    load_with(file, |var| env::var(var).ok())
}
