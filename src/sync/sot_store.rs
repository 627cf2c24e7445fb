use crate::sync::model::{ReconciliationWindow, SotRecords, daystamp};
use crate::sync::util::now_epoch_secs;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDay {
    pub value: u8,
    pub comment: String,
    pub updated_at_epoch_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SotStore {
    pub schema_version: u32,
    pub days: BTreeMap<String, StoredDay>,
}

pub fn load(file: &Path) -> Result<SotStore> {
    if !file.exists() {
        return Ok(SotStore {
            schema_version: 1,
            ..SotStore::default()
        });
    }

    let raw =
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let parsed: SotStore = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", file.display()))?;
    Ok(parsed)
}

// temp file + rename
pub fn save(file: &Path, store: &SotStore) -> Result<()> {
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = file.with_extension("json.tmp");
    let data = serde_json::to_string_pretty(store)?;
    fs::write(&tmp, format!("{data}\n"))
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, file).with_context(|| format!("failed to rename to {}", file.display()))?;
    Ok(())
}

pub fn upsert_window(
    store: &mut SotStore,
    window: &ReconciliationWindow,
    records: &SotRecords,
    now: u64,
) -> usize {
    store.schema_version = store.schema_version.max(1);
    let mut written = 0;
    for date in window.days() {
        let (value, comment) = match records.get(&date) {
            Some(r) => (u8::from(r.qualifies), r.comment.clone()),
            None => (0, String::new()),
        };
        store.days.insert(
            daystamp(date),
            StoredDay {
                value,
                comment,
                updated_at_epoch_secs: now,
            },
        );
        written += 1;
    }
    written
}

pub fn persist(file: &Path, window: &ReconciliationWindow, records: &SotRecords) -> Result<usize> {
    let mut store = load(file)?;
    let written = upsert_window(&mut store, window, records, now_epoch_secs()?);
    save(file, &store)?;
    Ok(written)
}
