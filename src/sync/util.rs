use anyhow::Result;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}
