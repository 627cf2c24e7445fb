use chrono::{DateTime, Days, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

pub const DAYSTAMP_FORMAT: &str = "%Y%m%d";
pub const NO_SESSION_COMMENT: &str = "no qualifying session";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub qualifies: bool,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteDatapoint {
    pub date: NaiveDate,
    pub id: Option<String>,
    pub value: f64,
    pub comment: String,
}

pub type SotRecords = BTreeMap<NaiveDate, DayRecord>;
pub type RemoteSnapshot = BTreeMap<NaiveDate, Vec<RemoteDatapoint>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSpec {
    FullHistory,
    LastDays(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconciliationWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReconciliationWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        let back = u64::from(days.max(1) - 1);
        let start = today.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN);
        Self::new(start, today)
    }

    pub fn full_history(earliest: Option<NaiveDate>, today: NaiveDate) -> Self {
        let start = earliest.filter(|d| *d <= today).unwrap_or(today);
        Self::new(start, today)
    }

    pub fn resolve(spec: WindowSpec, today: NaiveDate, earliest: Option<NaiveDate>) -> Self {
        match spec {
            WindowSpec::FullHistory => Self::full_history(earliest, today),
            WindowSpec::LastDays(days) => Self::last_days(today, days),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for ReconciliationWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Create {
        date: NaiveDate,
        value: f64,
        comment: String,
    },
    Update {
        id: String,
        date: NaiveDate,
        value: f64,
        comment: String,
    },
    Delete {
        id: String,
        date: NaiveDate,
    },
}

impl Operation {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Create { date, .. } | Self::Update { date, .. } | Self::Delete { date, .. } => {
                *date
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create {
                date,
                value,
                comment,
            } => write!(f, "create {date} value={value} comment={comment:?}"),
            Self::Update {
                id,
                date,
                value,
                comment,
            } => write!(f, "update {date} id={id} value={value} comment={comment:?}"),
            Self::Delete { id, date } => write!(f, "delete {date} id={id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub window: ReconciliationWindow,
    pub operations: Vec<Operation>,
    pub skipped: Vec<SkippedDate>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

pub fn daystamp(date: NaiveDate) -> String {
    date.format(DAYSTAMP_FORMAT).to_string()
}

pub fn parse_daystamp(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DAYSTAMP_FORMAT).ok()
}

pub fn civil_date(timestamp: i64, tz: Tz) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|utc| utc.with_timezone(&tz).date_naive())
}

/// Remote ids compare by length first so numeric ids order numerically and
/// fixed-width hex ids order by creation.
pub fn compare_remote_ids(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn last_days_window_ends_today_and_spans_n_days() {
        let window = ReconciliationWindow::last_days(day(2024, 5, 10), 3);
        assert_eq!(window.start, day(2024, 5, 8));
        assert_eq!(window.end, day(2024, 5, 10));
        assert_eq!(window.days().count(), 3);
        assert_eq!(window.len_days(), 3);
    }

    #[test]
    fn last_days_window_treats_zero_as_today_only() {
        let window = ReconciliationWindow::last_days(day(2024, 5, 10), 0);
        assert_eq!(window.start, window.end);
    }

    #[test]
    fn full_history_window_collapses_without_known_dates() {
        let today = day(2024, 5, 10);
        assert_eq!(
            ReconciliationWindow::full_history(None, today),
            ReconciliationWindow::new(today, today)
        );
        assert_eq!(
            ReconciliationWindow::full_history(Some(day(2023, 1, 1)), today).start,
            day(2023, 1, 1)
        );
        assert_eq!(
            ReconciliationWindow::full_history(Some(day(2025, 1, 1)), today).start,
            today
        );
    }

    #[test]
    fn daystamp_roundtrips_beeminder_format() {
        assert_eq!(daystamp(day(2024, 5, 1)), "20240501");
        assert_eq!(parse_daystamp("20240501"), Some(day(2024, 5, 1)));
        assert_eq!(parse_daystamp("2024-05-01"), None);
    }

    #[test]
    fn civil_date_uses_goal_timezone() {
        // 2024-05-02T02:30:00Z is still May 1st in New York.
        let got = civil_date(1_714_617_000, chrono_tz::America::New_York);
        assert_eq!(got, Some(day(2024, 5, 1)));
    }

    #[test]
    fn remote_ids_order_numerically_by_length() {
        assert_eq!(compare_remote_ids("9", "10"), Ordering::Less);
        assert_eq!(compare_remote_ids("11", "10"), Ordering::Greater);
        assert_eq!(compare_remote_ids("abc", "abc"), Ordering::Equal);
    }
}
