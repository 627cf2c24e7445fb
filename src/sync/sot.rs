use crate::sync::model::{DayRecord, NO_SESSION_COMMENT, ReconciliationWindow, SotRecords};
use chrono::{NaiveDate, NaiveTime, Timelike};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDatapoint {
    pub date: NaiveDate,
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FocusSession {
    pub start: NaiveTime,
    pub minutes: u32,
}

impl FocusSession {
    pub fn label(&self) -> String {
        format!(
            "{}min from {:02}:{:02}",
            self.minutes,
            self.start.hour(),
            self.start.minute()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualifyingRules {
    pub min_session_minutes: u32,
    /// Latest start time that still counts, inclusive.
    pub cutoff: NaiveTime,
}

impl Default for QualifyingRules {
    fn default() -> Self {
        Self {
            min_session_minutes: 50,
            cutoff: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl QualifyingRules {
    pub fn starts_in_time(&self, start: NaiveTime) -> bool {
        start <= self.cutoff
    }

    pub fn qualifies(&self, session: &FocusSession) -> bool {
        session.minutes >= self.min_session_minutes && self.starts_in_time(session.start)
    }
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }

    fn digits(&mut self, max: usize) -> Option<&'a str> {
        let len = self
            .rest
            .char_indices()
            .take_while(|(_, c)| c.is_ascii_digit())
            .count();
        if len == 0 || len > max {
            return None;
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Some(head)
    }

    fn spaces(&mut self) -> usize {
        let trimmed = self.rest.trim_start();
        let skipped = self.rest.len() - trimmed.len();
        self.rest = trimmed;
        skipped
    }

    fn word(&mut self, word: &str) -> bool {
        match self.rest.get(..word.len()) {
            Some(head) if head.eq_ignore_ascii_case(word) => {
                self.rest = &self.rest[word.len()..];
                true
            }
            _ => false,
        }
    }

    fn char(&mut self, ch: char) -> bool {
        match self.rest.strip_prefix(ch) {
            Some(tail) => {
                self.rest = tail;
                true
            }
            None => false,
        }
    }

    fn at_word_boundary(&self) -> bool {
        self.rest
            .chars()
            .next()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
    }
}

/// Parse `"<N> minute[s] session at <H>:<MM>"` at the start of a Focusmate
/// comment.
pub fn parse_session_comment(comment: &str) -> Option<FocusSession> {
    let mut cur = Cursor::new(comment);
    cur.spaces();
    let minutes = cur.digits(usize::MAX)?.parse::<u32>().ok()?;
    cur.spaces();
    if !cur.word("minute") {
        return None;
    }
    cur.word("s");
    if cur.spaces() == 0 || !cur.word("session") {
        return None;
    }
    if cur.spaces() == 0 || !cur.word("at") {
        return None;
    }
    if cur.spaces() == 0 {
        return None;
    }
    let hour = cur.digits(2)?.parse::<u32>().ok()?;
    if !cur.char(':') {
        return None;
    }
    let minute = cur.digits(2)?;
    if minute.len() != 2 || !cur.at_word_boundary() {
        return None;
    }
    let start = NaiveTime::from_hms_opt(hour, minute.parse().ok()?, 0)?;
    Some(FocusSession { start, minutes })
}

fn day_comment(qualifying: &[FocusSession], all: &[FocusSession]) -> String {
    let join = |sessions: &[FocusSession]| {
        sessions
            .iter()
            .map(FocusSession::label)
            .collect::<Vec<_>>()
            .join(", ")
    };
    if qualifying.is_empty() {
        format!("{NO_SESSION_COMMENT} ({})", join(all))
    } else {
        join(qualifying)
    }
}

pub fn build_day_records(
    sessions: &[SessionDatapoint],
    window: &ReconciliationWindow,
    rules: &QualifyingRules,
) -> SotRecords {
    let mut by_day: BTreeMap<NaiveDate, Vec<FocusSession>> = BTreeMap::new();
    for dp in sessions.iter().filter(|dp| window.contains(dp.date)) {
        match parse_session_comment(&dp.comment) {
            Some(session) => by_day.entry(dp.date).or_default().push(session),
            None => tracing::debug!(date = %dp.date, comment = %dp.comment, "ignoring unparsable session"),
        }
    }

    by_day
        .into_iter()
        .map(|(date, mut all)| {
            all.sort();
            let qualifying: Vec<FocusSession> =
                all.iter().copied().filter(|s| rules.qualifies(s)).collect();
            let record = DayRecord {
                date,
                qualifies: !qualifying.is_empty(),
                comment: day_comment(&qualifying, &all),
            };
            (date, record)
        })
        .collect()
}
