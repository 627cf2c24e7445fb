use crate::beeminder::client::{ApiDatapoint, BeeminderClient};
use crate::error::RemoteError;
use crate::sync::model::{
    ReconciliationWindow, RemoteDatapoint, RemoteSnapshot, SotRecords, civil_date, daystamp,
    parse_daystamp,
};
use crate::sync::remote::{RemoteGoal, SotSource};
use crate::sync::sot::{QualifyingRules, SessionDatapoint, build_day_records};
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::cell::OnceCell;
use std::collections::BTreeSet;

pub fn attributed_date(dp: &ApiDatapoint, tz: Tz) -> Option<NaiveDate> {
    dp.daystamp
        .as_deref()
        .and_then(parse_daystamp)
        .or_else(|| dp.timestamp.and_then(|ts| civil_date(ts, tz)))
}

pub fn requestid_for(goal: &str, date: NaiveDate) -> String {
    format!("{goal}-{}-sot-v1", daystamp(date))
}

pub fn to_remote_datapoints(raw: &[ApiDatapoint], tz: Tz) -> Vec<RemoteDatapoint> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for dp in raw {
        let Some(date) = attributed_date(dp, tz) else {
            tracing::warn!(id = ?dp.id, "datapoint has neither daystamp nor timestamp; ignoring");
            continue;
        };
        let id = dp.id_string();
        if let Some(id) = &id {
            if !seen.insert(id.clone()) {
                continue;
            }
        }
        out.push(RemoteDatapoint {
            date,
            id,
            value: dp.value.unwrap_or(0.0),
            comment: dp.comment.clone().unwrap_or_default(),
        });
    }
    out
}

pub struct BeeminderGoal {
    client: BeeminderClient,
    goal: String,
    tz: Tz,
    snapshot: OnceCell<Vec<RemoteDatapoint>>,
}

impl BeeminderGoal {
    pub fn new(client: BeeminderClient, goal: &str, tz: Tz) -> Self {
        Self {
            client,
            goal: goal.to_string(),
            tz,
            snapshot: OnceCell::new(),
        }
    }

    fn all(&self) -> Result<&[RemoteDatapoint], RemoteError> {
        if let Some(points) = self.snapshot.get() {
            return Ok(points);
        }
        let raw = self.client.fetch_datapoints(&self.goal)?;
        let points = to_remote_datapoints(&raw, self.tz);
        Ok(self.snapshot.get_or_init(|| points))
    }
}

impl RemoteGoal for BeeminderGoal {
    fn datapoints(&self, window: &ReconciliationWindow) -> Result<RemoteSnapshot, RemoteError> {
        let mut out = RemoteSnapshot::new();
        for dp in self.all()?.iter().filter(|dp| window.contains(dp.date)) {
            out.entry(dp.date).or_default().push(dp.clone());
        }
        Ok(out)
    }

    fn earliest_date(&self) -> Result<Option<NaiveDate>, RemoteError> {
        Ok(self.all()?.iter().map(|dp| dp.date).min())
    }

    fn create(
        &mut self,
        date: NaiveDate,
        value: f64,
        comment: &str,
    ) -> Result<Option<String>, RemoteError> {
        self.client.create_datapoint(
            &self.goal,
            &daystamp(date),
            value,
            comment,
            &requestid_for(&self.goal, date),
        )
    }

    fn update(
        &mut self,
        id: &str,
        date: NaiveDate,
        value: f64,
        comment: &str,
    ) -> Result<(), RemoteError> {
        self.client
            .update_datapoint(&self.goal, id, &daystamp(date), value, comment)
    }

    fn delete(&mut self, id: &str) -> Result<(), RemoteError> {
        self.client.delete_datapoint(&self.goal, id)
    }
}

pub struct FocusmateSource {
    client: BeeminderClient,
    goal: String,
    tz: Tz,
    rules: QualifyingRules,
    sessions: OnceCell<Vec<SessionDatapoint>>,
}

impl FocusmateSource {
    pub fn new(client: BeeminderClient, goal: &str, tz: Tz, rules: QualifyingRules) -> Self {
        Self {
            client,
            goal: goal.to_string(),
            tz,
            rules,
            sessions: OnceCell::new(),
        }
    }

    fn sessions(&self) -> Result<&[SessionDatapoint], RemoteError> {
        if let Some(sessions) = self.sessions.get() {
            return Ok(sessions);
        }
        let raw = self.client.fetch_datapoints(&self.goal)?;
        let sessions = raw
            .iter()
            .filter_map(|dp| {
                Some(SessionDatapoint {
                    date: attributed_date(dp, self.tz)?,
                    comment: dp.comment.clone().unwrap_or_default(),
                })
            })
            .collect();
        Ok(self.sessions.get_or_init(|| sessions))
    }
}

impl SotSource for FocusmateSource {
    fn records(&self, window: &ReconciliationWindow) -> Result<SotRecords, RemoteError> {
        Ok(build_day_records(self.sessions()?, window, &self.rules))
    }

    fn earliest_date(&self) -> Result<Option<NaiveDate>, RemoteError> {
        Ok(self.sessions()?.iter().map(|s| s.date).min())
    }
}
