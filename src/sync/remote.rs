use crate::error::RemoteError;
use crate::sync::model::{ReconciliationWindow, RemoteSnapshot, SotRecords};
use chrono::NaiveDate;

pub trait SotSource {
    fn records(&self, window: &ReconciliationWindow) -> Result<SotRecords, RemoteError>;
    fn earliest_date(&self) -> Result<Option<NaiveDate>, RemoteError>;
}

pub trait RemoteGoal {
    fn datapoints(&self, window: &ReconciliationWindow) -> Result<RemoteSnapshot, RemoteError>;
    fn earliest_date(&self) -> Result<Option<NaiveDate>, RemoteError>;

    /// Returns the new datapoint id when the remote reports one.
    fn create(
        &mut self,
        date: NaiveDate,
        value: f64,
        comment: &str,
    ) -> Result<Option<String>, RemoteError>;
    fn update(
        &mut self,
        id: &str,
        date: NaiveDate,
        value: f64,
        comment: &str,
    ) -> Result<(), RemoteError>;
    fn delete(&mut self, id: &str) -> Result<(), RemoteError>;
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use crate::sync::model::{DayRecord, RemoteDatapoint};
    use std::collections::{BTreeMap, VecDeque};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Create(NaiveDate, f64, String),
        Update(String, NaiveDate, f64, String),
        Delete(String),
    }

    #[derive(Debug, Default)]
    pub struct FakeGoal {
        pub points: Vec<RemoteDatapoint>,
        pub calls: Vec<Call>,
        pub failures: VecDeque<RemoteError>,
        next_id: u64,
    }

    impl FakeGoal {
        pub fn with_points(points: Vec<RemoteDatapoint>) -> Self {
            let next_id = 1000 + points.len() as u64;
            Self {
                points,
                next_id,
                ..Self::default()
            }
        }

        pub fn fail_next(&mut self, err: RemoteError) {
            self.failures.push_back(err);
        }

        pub fn count_on(&self, date: NaiveDate) -> usize {
            self.points.iter().filter(|p| p.date == date).count()
        }

        fn take_failure(&mut self) -> Result<(), RemoteError> {
            match self.failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    impl RemoteGoal for FakeGoal {
        fn datapoints(
            &self,
            window: &ReconciliationWindow,
        ) -> Result<RemoteSnapshot, RemoteError> {
            let mut out = RemoteSnapshot::new();
            for p in self.points.iter().filter(|p| window.contains(p.date)) {
                out.entry(p.date).or_default().push(p.clone());
            }
            Ok(out)
        }

        fn earliest_date(&self) -> Result<Option<NaiveDate>, RemoteError> {
            Ok(self.points.iter().map(|p| p.date).min())
        }

        fn create(
            &mut self,
            date: NaiveDate,
            value: f64,
            comment: &str,
        ) -> Result<Option<String>, RemoteError> {
            self.calls
                .push(Call::Create(date, value, comment.to_string()));
            self.take_failure()?;
            self.next_id += 1;
            let id = self.next_id.to_string();
            self.points.push(RemoteDatapoint {
                date,
                id: Some(id.clone()),
                value,
                comment: comment.to_string(),
            });
            Ok(Some(id))
        }

        fn update(
            &mut self,
            id: &str,
            date: NaiveDate,
            value: f64,
            comment: &str,
        ) -> Result<(), RemoteError> {
            self.calls
                .push(Call::Update(id.to_string(), date, value, comment.to_string()));
            self.take_failure()?;
            let Some(point) = self.points.iter_mut().find(|p| p.id.as_deref() == Some(id)) else {
                return Err(RemoteError::Permanent(format!("no datapoint {id}")));
            };
            point.date = date;
            point.value = value;
            point.comment = comment.to_string();
            Ok(())
        }

        fn delete(&mut self, id: &str) -> Result<(), RemoteError> {
            self.calls.push(Call::Delete(id.to_string()));
            self.take_failure()?;
            let before = self.points.len();
            self.points.retain(|p| p.id.as_deref() != Some(id));
            if self.points.len() == before {
                return Err(RemoteError::Permanent(format!("no datapoint {id}")));
            }
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    pub struct FakeSot {
        pub records: BTreeMap<NaiveDate, DayRecord>,
    }

    impl FakeSot {
        pub fn new(records: Vec<DayRecord>) -> Self {
            Self {
                records: records.into_iter().map(|r| (r.date, r)).collect(),
            }
        }
    }

    impl SotSource for FakeSot {
        fn records(&self, window: &ReconciliationWindow) -> Result<SotRecords, RemoteError> {
            Ok(self
                .records
                .range(window.start..=window.end)
                .map(|(d, r)| (*d, r.clone()))
                .collect())
        }

        fn earliest_date(&self) -> Result<Option<NaiveDate>, RemoteError> {
            Ok(self.records.keys().next().copied())
        }
    }
}
