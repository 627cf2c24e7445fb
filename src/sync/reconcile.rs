use crate::error::InvariantViolation;
use crate::sync::model::{
    DayRecord, NO_SESSION_COMMENT, Operation, Plan, ReconciliationWindow, RemoteDatapoint,
    RemoteSnapshot, SkippedDate, SotRecords, compare_remote_ids,
};
use chrono::NaiveDate;
use std::cmp::Ordering;

const QUALIFYING_VALUE: f64 = 1.0;
const EMPTY_VALUE: f64 = 0.0;

#[derive(Debug, Clone, PartialEq)]
struct Desired<'a> {
    value: f64,
    comment: &'a str,
}

impl<'a> Desired<'a> {
    fn for_record(record: Option<&'a DayRecord>) -> Self {
        match record {
            Some(r) if r.qualifies => Self {
                value: QUALIFYING_VALUE,
                comment: &r.comment,
            },
            Some(r) => Self {
                value: EMPTY_VALUE,
                comment: &r.comment,
            },
            None => Self {
                value: EMPTY_VALUE,
                comment: NO_SESSION_COMMENT,
            },
        }
    }

    fn qualifies(&self) -> bool {
        self.value == QUALIFYING_VALUE
    }

    fn value_matches(&self, dp: &RemoteDatapoint) -> bool {
        dp.value == self.value
    }

    fn comment_matches(&self, dp: &RemoteDatapoint) -> bool {
        dp.comment == self.comment
    }
}

pub fn reconcile(
    window: &ReconciliationWindow,
    sot: &SotRecords,
    remote: &RemoteSnapshot,
    strict_purge: bool,
) -> Plan {
    let mut operations = Vec::new();
    let mut skipped = Vec::new();

    for date in window.days() {
        let remotes = remote.get(&date).map(Vec::as_slice).unwrap_or(&[]);
        match reconcile_day(date, sot.get(&date), remotes, strict_purge) {
            Ok(mut ops) => operations.append(&mut ops),
            Err(violation) => {
                tracing::warn!(date = %violation.date, reason = %violation.reason, "skipping date");
                skipped.push(SkippedDate {
                    date: violation.date,
                    reason: violation.reason,
                });
            }
        }
    }

    Plan {
        window: *window,
        operations,
        skipped,
    }
}

pub fn reconcile_day(
    date: NaiveDate,
    record: Option<&DayRecord>,
    remotes: &[RemoteDatapoint],
    strict_purge: bool,
) -> Result<Vec<Operation>, InvariantViolation> {
    let desired = Desired::for_record(record);

    let Some((winner, losers)) = split_winner(&desired, remotes) else {
        if desired.qualifies() {
            return Ok(vec![Operation::Create {
                date,
                value: desired.value,
                comment: desired.comment.to_string(),
            }]);
        }
        return Ok(Vec::new());
    };

    let mut ops = Vec::with_capacity(losers.len() + 1);
    for dup in losers {
        ops.push(Operation::Delete {
            id: required_id(date, dup, "duplicate datapoint has no id")?,
            date,
        });
    }

    if desired.qualifies() {
        if !desired.value_matches(winner) || !desired.comment_matches(winner) {
            ops.push(Operation::Update {
                id: required_id(date, winner, "datapoint to update has no id")?,
                date,
                value: desired.value,
                comment: desired.comment.to_string(),
            });
        }
    } else if strict_purge {
        ops.push(Operation::Delete {
            id: required_id(date, winner, "datapoint to purge has no id")?,
            date,
        });
    }

    Ok(ops)
}

fn required_id(
    date: NaiveDate,
    dp: &RemoteDatapoint,
    reason: &str,
) -> Result<String, InvariantViolation> {
    match dp.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(InvariantViolation {
            date,
            reason: reason.to_string(),
        }),
    }
}

fn split_winner<'r>(
    desired: &Desired<'_>,
    remotes: &'r [RemoteDatapoint],
) -> Option<(&'r RemoteDatapoint, Vec<&'r RemoteDatapoint>)> {
    let mut ranked: Vec<&RemoteDatapoint> = remotes.iter().collect();
    ranked.sort_by(|a, b| winner_order(desired, a, b));
    let mut iter = ranked.into_iter();
    let winner = iter.next()?;
    Some((winner, iter.collect()))
}

/// Matching value first, then matching comment, then entries that carry an
/// id, then lowest id.
fn winner_order(desired: &Desired<'_>, a: &RemoteDatapoint, b: &RemoteDatapoint) -> Ordering {
    let rank = |dp: &RemoteDatapoint| {
        (
            !desired.value_matches(dp),
            !desired.comment_matches(dp),
            dp.id.is_none(),
        )
    };
    rank(a).cmp(&rank(b)).then_with(|| match (&a.id, &b.id) {
        (Some(x), Some(y)) => compare_remote_ids(x, y),
        _ => Ordering::Equal,
    })
}
