use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("transient remote failure: {0}")]
    Transient(String),
    #[error("permanent remote failure: {0}")]
    Permanent(String),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invariant violation on {date}: {reason}")]
pub struct InvariantViolation {
    pub date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("BM_AUTH_TOKEN is not set; it is required unless running dry")]
    MissingAuthToken,
    #[error("another sync run holds the lock at {0}")]
    Locked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok,
    SetupFailed,
    OperationsFailed,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::SetupFailed => 1,
            Self::OperationsFailed => 2,
        }
    }
}
