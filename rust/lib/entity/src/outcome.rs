//! Result envelope returned by every data and service operation.
//!
//! Statuses other than `Ok` are expected business outcomes, not errors.
//! Each status keeps its legacy signed row-count code so callers that
//! still branch on integers can use `row_count()`.

use openerp_query::{FieldValue, Record};

/// Outcome status with its legacy row-count code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// 0: the request asked for no change (empty diff, absent id).
    NothingTodo,
    /// -1
    NotFound,
    /// -2: the caller's concurrency token is stale.
    ChangedTimestamp,
    /// -3: a multi-step operation stopped without effect.
    NothingDone,
    /// -4: the row is not visible to the caller.
    NoRights,
    /// -5: parallel id/token lists differ in length.
    BatchMismatch,
}

impl Status {
    pub fn code(&self) -> i64 {
        match self {
            Status::Ok | Status::NothingTodo => 0,
            Status::NotFound => -1,
            Status::ChangedTimestamp => -2,
            Status::NothingDone => -3,
            Status::NoRights => -4,
            Status::BatchMismatch => -5,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

/// What an outcome carries besides its status.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Record(Box<Record>),
    List(Vec<Record>),
    Scalar(FieldValue),
    Count(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: Status,
    pub payload: Payload,
}

impl Outcome {
    fn of(status: Status) -> Self {
        Self {
            status,
            payload: Payload::Empty,
        }
    }

    fn ok(payload: Payload) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    pub fn record(record: Record) -> Self {
        Self::ok(Payload::Record(Box::new(record)))
    }

    pub fn list(records: Vec<Record>) -> Self {
        Self::ok(Payload::List(records))
    }

    pub fn scalar(value: FieldValue) -> Self {
        Self::ok(Payload::Scalar(value))
    }

    pub fn count(count: u64) -> Self {
        Self::ok(Payload::Count(count))
    }

    pub fn nothing_todo() -> Self {
        Self::of(Status::NothingTodo)
    }

    pub fn not_found() -> Self {
        Self::of(Status::NotFound)
    }

    pub fn changed_timestamp() -> Self {
        Self::of(Status::ChangedTimestamp)
    }

    pub fn nothing_done() -> Self {
        Self::of(Status::NothingDone)
    }

    pub fn no_rights() -> Self {
        Self::of(Status::NoRights)
    }

    pub fn batch_mismatch() -> Self {
        Self::of(Status::BatchMismatch)
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Legacy signed count: the affected/returned rows when OK, the
    /// status code otherwise.
    pub fn row_count(&self) -> i64 {
        if !self.is_ok() {
            return self.status.code();
        }
        match &self.payload {
            Payload::Empty => 0,
            Payload::Record(_) | Payload::Scalar(_) => 1,
            Payload::List(records) => records.len() as i64,
            Payload::Count(n) => *n as i64,
        }
    }

    /// Inverse of `row_count` for count-only results. Zero is read as
    /// "nothing to do"; unknown negative codes as "nothing done".
    pub fn from_row_count(count: i64) -> Self {
        match count {
            0 => Self::nothing_todo(),
            n if n > 0 => Self::count(n as u64),
            -1 => Self::not_found(),
            -2 => Self::changed_timestamp(),
            -4 => Self::no_rights(),
            -5 => Self::batch_mismatch(),
            _ => Self::nothing_done(),
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match &self.payload {
            Payload::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self.payload {
            Payload::Record(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Record]> {
        match &self.payload {
            Payload::List(records) => Some(records),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<Record>> {
        match self.payload {
            Payload::List(records) => Some(records),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&FieldValue> {
        match &self.payload {
            Payload::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self.payload {
            Payload::Count(n) => Some(n),
            _ => None,
        }
    }
}
