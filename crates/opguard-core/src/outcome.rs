//! Per-activation outcome accumulator and routine return codes.

use std::fmt;
use std::marker::PhantomData;

/// Routine return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Er = -1,
    Ok = 0,
    Full = 1,
    Empty = 2,
    NotFound = 3,
    Eof = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown status code: {0}")]
pub struct StatusError(pub i32);

impl Status {
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status as i32
    }
}

impl TryFrom<i32> for Status {
    type Error = StatusError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            -1 => Ok(Status::Er),
            0 => Ok(Status::Ok),
            1 => Ok(Status::Full),
            2 => Ok(Status::Empty),
            3 => Ok(Status::NotFound),
            4 => Ok(Status::Eof),
            other => Err(StatusError(other)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Er => "RC_ER",
            Status::Ok => "RC_OK",
            Status::Full => "RC_FULL",
            Status::Empty => "RC_EMPTY",
            Status::NotFound => "RC_NOT_FOUND",
            Status::Eof => "RC_EOF",
        };
        f.write_str(name)
    }
}

/// Whether anything in the current activation has failed yet.
///
/// Starts ok. `mark_failed` is sticky: there is no way back to ok.
/// Not `Send`/`Sync`; it belongs to exactly one activation.
#[derive(Debug, Default)]
pub struct Outcome {
    failed: bool,
    _not_send: PhantomData<*const ()>,
}

impl Outcome {
    pub fn begin() -> Self {
        Self::default()
    }

    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    pub fn is_ok(&self) -> bool {
        !self.failed
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn status(&self) -> Status {
        if self.failed {
            Status::Er
        } else {
            Status::Ok
        }
    }
}
