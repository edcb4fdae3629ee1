// SPDX-License-Identifier: Apache-2.0

// Try not to implement `From` for `SlicerError` here unless the source
// type always maps to one `ErrorKind`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A user-supplied tuple/change-set was malformed or self-conflicting.
    InvalidArgument,
    /// An internal invariant was violated; should never happen.
    Bug,
    /// The injected `SwitchDriver` returned an error applying a mutation.
    DriverError,
    /// The requested operation has no meaning in this context.
    NoSupport,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlicerError {
    pub kind: ErrorKind,
    pub msg: String,
}

impl SlicerError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, msg)
    }

    pub fn bug(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Bug, msg)
    }
}

impl std::fmt::Display for SlicerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl std::error::Error for SlicerError {}
