//! RPC error model.
//!
//! Errors travel through the forwarding path untouched: whatever the backing
//! service or the transport reports is what the inbound caller receives.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::payload::Payload;

/// Status codes shared by every transport.
///
/// The set and the string names follow the YARPC convention so that a code
/// received over one transport can be re-emitted over another without loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Code {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl Code {
    /// All codes, in wire order.
    pub const ALL: [Code; 16] = [
        Code::Cancelled,
        Code::Unknown,
        Code::InvalidArgument,
        Code::DeadlineExceeded,
        Code::NotFound,
        Code::AlreadyExists,
        Code::PermissionDenied,
        Code::ResourceExhausted,
        Code::FailedPrecondition,
        Code::Aborted,
        Code::OutOfRange,
        Code::Unimplemented,
        Code::Internal,
        Code::Unavailable,
        Code::DataLoss,
        Code::Unauthenticated,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Code::Cancelled => "cancelled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid-argument",
            Code::DeadlineExceeded => "deadline-exceeded",
            Code::NotFound => "not-found",
            Code::AlreadyExists => "already-exists",
            Code::PermissionDenied => "permission-denied",
            Code::ResourceExhausted => "resource-exhausted",
            Code::FailedPrecondition => "failed-precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out-of-range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data-loss",
            Code::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a wire code name is not recognised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown status code: {0}")]
pub struct UnknownCode(pub String);

impl FromStr for Code {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Code::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownCode(s.to_owned()))
    }
}

/// Error returned by any stage of a call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Transport-level or framework status error.
    #[error("{code}: {message}")]
    Status { code: Code, message: String },

    /// Failure reported by the remote service itself.
    ///
    /// `details` holds the encoded error body exactly as the service sent it.
    #[error("application error {name}: {message}")]
    Application {
        name: String,
        message: String,
        details: Payload,
    },
}

impl RpcError {
    #[must_use]
    pub fn status(code: Code, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn application(name: impl Into<String>, message: impl Into<String>, details: Payload) -> Self {
        Self::Application {
            name: name.into(),
            message: message.into(),
            details,
        }
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::status(Code::Cancelled, "call was cancelled")
    }

    #[must_use]
    pub fn deadline_exceeded() -> Self {
        Self::status(Code::DeadlineExceeded, "call deadline exceeded")
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::status(Code::Unavailable, message)
    }

    #[must_use]
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::status(Code::Unimplemented, message)
    }

    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::status(Code::InvalidArgument, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::status(Code::Internal, message)
    }

    /// Status code of the error; application errors report [`Code::Unknown`].
    #[must_use]
    pub fn code(&self) -> Code {
        match self {
            Self::Status { code, .. } => *code,
            Self::Application { .. } => Code::Unknown,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Status { message, .. } | Self::Application { message, .. } => message,
        }
    }

    #[must_use]
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application { .. })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::payload::Encoding;

    #[test]
    fn code_names_round_trip() {
        for code in Code::ALL {
            assert_eq!(code.as_str().parse::<Code>(), Ok(code));
        }
        assert!("teapot".parse::<Code>().is_err());
    }

    #[test]
    fn application_errors_report_unknown_code() {
        let err = RpcError::application(
            "EntityNotExistsError",
            "workflow not found",
            Payload::new(Encoding::Thrift, &b"\x0b\x00"[..]),
        );
        assert!(err.is_application());
        assert_eq!(err.code(), Code::Unknown);
        assert_eq!(err.message(), "workflow not found");
    }

    #[test]
    fn display_includes_code() {
        let err = RpcError::unavailable("connection refused");
        assert_eq!(err.to_string(), "unavailable: connection refused");
    }
}
