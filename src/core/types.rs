use serde::{Deserialize, Serialize};

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Caller input did not match the tool's schema.
    ValidationError,
    /// No tool is registered under the requested name.
    NotFoundError,
    /// The external program could not be launched.
    ProcessStartError,
    TimeoutError,
    CancelledError,
    /// The process ran but its output was judged a failure.
    ExternalFailure,
    ConfigError,
    ProtocolError,
    SerializationError,
    IoError,
    InternalError,
}

impl ErrorCategory {
    /// Stable short code prefix used when no explicit code is attached.
    pub fn code_prefix(self) -> &'static str {
        match self {
            ErrorCategory::ValidationError => "VAL",
            ErrorCategory::NotFoundError => "NF",
            ErrorCategory::ProcessStartError => "PROC",
            ErrorCategory::TimeoutError => "TIMEOUT",
            ErrorCategory::CancelledError => "CANCEL",
            ErrorCategory::ExternalFailure => "EXT",
            ErrorCategory::ConfigError => "CFG",
            ErrorCategory::ProtocolError => "RPC",
            ErrorCategory::SerializationError => "SER",
            ErrorCategory::IoError => "IO",
            ErrorCategory::InternalError => "INT",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
