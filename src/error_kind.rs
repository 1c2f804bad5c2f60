use serde::Serialize;
use std::fmt;

/// Flat classification shared by every component error.
///
/// Component errors keep their own context; `kind()` maps them onto this list so callers
/// (the HTTP layer, the error display) can branch without matching nested enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PermissionDenied,
    Unsupported,
    PositionUnavailable,
    LocationTimeout,
    StorageUnavailable,
    TransactionFailed,
    InvalidState,
    CaptureFailed,
    SessionEndFailed,
    SwitchFailed,
    NoPhotos,
    ShareFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::PositionUnavailable => "position_unavailable",
            ErrorKind::LocationTimeout => "location_timeout",
            ErrorKind::StorageUnavailable => "storage_unavailable",
            ErrorKind::TransactionFailed => "transaction_failed",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::CaptureFailed => "capture_failed",
            ErrorKind::SessionEndFailed => "session_end_failed",
            ErrorKind::SwitchFailed => "switch_failed",
            ErrorKind::NoPhotos => "no_photos",
            ErrorKind::ShareFailed => "share_failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
