use chrono::{DateTime, Utc};
use log::error;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error_kind::ErrorKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayedError {
    pub message: String,
    pub kind: Option<ErrorKind>,
    pub reported_at: DateTime<Utc>,
}

/// The single place user-facing error messages go.
///
/// Holds the most recent message until it is replaced or cleared; every report is also
/// written to the log.
#[derive(Clone, Default)]
pub struct ErrorChannel {
    current: Arc<Mutex<Option<DisplayedError>>>,
}

impl ErrorChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> MutexGuard<'_, Option<DisplayedError>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn report(&self, kind: Option<ErrorKind>, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        *self.current() = Some(DisplayedError {
            message,
            kind,
            reported_at: Utc::now(),
        });
    }

    pub fn clear(&self) {
        self.current().take();
    }

    pub fn last(&self) -> Option<DisplayedError> {
        self.current().clone()
    }
}
