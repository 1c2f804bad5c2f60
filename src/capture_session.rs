//! Capture session state machine.
//!
//! ```text
//! Idle ──start──▶ PermissionPending ──granted──▶ Active ──end──▶ Ended
//!   ▲                    │                        │  ▲
//!   └──────denied────────┘                        └──┘ capture / delete_photos
//! ```
//!
//! The current state doubles as the lock: an operation marks itself in flight before its
//! first suspension point, and every other entry is rejected with `InvalidState` until it
//! finishes. A dropped or failed operation restores the state it started from.

use chrono::{DateTime, Local};
use image::RgbaImage;
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::annotation::{encode_png, FrameAnnotator};
use crate::error_kind::ErrorKind;
use crate::location::{LocationError, LocationResolver, ADDRESS_LOOKUP_FAILED};
use crate::media::{DeviceDescriptor, DeviceMediaManager, MediaError};
use crate::models::{Partition, PhotoMetadata};
use crate::photo_store::{PhotoStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    PermissionPending,
    Active,
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::PermissionPending => "waiting for permissions",
            SessionState::Active => "active",
            SessionState::Ended => "ended",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOperation {
    Start,
    Capture,
    End,
    DeletePhotos,
    SwitchCamera,
}

impl fmt::Display for SessionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionOperation::Start => "start the session",
            SessionOperation::Capture => "capture a photo",
            SessionOperation::End => "end the session",
            SessionOperation::DeletePhotos => "delete session photos",
            SessionOperation::SwitchCamera => "switch the camera",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Camera(#[from] MediaError),
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error("Cannot {operation} while the session is {state}")]
    InvalidState {
        operation: SessionOperation,
        state: SessionState,
        busy: bool,
    },
    #[error("Capture failed: {0}")]
    CaptureFailed(String),
    #[error("Moved {migrated} of {total} photos to the archive before failing: {source}")]
    SessionEndFailed {
        migrated: usize,
        total: usize,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Camera(e) => e.kind(),
            SessionError::Location(e) => e.kind(),
            SessionError::InvalidState { .. } => ErrorKind::InvalidState,
            SessionError::CaptureFailed(_) => ErrorKind::CaptureFailed,
            SessionError::SessionEndFailed { .. } => ErrorKind::SessionEndFailed,
            SessionError::Store(e) => e.kind(),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug)]
struct Phase {
    state: SessionState,
    in_flight: Option<SessionOperation>,
}

/// Marks an operation in flight; restores the starting state unless committed
struct OperationGuard<'a> {
    phase: &'a Mutex<Phase>,
    restore_to: SessionState,
    committed: bool,
}

impl OperationGuard<'_> {
    /// Leaves the state as it was when the operation began
    fn finish(self) {
        let state = self.restore_to;
        self.commit(state);
    }

    fn commit(mut self, next: SessionState) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        phase.state = next;
        phase.in_flight = None;
        self.committed = true;
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        phase.state = self.restore_to;
        phase.in_flight = None;
    }
}

/// Camera opened by a start that has not completed yet; released unless kept
struct PendingCamera<'a> {
    media: &'a DeviceMediaManager,
    kept: bool,
}

impl PendingCamera<'_> {
    fn keep(mut self) {
        self.kept = true;
    }
}

impl Drop for PendingCamera<'_> {
    fn drop(&mut self) {
        if !self.kept {
            self.media.release();
        }
    }
}

pub struct CaptureSession {
    store: PhotoStore,
    media: Arc<DeviceMediaManager>,
    location: Arc<LocationResolver>,
    annotator: Arc<dyn FrameAnnotator>,
    phase: Mutex<Phase>,
}

impl CaptureSession {
    pub fn new(
        store: PhotoStore,
        media: Arc<DeviceMediaManager>,
        location: Arc<LocationResolver>,
        annotator: Arc<dyn FrameAnnotator>,
    ) -> Self {
        Self {
            store,
            media,
            location,
            annotator,
            phase: Mutex::new(Phase {
                state: SessionState::Idle,
                in_flight: None,
            }),
        }
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.phase().state
    }

    /// Operation currently suspended inside this session, if any
    pub fn in_flight(&self) -> Option<SessionOperation> {
        self.phase().in_flight
    }

    fn begin(
        &self,
        operation: SessionOperation,
        allowed: &[SessionState],
        during: Option<SessionState>,
    ) -> SessionResult<OperationGuard<'_>> {
        let mut phase = self.phase();
        if phase.in_flight.is_some() || !allowed.contains(&phase.state) {
            return Err(SessionError::InvalidState {
                operation,
                state: phase.state,
                busy: phase.in_flight.is_some(),
            });
        }

        let restore_to = phase.state;
        if let Some(during) = during {
            phase.state = during;
        }
        phase.in_flight = Some(operation);
        Ok(OperationGuard {
            phase: &self.phase,
            restore_to,
            committed: false,
        })
    }

    /// Acquires camera and location permissions, then opens a fresh session.
    ///
    /// On any failure, or when the call is dropped midway, the camera is released again
    /// and the session stays `Idle`.
    pub async fn start(&self) -> SessionResult<()> {
        let guard = self.begin(
            SessionOperation::Start,
            &[SessionState::Idle],
            Some(SessionState::PermissionPending),
        )?;

        self.media.acquire().await?;
        let camera = PendingCamera {
            media: &self.media,
            kept: false,
        };

        if let Err(e) = self.location.current_position().await {
            warn!("Location permission check failed: {}", e);
            return Err(e.into());
        }

        // No photo of an earlier session may leak into this one
        self.store.clear(Partition::Session).await?;

        camera.keep();
        guard.commit(SessionState::Active);
        info!("Capture session started");
        Ok(())
    }

    /// Captures, annotates and stores one photo; returns its session id
    pub async fn capture(&self) -> SessionResult<i64> {
        let guard = self.begin(SessionOperation::Capture, &[SessionState::Active], None)?;

        let frame = self.snapshot().await?;
        let captured_at = Local::now();
        let (location, address) = match self.location.current_position().await {
            Ok(position) => (
                Some(position),
                self.location.resolve_address(position).await,
            ),
            Err(e) => {
                warn!("Capturing without location: {}", e);
                (None, ADDRESS_LOOKUP_FAILED.to_string())
            }
        };

        let timestamp = format_capture_time(&captured_at);
        let image_data = self
            .annotate_and_encode(frame, vec![timestamp.clone(), address.clone()])
            .await?;

        let metadata = PhotoMetadata {
            timestamp,
            location,
            address,
        };
        let id = self
            .store
            .add(Partition::Session, &image_data, &metadata)
            .await?;

        guard.finish();
        info!("Captured photo {} ({} bytes)", id, image_data.len());
        Ok(id)
    }

    async fn snapshot(&self) -> SessionResult<RgbaImage> {
        let stream = self
            .media
            .active_stream()
            .ok_or_else(|| SessionError::CaptureFailed("no live video source".to_string()))?;

        let frame = tokio::task::spawn_blocking(move || stream.current_frame())
            .await
            .map_err(|e| SessionError::CaptureFailed(format!("frame grab aborted: {}", e)))?;

        match frame {
            Some(frame) if frame.width() > 0 && frame.height() > 0 => {
                debug!("Grabbed {}x{} frame", frame.width(), frame.height());
                Ok(frame)
            }
            _ => Err(SessionError::CaptureFailed(
                "video source has no current frame".to_string(),
            )),
        }
    }

    async fn annotate_and_encode(
        &self,
        frame: RgbaImage,
        lines: Vec<String>,
    ) -> SessionResult<Vec<u8>> {
        let annotator = self.annotator.clone();
        tokio::task::spawn_blocking(move || {
            let mut frame = frame;
            annotator.stamp(&mut frame, &lines)?;
            encode_png(&frame)
        })
        .await
        .map_err(|e| SessionError::CaptureFailed(format!("encoding aborted: {}", e)))?
        .map_err(|e| SessionError::CaptureFailed(e.to_string()))
    }

    /// Moves every session photo into the archive and releases the camera.
    ///
    /// The session partition is cleared only after every copy succeeded. A failed copy
    /// leaves the session `Active` with its photos and its camera intact, so capturing
    /// goes on and the call can be repeated.
    pub async fn end(&self) -> SessionResult<usize> {
        let guard = self.begin(SessionOperation::End, &[SessionState::Active], None)?;

        let records = self
            .store
            .list_all(Partition::Session)
            .await
            .map_err(|source| SessionError::SessionEndFailed {
                migrated: 0,
                total: 0,
                source,
            })?;
        let total = records.len();

        for (migrated, record) in records.iter().enumerate() {
            self.store
                .add(Partition::Archive, &record.image_data, &record.metadata)
                .await
                .map_err(|source| SessionError::SessionEndFailed {
                    migrated,
                    total,
                    source,
                })?;
        }

        self.store
            .clear(Partition::Session)
            .await
            .map_err(|source| SessionError::SessionEndFailed {
                migrated: total,
                total,
                source,
            })?;

        self.media.release();
        guard.commit(SessionState::Ended);
        info!("Capture session ended, {} photos archived", total);
        Ok(total)
    }

    /// Moves the live source to `device_id`, or to the back camera when none is named.
    ///
    /// Only an `Active` session owns a camera to switch; returns the camera now in use, or
    /// `None` when no back camera exists.
    pub async fn switch_camera(
        &self,
        device_id: Option<&str>,
    ) -> SessionResult<Option<DeviceDescriptor>> {
        let guard = self.begin(SessionOperation::SwitchCamera, &[SessionState::Active], None)?;

        let camera = match device_id {
            Some(device_id) => Some(self.media.switch_to_device(device_id).await?),
            None => self.media.switch_to_back_camera().await?,
        };

        guard.finish();
        Ok(camera)
    }

    /// Clears the session partition; an already empty partition is not an error
    pub async fn delete_photos(&self) -> SessionResult<u64> {
        let guard = self.begin(
            SessionOperation::DeletePhotos,
            &[SessionState::Active, SessionState::Ended],
            None,
        )?;

        let removed = self.store.clear(Partition::Session).await?;
        guard.finish();
        Ok(removed)
    }
}

/// Capture time in the `M/D/YYYY, h:mm:ss AM` form shown on the photo
pub fn format_capture_time(captured_at: &DateTime<Local>) -> String {
    captured_at.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}
