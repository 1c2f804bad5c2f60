//! Application layer behind the session buttons.
//!
//! Owns the current [`CaptureSession`] (replaced by a fresh one once it has ended), routes
//! every failure to the [`ErrorChannel`] and derives which buttons are usable from the
//! stored data instead of tracking separate flags.

use log::info;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::annotation::FrameAnnotator;
use crate::capture_session::{
    CaptureSession, SessionError, SessionOperation, SessionResult, SessionState,
};
use crate::error_channel::{DisplayedError, ErrorChannel};
use crate::location::LocationResolver;
use crate::media::{DeviceDescriptor, DeviceMediaManager, MediaError};
use crate::models::{Partition, PhotoSummary};
use crate::photo_store::{PhotoStore, StoreError};
use crate::sharing::{ShareError, SharingGateway};

/// Which session controls are currently usable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Affordances {
    pub start: bool,
    pub capture: bool,
    pub end: bool,
    pub switch_camera: bool,
    pub share: bool,
    pub delete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub in_flight: Option<SessionOperation>,
    pub session_photos: usize,
    pub affordances: Affordances,
    pub last_error: Option<DisplayedError>,
}

pub struct SessionController {
    store: PhotoStore,
    media: Arc<DeviceMediaManager>,
    location: Arc<LocationResolver>,
    annotator: Arc<dyn FrameAnnotator>,
    sharing: SharingGateway,
    errors: ErrorChannel,
    current: Mutex<Option<Arc<CaptureSession>>>,
}

impl SessionController {
    pub fn new(
        store: PhotoStore,
        media: Arc<DeviceMediaManager>,
        location: Arc<LocationResolver>,
        annotator: Arc<dyn FrameAnnotator>,
        sharing: SharingGateway,
        errors: ErrorChannel,
    ) -> Self {
        Self {
            store,
            media,
            location,
            annotator,
            sharing,
            errors,
            current: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &PhotoStore {
        &self.store
    }

    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    fn current(&self) -> MutexGuard<'_, Option<Arc<CaptureSession>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_session(&self) -> Option<Arc<CaptureSession>> {
        self.current().clone()
    }

    /// The session a start request applies to: the current one unless it has ended
    fn session_for_start(&self) -> Arc<CaptureSession> {
        let mut current = self.current();
        match current.as_ref() {
            Some(session) if session.state() != SessionState::Ended => session.clone(),
            _ => {
                let session = Arc::new(CaptureSession::new(
                    self.store.clone(),
                    self.media.clone(),
                    self.location.clone(),
                    self.annotator.clone(),
                ));
                *current = Some(session.clone());
                session
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.current_session()
            .map(|session| session.state())
            .unwrap_or(SessionState::Idle)
    }

    pub async fn start_session(&self) -> SessionResult<()> {
        self.errors.clear();
        let session = self.session_for_start();

        let result = session.start().await;
        if let Err(e) = &result {
            let message = match e {
                SessionError::Camera(MediaError::PermissionDenied) => e.to_string(),
                _ => format!("Error starting session: {}", e),
            };
            self.errors.report(Some(e.kind()), message);
        }
        result
    }

    pub async fn capture_photo(&self) -> SessionResult<i64> {
        let result = match self.current_session() {
            Some(session) => session.capture().await,
            None => Err(SessionError::InvalidState {
                operation: SessionOperation::Capture,
                state: SessionState::Idle,
                busy: false,
            }),
        };

        if let Err(e) = &result {
            let message = match e {
                SessionError::InvalidState { busy: false, .. } => {
                    "Session not active. Start the session first.".to_string()
                }
                _ => format!("Error capturing photo: {}", e),
            };
            self.errors.report(Some(e.kind()), message);
        }
        result
    }

    pub async fn end_session(&self) -> SessionResult<usize> {
        let result = match self.current_session() {
            Some(session) => session.end().await,
            None => Err(SessionError::InvalidState {
                operation: SessionOperation::End,
                state: SessionState::Idle,
                busy: false,
            }),
        };

        match &result {
            Ok(archived) => info!("Session archived with {} photos", archived),
            Err(e) => self
                .errors
                .report(Some(e.kind()), format!("Error ending session: {}", e)),
        }
        result
    }

    /// Clears the session partition.
    ///
    /// Without any session in this process there is nothing live to race with, so
    /// leftovers from an earlier run are cleared directly.
    pub async fn delete_session_photos(&self) -> SessionResult<u64> {
        let result = match self.current_session() {
            Some(session) if session.state() != SessionState::Idle => {
                session.delete_photos().await
            }
            _ => self
                .store
                .clear(Partition::Session)
                .await
                .map_err(SessionError::from),
        };

        if let Err(e) = &result {
            self.errors.report(
                Some(e.kind()),
                format!("Error deleting session photos: {}", e),
            );
        }
        result
    }

    pub async fn share_session_photos(&self) -> Result<usize, ShareError> {
        let result = self.sharing.share_session_photos().await;

        if let Err(e) = &result {
            let message = match e {
                ShareError::NoPhotos | ShareError::Unsupported => e.to_string(),
                _ => format!("Error sharing session photos: {}", e),
            };
            self.errors.report(Some(e.kind()), message);
        }
        result
    }

    /// Switches to `device_id`, or to the back camera when no device is named.
    ///
    /// Returns the camera now in use; `None` when no back camera exists.
    pub async fn switch_camera(
        &self,
        device_id: Option<&str>,
    ) -> SessionResult<Option<DeviceDescriptor>> {
        let result = match self.current_session() {
            Some(session) => session.switch_camera(device_id).await,
            None => Err(SessionError::InvalidState {
                operation: SessionOperation::SwitchCamera,
                state: SessionState::Idle,
                busy: false,
            }),
        };

        if let Err(e) = &result {
            self.errors
                .report(Some(e.kind()), format!("Error switching camera: {}", e));
        }
        result
    }

    pub async fn list_cameras(&self) -> Result<Vec<DeviceDescriptor>, MediaError> {
        self.media.list_video_inputs().await
    }

    pub async fn list_photos(&self, partition: Partition) -> Result<Vec<PhotoSummary>, StoreError> {
        let result = self.store.list_summaries(partition).await;
        if let Err(e) = &result {
            self.errors.report(
                Some(e.kind()),
                format!("Error loading {} photos: {}", partition, e),
            );
        }
        result
    }

    pub async fn photo_image(
        &self,
        partition: Partition,
        id: i64,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .store
            .get(partition, id)
            .await?
            .map(|record| record.image_data))
    }

    pub async fn affordances(&self) -> Result<Affordances, StoreError> {
        let session_photos = self.store.count(Partition::Session).await?;
        Ok(self.derive_affordances(session_photos).await)
    }

    async fn derive_affordances(&self, session_photos: usize) -> Affordances {
        let (state, busy) = match self.current_session() {
            Some(session) => (session.state(), session.in_flight().is_some()),
            None => (SessionState::Idle, false),
        };
        let active = state == SessionState::Active && !busy;

        Affordances {
            start: matches!(state, SessionState::Idle | SessionState::Ended) && !busy,
            capture: active && self.media.is_live(),
            end: active,
            switch_camera: state == SessionState::Active && self.media.can_switch().await,
            share: session_photos > 0,
            delete: session_photos > 0,
        }
    }

    pub async fn status(&self) -> Result<SessionStatus, StoreError> {
        let session_photos = self.store.count(Partition::Session).await?;
        let session = self.current_session();

        Ok(SessionStatus {
            state: session
                .as_ref()
                .map(|s| s.state())
                .unwrap_or(SessionState::Idle),
            in_flight: session.as_ref().and_then(|s| s.in_flight()),
            session_photos,
            affordances: self.derive_affordances(session_photos).await,
            last_error: self.errors.last(),
        })
    }

    pub fn last_error(&self) -> Option<DisplayedError> {
        self.errors.last()
    }
}
