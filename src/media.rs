//! Camera stream ownership.
//!
//! The host exposes cameras through [`MediaDevices`]; [`DeviceMediaManager`] keeps at most
//! one live [`VideoStream`] and swaps it without ever dropping to zero live sources.

use async_trait::async_trait;
use image::RgbaImage;
use log::{info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error_kind::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
    AudioOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    pub device_id: String,
    pub label: String,
    pub kind: DeviceKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoConstraints {
    /// Exact device to open; any camera when `None`
    pub device_id: Option<String>,
}

impl VideoConstraints {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn device(device_id: &str) -> Self {
        Self {
            device_id: Some(device_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("Camera permission denied.")]
    PermissionDenied,
    #[error("Camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("Could not switch camera: {0}")]
    SwitchFailed(String),
    #[error("No live camera stream")]
    NoActiveStream,
    #[error("Camera access is not supported on this platform")]
    Unsupported,
}

impl MediaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::PermissionDenied | MediaError::DeviceNotFound(_) => {
                ErrorKind::PermissionDenied
            }
            MediaError::SwitchFailed(_) | MediaError::NoActiveStream => ErrorKind::SwitchFailed,
            MediaError::Unsupported => ErrorKind::Unsupported,
        }
    }
}

/// A live video track
pub trait VideoStream: Send + Sync {
    fn device_id(&self) -> &str;

    /// Latest frame, `None` when the track has nothing to show (or was stopped)
    fn current_frame(&self) -> Option<RgbaImage>;

    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// Host camera capability
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Arc<dyn VideoStream>, MediaError>;

    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, MediaError>;
}

pub struct DeviceMediaManager {
    devices: Arc<dyn MediaDevices>,
    active: Mutex<Option<Arc<dyn VideoStream>>>,
}

impl DeviceMediaManager {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            active: Mutex::new(None),
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<Arc<dyn VideoStream>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a camera and makes it the live source.
    ///
    /// An already live stream is replaced only after the new one was granted.
    pub async fn acquire(&self) -> Result<Arc<dyn VideoStream>, MediaError> {
        let stream = self.devices.get_user_media(&VideoConstraints::any()).await?;
        info!("Camera stream acquired from device {}", stream.device_id());

        if let Some(previous) = self.active().replace(stream.clone()) {
            previous.stop();
        }
        Ok(stream)
    }

    pub async fn list_video_inputs(&self) -> Result<Vec<DeviceDescriptor>, MediaError> {
        let devices = self.devices.enumerate_devices().await?;
        Ok(devices
            .into_iter()
            .filter(|device| device.kind == DeviceKind::VideoInput)
            .collect())
    }

    pub async fn can_switch(&self) -> bool {
        match self.list_video_inputs().await {
            Ok(inputs) => inputs.len() > 1,
            Err(e) => {
                warn!("Could not enumerate cameras: {}", e);
                false
            }
        }
    }

    /// Swaps the live source to `device`.
    ///
    /// The current stream keeps running until the replacement is granted; on failure it
    /// stays the live source and `SwitchFailed` is returned.
    pub async fn switch_to(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Arc<dyn VideoStream>, MediaError> {
        if self.active_stream().is_none() {
            return Err(MediaError::NoActiveStream);
        }

        let replacement = self
            .devices
            .get_user_media(&VideoConstraints::device(&device.device_id))
            .await
            .map_err(|e| MediaError::SwitchFailed(format!("{}: {}", device.label, e)))?;

        let previous = self.active().replace(replacement.clone());
        if let Some(previous) = previous {
            previous.stop();
        }

        info!("Switched camera to '{}' ({})", device.label, device.device_id);
        Ok(replacement)
    }

    /// Swaps the live source to the video input with `device_id`
    pub async fn switch_to_device(&self, device_id: &str) -> Result<DeviceDescriptor, MediaError> {
        let device = self
            .list_video_inputs()
            .await?
            .into_iter()
            .find(|device| device.device_id == device_id)
            .ok_or_else(|| MediaError::DeviceNotFound(device_id.to_string()))?;

        self.switch_to(&device).await?;
        Ok(device)
    }

    /// Switches to the first camera labelled as a back camera, if there is one
    pub async fn switch_to_back_camera(
        &self,
    ) -> Result<Option<DeviceDescriptor>, MediaError> {
        let inputs = self.list_video_inputs().await?;
        let Some(back_camera) = inputs
            .into_iter()
            .find(|device| device.label.to_lowercase().contains("back"))
        else {
            info!("No back camera available, keeping current camera");
            return Ok(None);
        };

        self.switch_to(&back_camera).await?;
        Ok(Some(back_camera))
    }

    /// Stops the live stream. Calling it without a live stream does nothing.
    pub fn release(&self) {
        if let Some(stream) = self.active().take() {
            stream.stop();
            info!("Camera stream on device {} released", stream.device_id());
        }
    }

    pub fn active_stream(&self) -> Option<Arc<dyn VideoStream>> {
        self.active().clone()
    }

    pub fn is_live(&self) -> bool {
        self.active()
            .as_ref()
            .map(|stream| stream.is_live())
            .unwrap_or(false)
    }
}
