use async_trait::async_trait;
use image::RgbaImage;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::media::{
    DeviceDescriptor, DeviceKind, MediaDevices, MediaError, VideoConstraints, VideoStream,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDeviceConfig {
    pub label: String,
    pub path: PathBuf,
}

/// Cameras backed by still image files.
///
/// Every frame re-reads the file, so an external grabber that keeps overwriting the
/// image behaves like a live camera.
pub struct StillFileCamera {
    devices: Vec<CameraDeviceConfig>,
}

impl StillFileCamera {
    pub fn new(devices: Vec<CameraDeviceConfig>) -> Self {
        Self { devices }
    }

    fn device_id(index: usize) -> String {
        format!("file-camera-{}", index)
    }
}

#[async_trait]
impl MediaDevices for StillFileCamera {
    async fn get_user_media(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Arc<dyn VideoStream>, MediaError> {
        let index = match &constraints.device_id {
            Some(requested) => (0..self.devices.len())
                .find(|index| &Self::device_id(*index) == requested)
                .ok_or_else(|| MediaError::DeviceNotFound(requested.clone()))?,
            None if self.devices.is_empty() => {
                warn!("No camera devices configured");
                return Err(MediaError::PermissionDenied);
            }
            None => 0,
        };

        let device = &self.devices[index];
        if let Err(e) = std::fs::metadata(&device.path) {
            warn!(
                "Camera '{}' is not readable at {}: {}",
                device.label,
                device.path.display(),
                e
            );
            return Err(MediaError::PermissionDenied);
        }

        Ok(Arc::new(FileVideoStream {
            device_id: Self::device_id(index),
            path: device.path.clone(),
            live: AtomicBool::new(true),
        }))
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, MediaError> {
        Ok(self
            .devices
            .iter()
            .enumerate()
            .map(|(index, device)| DeviceDescriptor {
                device_id: Self::device_id(index),
                label: device.label.clone(),
                kind: DeviceKind::VideoInput,
            })
            .collect())
    }
}

struct FileVideoStream {
    device_id: String,
    path: PathBuf,
    live: AtomicBool,
}

impl FileVideoStream {
    fn read_frame(path: &Path) -> Option<RgbaImage> {
        match image::open(path) {
            Ok(img) => Some(img.to_rgba8()),
            Err(e) => {
                debug!("No frame available from {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl VideoStream for FileVideoStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn current_frame(&self) -> Option<RgbaImage> {
        if !self.is_live() {
            return None;
        }
        Self::read_frame(&self.path)
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}
