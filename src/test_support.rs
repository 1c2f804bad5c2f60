//! In-memory stand-ins for the host capabilities, shared by the unit tests.

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::annotation::{AnnotationError, FrameAnnotator};
use crate::location::{GeolocationProvider, LocationError, ReverseGeocoder};
use crate::media::{
    DeviceDescriptor, DeviceKind, MediaDevices, MediaError, VideoConstraints, VideoStream,
};
use crate::models::Coordinates;
use crate::sharing::{ShareFile, SharePayload, ShareTarget};

pub struct FakeStream {
    device_id: String,
    frame_size: Arc<Mutex<(u32, u32)>>,
    live: AtomicBool,
}

impl VideoStream for FakeStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn current_frame(&self) -> Option<RgbaImage> {
        if !self.is_live() {
            return None;
        }
        let (width, height) = *self.frame_size.lock().unwrap();
        Some(RgbaImage::from_pixel(width, height, Rgba([40, 80, 120, 255])))
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct CameraState {
    devices: Vec<DeviceDescriptor>,
    denied: bool,
    failing: HashSet<String>,
    switch_delay: Option<Duration>,
    streams: Vec<Arc<FakeStream>>,
}

/// Cameras `cam-0`, `cam-1`, ... producing solid 64x48 frames
pub struct FakeCamera {
    state: Mutex<CameraState>,
    frame_size: Arc<Mutex<(u32, u32)>>,
}

impl FakeCamera {
    pub fn with_devices(labels: &[&str]) -> Self {
        let devices = labels
            .iter()
            .enumerate()
            .map(|(index, label)| DeviceDescriptor {
                device_id: format!("cam-{}", index),
                label: label.to_string(),
                kind: DeviceKind::VideoInput,
            })
            .collect();

        Self {
            state: Mutex::new(CameraState {
                devices,
                ..CameraState::default()
            }),
            frame_size: Arc::new(Mutex::new((64, 48))),
        }
    }

    pub fn deny_access(&self) {
        self.state.lock().unwrap().denied = true;
    }

    pub fn add_audio_input(&self, label: &str) {
        let mut state = self.state.lock().unwrap();
        let device_id = format!("mic-{}", state.devices.len());
        state.devices.push(DeviceDescriptor {
            device_id,
            label: label.to_string(),
            kind: DeviceKind::AudioInput,
        });
    }

    pub fn fail_device(&self, device_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(device_id.to_string());
    }

    /// Requests naming an exact device take `delay` to be granted
    pub fn slow_switch(&self, delay: Duration) {
        self.state.lock().unwrap().switch_delay = Some(delay);
    }

    /// Applies to running streams too
    pub fn set_frame_size(&self, width: u32, height: u32) {
        *self.frame_size.lock().unwrap() = (width, height);
    }

    pub fn live_streams(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .streams
            .iter()
            .filter(|stream| stream.is_live())
            .count()
    }
}

#[async_trait]
impl MediaDevices for FakeCamera {
    async fn get_user_media(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Arc<dyn VideoStream>, MediaError> {
        let delay = self.state.lock().unwrap().switch_delay;
        if let (Some(delay), Some(_)) = (delay, &constraints.device_id) {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.denied {
            return Err(MediaError::PermissionDenied);
        }

        let device_id = match &constraints.device_id {
            Some(device_id) => state
                .devices
                .iter()
                .find(|device| &device.device_id == device_id)
                .map(|device| device.device_id.clone())
                .ok_or_else(|| MediaError::DeviceNotFound(device_id.clone()))?,
            None => state
                .devices
                .iter()
                .find(|device| device.kind == DeviceKind::VideoInput)
                .map(|device| device.device_id.clone())
                .ok_or(MediaError::PermissionDenied)?,
        };
        if state.failing.contains(&device_id) {
            return Err(MediaError::DeviceNotFound(device_id));
        }

        let stream = Arc::new(FakeStream {
            device_id,
            frame_size: self.frame_size.clone(),
            live: AtomicBool::new(true),
        });
        state.streams.push(stream.clone());
        Ok(stream)
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, MediaError> {
        Ok(self.state.lock().unwrap().devices.clone())
    }
}

enum Position {
    At(Coordinates),
    Failing(LocationError),
    Hanging,
}

pub struct FakeGeolocation {
    position: Position,
}

impl FakeGeolocation {
    pub fn at(position: Coordinates) -> Self {
        Self {
            position: Position::At(position),
        }
    }

    pub fn failing(error: LocationError) -> Self {
        Self {
            position: Position::Failing(error),
        }
    }

    pub fn hanging() -> Self {
        Self {
            position: Position::Hanging,
        }
    }
}

#[async_trait]
impl GeolocationProvider for FakeGeolocation {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        match &self.position {
            Position::At(position) => Ok(*position),
            Position::Failing(error) => Err(*error),
            Position::Hanging => std::future::pending().await,
        }
    }
}

enum Answer {
    Address(String),
    Failure,
    Empty,
    Hanging,
}

pub struct FakeGeocoder {
    answer: Answer,
    delay: Duration,
}

impl FakeGeocoder {
    pub fn answering(address: &str) -> Self {
        Self::delayed(address, Duration::ZERO)
    }

    pub fn delayed(address: &str, delay: Duration) -> Self {
        Self {
            answer: Answer::Address(address.to_string()),
            delay,
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: Answer::Failure,
            delay: Duration::ZERO,
        }
    }

    pub fn empty() -> Self {
        Self {
            answer: Answer::Empty,
            delay: Duration::ZERO,
        }
    }

    pub fn hanging() -> Self {
        Self {
            answer: Answer::Hanging,
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl ReverseGeocoder for FakeGeocoder {
    async fn reverse(&self, _position: Coordinates) -> anyhow::Result<Option<String>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.answer {
            Answer::Address(address) => Ok(Some(address.clone())),
            Answer::Failure => anyhow::bail!("geocoding service unreachable"),
            Answer::Empty => Ok(None),
            Answer::Hanging => std::future::pending().await,
        }
    }
}

/// Records overlay text instead of drawing it
#[derive(Default)]
pub struct RecordingAnnotator {
    stamped: Mutex<Vec<Vec<String>>>,
    fail_next: AtomicBool,
}

impl RecordingAnnotator {
    pub fn stamped_lines(&self) -> Vec<Vec<String>> {
        self.stamped.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl FrameAnnotator for RecordingAnnotator {
    fn stamp(&self, _frame: &mut RgbaImage, lines: &[String]) -> Result<(), AnnotationError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AnnotationError::FontUnavailable("test font".to_string()));
        }
        self.stamped.lock().unwrap().push(lines.to_vec());
        Ok(())
    }
}

enum ShareBehaviour {
    Accept,
    RefuseFiles,
    Fail(String),
}

pub struct RecordingShareTarget {
    behaviour: ShareBehaviour,
    shared: Mutex<Vec<SharePayload>>,
}

impl RecordingShareTarget {
    fn with(behaviour: ShareBehaviour) -> Self {
        Self {
            behaviour,
            shared: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::with(ShareBehaviour::Accept)
    }

    pub fn refusing_files() -> Self {
        Self::with(ShareBehaviour::RefuseFiles)
    }

    pub fn failing(reason: &str) -> Self {
        Self::with(ShareBehaviour::Fail(reason.to_string()))
    }

    pub fn shared(&self) -> Vec<SharePayload> {
        self.shared.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShareTarget for RecordingShareTarget {
    fn can_share(&self, _files: &[ShareFile]) -> bool {
        !matches!(self.behaviour, ShareBehaviour::RefuseFiles)
    }

    async fn share(&self, payload: SharePayload) -> anyhow::Result<()> {
        if let ShareBehaviour::Fail(reason) = &self.behaviour {
            anyhow::bail!("{}", reason);
        }
        self.shared.lock().unwrap().push(payload);
        Ok(())
    }
}
