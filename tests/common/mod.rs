#![allow(dead_code)]

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use photo_session::annotation::{AnnotationError, FrameAnnotator};
use photo_session::error_channel::ErrorChannel;
use photo_session::file_camera::{CameraDeviceConfig, StillFileCamera};
use photo_session::location::{FixedGeolocation, LocationResolver, ReverseGeocoder};
use photo_session::media::DeviceMediaManager;
use photo_session::models::Coordinates;
use photo_session::photo_store::PhotoStore;
use photo_session::session_controller::SessionController;
use photo_session::share_dir::DirectoryShareTarget;
use photo_session::sharing::SharingGateway;

pub const POSITION: Coordinates = Coordinates {
    latitude: 51.5007,
    longitude: -0.1246,
};

pub const ADDRESS: &str = "Westminster, London";

pub struct StaticGeocoder;

#[async_trait]
impl ReverseGeocoder for StaticGeocoder {
    async fn reverse(&self, _position: Coordinates) -> anyhow::Result<Option<String>> {
        Ok(Some(ADDRESS.to_string()))
    }
}

/// Keeps the overlay text instead of rendering it, so tests need no font
#[derive(Default)]
pub struct TextCollector {
    pub lines: Mutex<Vec<Vec<String>>>,
}

impl FrameAnnotator for TextCollector {
    fn stamp(&self, _frame: &mut RgbaImage, lines: &[String]) -> Result<(), AnnotationError> {
        self.lines.lock().unwrap().push(lines.to_vec());
        Ok(())
    }
}

pub fn write_camera_image(path: &Path, width: u32, height: u32) {
    RgbaImage::from_pixel(width, height, Rgba([200, 120, 40, 255]))
        .save(path)
        .unwrap();
}

pub struct TestApp {
    pub temp_dir: TempDir,
    pub db_path: String,
    pub controller: Arc<SessionController>,
    pub annotator: Arc<TextCollector>,
}

impl TestApp {
    pub fn share_dir(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("shares")
    }
}

/// A controller on an on-disk database with two file-backed cameras
pub async fn test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("db/photo-session.db")
        .to_string_lossy()
        .to_string();

    let front = temp_dir.path().join("front.png");
    let back = temp_dir.path().join("back.png");
    write_camera_image(&front, 80, 60);
    write_camera_image(&back, 120, 90);

    let (controller, annotator) = build_controller(
        &db_path,
        vec![
            CameraDeviceConfig {
                label: "Front Camera".to_string(),
                path: front,
            },
            CameraDeviceConfig {
                label: "Back Camera".to_string(),
                path: back,
            },
        ],
        &temp_dir.path().join("shares"),
    )
    .await;

    TestApp {
        temp_dir,
        db_path,
        controller,
        annotator,
    }
}

pub async fn build_controller(
    db_path: &str,
    cameras: Vec<CameraDeviceConfig>,
    share_dir: &Path,
) -> (Arc<SessionController>, Arc<TextCollector>) {
    let store = PhotoStore::open(db_path).await.unwrap();
    let annotator = Arc::new(TextCollector::default());
    let location = Arc::new(LocationResolver::new(
        Some(Arc::new(FixedGeolocation::new(POSITION))),
        Arc::new(StaticGeocoder),
        Duration::from_secs(2),
        Duration::from_secs(2),
    ));

    let controller = SessionController::new(
        store.clone(),
        Arc::new(DeviceMediaManager::new(Arc::new(StillFileCamera::new(cameras)))),
        location,
        annotator.clone(),
        SharingGateway::new(store, Some(Arc::new(DirectoryShareTarget::new(share_dir)))),
        ErrorChannel::new(),
    );

    (Arc::new(controller), annotator)
}
