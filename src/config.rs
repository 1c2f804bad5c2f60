use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::file_camera::CameraDeviceConfig;
use crate::geocoder::DEFAULT_REVERSE_GEOCODE_URL;
use crate::models::Coordinates;

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub db_path: String,
    pub font_path: Option<String>,
    pub geocoder: GeocoderConfig,
    pub cameras: Vec<CameraDeviceConfig>,
    pub fixed_position: Option<Coordinates>,
    pub location_timeout: Duration,
    pub share_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; empty values count as unset
    pub fn from_vars<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let latitude = var("PHOTO_SESSION_LATITUDE")
            .map(|v| v.trim().parse::<f64>())
            .transpose()?;
        let longitude = var("PHOTO_SESSION_LONGITUDE")
            .map(|v| v.trim().parse::<f64>())
            .transpose()?;
        let fixed_position = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            (None, None) => None,
            _ => {
                return Err(
                    "PHOTO_SESSION_LATITUDE and PHOTO_SESSION_LONGITUDE must be set together".into(),
                )
            }
        };

        Ok(Config {
            port: var("PHOTO_SESSION_PORT")
                .unwrap_or_else(|| "18480".to_string())
                .parse()?,
            host: var("PHOTO_SESSION_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            db_path: var("PHOTO_SESSION_DB_PATH")
                .unwrap_or_else(|| "./data/database/photo-session.db".to_string()),
            font_path: var("PHOTO_SESSION_FONT_PATH"),
            geocoder: GeocoderConfig {
                url: var("PHOTO_SESSION_GEOCODER_URL")
                    .unwrap_or_else(|| DEFAULT_REVERSE_GEOCODE_URL.to_string()),
                user_agent: var("PHOTO_SESSION_USER_AGENT").unwrap_or_else(|| {
                    format!("photo-session/{}", env!("CARGO_PKG_VERSION"))
                }),
                timeout: Duration::from_secs(
                    var("PHOTO_SESSION_GEOCODER_TIMEOUT_SECS")
                        .unwrap_or_else(|| "10".to_string())
                        .parse()?,
                ),
            },
            cameras: parse_camera_devices(&var("PHOTO_SESSION_CAMERAS").unwrap_or_default())?,
            fixed_position,
            location_timeout: Duration::from_secs(
                var("PHOTO_SESSION_LOCATION_TIMEOUT_SECS")
                    .unwrap_or_else(|| "10".to_string())
                    .parse()?,
            ),
            share_dir: var("PHOTO_SESSION_SHARE_DIR").map(PathBuf::from),
        })
    }
}

/// Parses `label=path` entries separated by commas
pub fn parse_camera_devices(
    value: &str,
) -> Result<Vec<CameraDeviceConfig>, Box<dyn std::error::Error>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((label, path)) if !label.trim().is_empty() && !path.trim().is_empty() => {
                Ok(CameraDeviceConfig {
                    label: label.trim().to_string(),
                    path: PathBuf::from(path.trim()),
                })
            }
            _ => Err(format!("Invalid camera entry '{}', expected label=path", entry).into()),
        })
        .collect()
}
