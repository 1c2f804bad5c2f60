use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::error_kind::ErrorKind;
use crate::models::Coordinates;

/// Address written when the lookup itself failed (network, timeout, unreadable response)
pub const ADDRESS_LOOKUP_FAILED: &str = "Error getting address.";
/// Address written when the geocoder answered but knew no address for the position
pub const ADDRESS_NOT_FOUND: &str = "No address found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Permission denied.")]
    PermissionDenied,
    #[error("Position unavailable.")]
    PositionUnavailable,
    #[error("Request timed out.")]
    Timeout,
    #[error("Geolocation not supported.")]
    Unsupported,
}

impl LocationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LocationError::PermissionDenied => ErrorKind::PermissionDenied,
            LocationError::PositionUnavailable => ErrorKind::PositionUnavailable,
            LocationError::Timeout => ErrorKind::LocationTimeout,
            LocationError::Unsupported => ErrorKind::Unsupported,
        }
    }
}

/// Host position capability
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// External reverse-geocoding service.
///
/// `Ok(None)` means the service answered without an address.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, position: Coordinates) -> anyhow::Result<Option<String>>;
}

/// Position source for hosts without positioning hardware
pub struct FixedGeolocation {
    position: Coordinates,
}

impl FixedGeolocation {
    pub fn new(position: Coordinates) -> Self {
        Self { position }
    }
}

#[async_trait]
impl GeolocationProvider for FixedGeolocation {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Ok(self.position)
    }
}

pub struct LocationResolver {
    provider: Option<Arc<dyn GeolocationProvider>>,
    geocoder: Arc<dyn ReverseGeocoder>,
    position_timeout: Duration,
    geocode_timeout: Duration,
}

impl LocationResolver {
    /// `provider` is `None` on hosts that offer no location capability at all
    pub fn new(
        provider: Option<Arc<dyn GeolocationProvider>>,
        geocoder: Arc<dyn ReverseGeocoder>,
        position_timeout: Duration,
        geocode_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            geocoder,
            position_timeout,
            geocode_timeout,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn current_position(&self) -> Result<Coordinates, LocationError> {
        let provider = self.provider.as_ref().ok_or(LocationError::Unsupported)?;

        match tokio::time::timeout(self.position_timeout, provider.current_position()).await {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout),
        }
    }

    /// Never fails: lookup problems turn into one of the placeholder strings
    pub async fn resolve_address(&self, position: Coordinates) -> String {
        let lookup = tokio::time::timeout(self.geocode_timeout, self.geocoder.reverse(position));

        match lookup.await {
            Ok(Ok(Some(address))) => {
                debug!(
                    "Resolved {},{} to '{}'",
                    position.latitude, position.longitude, address
                );
                address
            }
            Ok(Ok(None)) => ADDRESS_NOT_FOUND.to_string(),
            Ok(Err(e)) => {
                warn!("Reverse geocoding failed: {:#}", e);
                ADDRESS_LOOKUP_FAILED.to_string()
            }
            Err(_) => {
                warn!(
                    "Reverse geocoding timed out after {:?}",
                    self.geocode_timeout
                );
                ADDRESS_LOOKUP_FAILED.to_string()
            }
        }
    }
}
