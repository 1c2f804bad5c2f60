use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;

use crate::error_kind::ErrorKind;
use crate::models::Partition;
use crate::photo_store::{PhotoStore, StoreError};

pub const SHARE_FILE_NAME: &str = "session_snapshot.png";
pub const SHARE_MIME_TYPE: &str = "image/png";
pub const SHARE_TITLE: &str = "Session Photos";
pub const SHARE_TEXT: &str = "Here are the session photos I took!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
    pub files: Vec<ShareFile>,
    pub title: String,
    pub text: String,
}

/// Host share capability
#[async_trait]
pub trait ShareTarget: Send + Sync {
    /// Whether this exact file set can be shared at all
    fn can_share(&self, files: &[ShareFile]) -> bool;

    async fn share(&self, payload: SharePayload) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("No session photos to share.")]
    NoPhotos,
    #[error("Sharing files is not supported on this platform.")]
    Unsupported,
    #[error("Share failed: {0}")]
    ShareFailed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ShareError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShareError::NoPhotos => ErrorKind::NoPhotos,
            ShareError::Unsupported => ErrorKind::Unsupported,
            ShareError::ShareFailed(_) => ErrorKind::ShareFailed,
            ShareError::Store(e) => e.kind(),
        }
    }
}

/// Hands the session photos to the host share capability. Read-only on the store.
#[derive(Clone)]
pub struct SharingGateway {
    store: PhotoStore,
    target: Option<Arc<dyn ShareTarget>>,
}

impl SharingGateway {
    pub fn new(store: PhotoStore, target: Option<Arc<dyn ShareTarget>>) -> Self {
        Self { store, target }
    }

    pub fn is_available(&self) -> bool {
        self.target.is_some()
    }

    /// Shares every session photo; returns how many files were handed over
    pub async fn share_session_photos(&self) -> Result<usize, ShareError> {
        let records = self.store.list_all(Partition::Session).await?;
        if records.is_empty() {
            return Err(ShareError::NoPhotos);
        }

        let files: Vec<ShareFile> = records
            .into_iter()
            .map(|record| ShareFile {
                name: SHARE_FILE_NAME.to_string(),
                mime_type: SHARE_MIME_TYPE.to_string(),
                data: record.image_data,
            })
            .collect();

        let target = match &self.target {
            Some(target) if target.can_share(&files) => target,
            _ => return Err(ShareError::Unsupported),
        };

        let count = files.len();
        let payload = SharePayload {
            files,
            title: SHARE_TITLE.to_string(),
            text: SHARE_TEXT.to_string(),
        };

        target.share(payload).await.map_err(|e| {
            warn!("Share target rejected {} photos: {:#}", count, e);
            ShareError::ShareFailed(e.to_string())
        })?;

        info!("Shared {} session photos", count);
        Ok(count)
    }
}
