use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};

use crate::sharing::{ShareFile, SharePayload, ShareTarget};

/// Share target that exports the file set into a new folder below `root`
pub struct DirectoryShareTarget {
    root: PathBuf,
}

impl DirectoryShareTarget {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    async fn fresh_export_dir(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S-%3f").to_string();
        let mut dir = self.root.join(format!("share-{}", stamp));
        let mut attempt = 1;
        while tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            attempt += 1;
            dir = self.root.join(format!("share-{}-{}", stamp, attempt));
        }
        dir
    }
}

#[async_trait]
impl ShareTarget for DirectoryShareTarget {
    fn can_share(&self, files: &[ShareFile]) -> bool {
        !files.is_empty() && files.iter().all(|file| file.mime_type.starts_with("image/"))
    }

    async fn share(&self, payload: SharePayload) -> Result<()> {
        if payload.files.is_empty() {
            bail!("nothing to share");
        }

        let dir = self.fresh_export_dir().await;
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("cannot create share folder {}", dir.display()))?;

        // Every file carries the same name, so the position keeps them apart
        for (index, file) in payload.files.iter().enumerate() {
            let path = dir.join(format!("{:03}_{}", index + 1, file.name));
            tokio::fs::write(&path, &file.data)
                .await
                .with_context(|| format!("cannot write {}", path.display()))?;
        }

        let note = format!("{}\n\n{}\n", payload.title, payload.text);
        tokio::fs::write(dir.join("README.txt"), note)
            .await
            .context("cannot write share note")?;

        info!(
            "Exported {} files to {}",
            payload.files.len(),
            dir.display()
        );
        Ok(())
    }
}
