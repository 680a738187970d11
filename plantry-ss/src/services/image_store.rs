//! Packet image storage
//!
//! Captured stills are written content-addressed (sha256 prefix of the PNG
//! bytes) under `<root>/packet_images/` and served statically by the
//! router. Re-capturing an identical frame lands on the same file, so
//! storage never accumulates duplicates.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use plantry_common::Result;

use crate::devices::CapturedImage;

/// Directory name (and URL prefix) for stored packet images
pub const IMAGE_DIR_NAME: &str = "packet_images";

/// Image storage contract
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist a captured image; returns its service-relative URL path
    async fn store(&self, image: &CapturedImage) -> Result<String>;
}

/// Disk-backed image store under the service root folder
pub struct DiskImageStore {
    dir: PathBuf,
}

impl DiskImageStore {
    pub fn new(root_folder: &Path) -> Self {
        Self {
            dir: root_folder.join(IMAGE_DIR_NAME),
        }
    }

    /// Directory images are written to (for static serving)
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ImageStore for DiskImageStore {
    async fn store(&self, image: &CapturedImage) -> Result<String> {
        std::fs::create_dir_all(&self.dir)?;

        let mut hasher = Sha256::new();
        hasher.update(&image.png);
        let digest = hasher.finalize();
        let name = format!("{:x}", digest);
        let file_name = format!("{}.png", &name[..16]);

        let path = self.dir.join(&file_name);
        if !path.exists() {
            std::fs::write(&path, &image.png)?;
            tracing::debug!(
                file = %path.display(),
                bytes = image.png.len(),
                "Packet image stored"
            );
        }

        Ok(format!("/{}/{}", IMAGE_DIR_NAME, file_name))
    }
}
