//! services/board/src/adapters/images.rs
//!
//! A public image bucket on the local filesystem. Objects are served back by
//! the web layer under `/images`, so the returned URL is publicly resolvable.

use async_trait::async_trait;
use chrono::Utc;
use secretboard_core::domain::{ImageUpload, SessionId};
use secretboard_core::ports::{ImageStore, PortError, PortResult};
use std::path::PathBuf;
use tracing::{error, info};

pub const IMAGES_ROUTE: &str = "/images";

#[derive(Clone)]
pub struct LocalBucket {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBucket {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// `<session>_<unix millis>.<ext>`; the extension is dropped when the file had none.
    pub fn object_name(session_id: &SessionId, image: &ImageUpload, millis: i64) -> String {
        let stem: String = session_id
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        match image.extension() {
            Some(ext) => format!("{}_{}.{}", stem, millis, ext),
            None => format!("{}_{}", stem, millis),
        }
    }
}

#[async_trait]
impl ImageStore for LocalBucket {
    async fn upload_image(&self, session_id: &SessionId, image: ImageUpload) -> PortResult<String> {
        if image.bytes.is_empty() {
            return Err(PortError::Upload("The selected file is empty".to_string()));
        }

        let name = Self::object_name(session_id, &image, Utc::now().timestamp_millis());
        let write = async {
            tokio::fs::create_dir_all(&self.root).await?;
            tokio::fs::write(self.root.join(&name), &image.bytes).await
        };
        write.await.map_err(|e| {
            error!("Failed to store image '{}': {:?}", name, e);
            PortError::Upload(e.to_string())
        })?;

        info!("Stored image '{}' ({} bytes).", name, image.bytes.len());
        Ok(format!("{}{}/{}", self.public_base_url, IMAGES_ROUTE, name))
    }
}
