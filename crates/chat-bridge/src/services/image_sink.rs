use chrono::Utc;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::utils::error::BridgeError;

/// Writes generated images to a local directory so the transport can send them
#[derive(Debug, Clone)]
pub struct ImageSink {
    output_dir: PathBuf,
}

impl ImageSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Persist decoded image bytes under a microsecond-timestamp file name.
    ///
    /// The extension comes from the detected format. Bytes that are not a
    /// recognizable image are rejected before anything touches the disk.
    pub async fn persist(&self, bytes: &[u8]) -> Result<PathBuf, BridgeError> {
        let kind = infer::get(bytes)
            .filter(|_| infer::is_image(bytes))
            .ok_or_else(|| {
                BridgeError::ImageDecode(format!(
                    "Generated payload is not a recognizable image ({} bytes)",
                    bytes.len()
                ))
            })?;

        fs::create_dir_all(&self.output_dir).await?;

        let mut stamp = Utc::now().timestamp_micros();
        loop {
            let path = self.output_dir.join(format!("{}.{}", stamp, kind.extension()));

            // create_new: two images generated in the same microsecond must not overwrite
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    file.flush().await?;
                    info!("Saved image {} ({} bytes)", path.display(), bytes.len());
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Image name {} taken, retrying", path.display());
                    stamp += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
