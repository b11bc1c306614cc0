//! On-disk copy of the latest frame.
//!
//! Keeps `latest.grib2.gz` (the downloaded file), `latest.png` and
//! `latest.json` (frame metadata). Each file is replaced atomically and the
//! metadata is written last. It records a CRC32 of the image, so a pair left
//! mismatched by an interrupted save loads as nothing.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use radar_common::{FrameMetadata, RadarError, RadarFrame};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const SOURCE_FILE: &str = "latest.grib2.gz";
pub const IMAGE_FILE: &str = "latest.png";
pub const METADATA_FILE: &str = "latest.json";

/// Contents of `latest.json`.
#[derive(Debug, Serialize, Deserialize)]
struct StoredMetadata {
    #[serde(flatten)]
    frame: FrameMetadata,
    /// Absent in files written before checksums were recorded
    #[serde(default)]
    image_crc32: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RadarError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            RadarError::Internal(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a frame together with the file it was decoded from.
    pub fn save(&self, frame: &RadarFrame, source: &[u8]) -> Result<(), RadarError> {
        let stored = StoredMetadata {
            frame: frame.metadata(),
            image_crc32: Some(crc32fast::hash(&frame.image)),
        };
        let metadata = serde_json::to_vec_pretty(&stored)
            .map_err(|e| RadarError::Internal(format!("Failed to serialize metadata: {}", e)))?;

        self.write_atomic(SOURCE_FILE, source)?;
        self.write_atomic(IMAGE_FILE, &frame.image)?;
        if let Err(e) = self.write_atomic(METADATA_FILE, &metadata) {
            // The old metadata no longer describes latest.png
            if let Err(remove_err) = fs::remove_file(self.dir.join(IMAGE_FILE)) {
                warn!(error = %remove_err, "Failed to remove orphaned {}", IMAGE_FILE);
            }
            return Err(e);
        }

        debug!(dir = %self.dir.display(), source = %frame.source_name, "Persisted radar frame");
        Ok(())
    }

    /// Load the persisted frame, if any.
    pub fn load(&self) -> Result<Option<RadarFrame>, RadarError> {
        let metadata = match fs::read(self.dir.join(METADATA_FILE)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredMetadata = serde_json::from_slice(&metadata).map_err(|e| {
            RadarError::Internal(format!("Corrupt {}: {}", METADATA_FILE, e))
        })?;
        let metadata = stored.frame;

        let image = match fs::read(self.dir.join(IMAGE_FILE)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if let Some(expected) = stored.image_crc32 {
            let actual = crc32fast::hash(&image);
            if actual != expected {
                warn!(
                    source = %metadata.source_name,
                    expected,
                    actual,
                    "Persisted image does not match its metadata, ignoring"
                );
                return Ok(None);
            }
        }

        info!(source = %metadata.source_name, "Loaded persisted radar frame");
        Ok(Some(RadarFrame::from_parts(metadata, Bytes::from(image))))
    }

    fn write_atomic(&self, name: &str, data: &[u8]) -> Result<(), RadarError> {
        let target = self.dir.join(name);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| {
            RadarError::Internal(format!("Failed to replace {}: {}", target.display(), e))
        })?;
        Ok(())
    }
}
