//! Photo and metadata persistence.
//!
//! Each capture is stored as a JPEG plus a JSON sidecar of the same stem.
//! Both are written under a `.partial` name and renamed into place, the image
//! last, so a photo is never visible without its metadata.

use super::CaptureMetadata;
use crate::constants::capture::{IMAGE_EXTENSION, METADATA_EXTENSION, PARTIAL_SUFFIX};
use crate::detection::CaptureRecord;
use crate::error::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Encode a camera image as JPEG at the given quality (1-100).
///
/// # Errors
///
/// Returns [`Error::ImageEncode`] if the encoder fails.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|source| Error::ImageEncode { source })?;
    Ok(bytes)
}

/// A capture that has been written to disk.
#[derive(Debug, Clone)]
pub struct StoredCapture {
    /// The capture itself, JPEG bytes included.
    pub record: CaptureRecord,
    /// Final photo path.
    pub image_path: PathBuf,
    /// Final sidecar path.
    pub metadata_path: PathBuf,
    /// Sidecar contents.
    pub metadata: CaptureMetadata,
}

/// Writes captures into the images directory.
#[derive(Debug, Clone)]
pub struct CaptureStore {
    images_dir: PathBuf,
    location: Option<String>,
}

impl CaptureStore {
    /// Create a store rooted at `images_dir`.
    #[must_use]
    pub fn new(images_dir: PathBuf, location: Option<String>) -> Self {
        Self {
            images_dir,
            location,
        }
    }

    /// Directory photos are written to.
    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Create the images directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapturePersist`] if the directory cannot be created.
    pub async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.images_dir)
            .await
            .map_err(|source| Error::CapturePersist {
                path: self.images_dir.clone(),
                source,
            })
    }

    /// Store `record` and return where it landed.
    ///
    /// Two captures in the same second with the same weight and trigger get
    /// a numeric suffix rather than overwriting each other.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written. Partial files are
    /// removed on failure.
    pub async fn persist(&self, record: CaptureRecord) -> Result<StoredCapture> {
        self.prepare().await?;

        let image_path = self.unused_image_path(&record.file_name()).await;
        let metadata_path = image_path.with_extension(METADATA_EXTENSION);
        let filename = image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let metadata = CaptureMetadata::new(&record, filename, self.location.clone());
        let json = serde_json::to_vec_pretty(&metadata)
            .map_err(|source| Error::MetadataSerialize { source })?;

        write_atomically(&metadata_path, &json).await?;
        if let Err(e) = write_atomically(&image_path, &record.image).await {
            let _ = tokio::fs::remove_file(&metadata_path).await;
            return Err(e);
        }

        debug!("Stored {} ({} bytes)", image_path.display(), record.image.len());
        Ok(StoredCapture {
            record,
            image_path,
            metadata_path,
            metadata,
        })
    }

    async fn unused_image_path(&self, file_name: &str) -> PathBuf {
        let candidate = self.images_dir.join(file_name);
        if !path_exists(&candidate).await {
            return candidate;
        }

        let stem = candidate
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut counter = 1_u32;
        loop {
            let next = self
                .images_dir
                .join(format!("{stem}-{counter}.{IMAGE_EXTENSION}"));
            if !path_exists(&next).await {
                return next;
            }
            counter += 1;
        }
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Write `bytes` to a `.partial` sibling of `path`, sync, then rename.
async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let partial = partial_path(path);
    let persist_err = |source| Error::CapturePersist {
        path: path.to_path_buf(),
        source,
    };

    let written = async {
        let mut file = tokio::fs::File::create(&partial).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        tokio::fs::rename(&partial, path).await
    }
    .await;

    if let Err(source) = written {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(persist_err(source));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::detection::DetectionType;
    use chrono::{Local, TimeZone};
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    fn record(weight_grams: Option<f64>) -> CaptureRecord {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([120])));
        CaptureRecord {
            image: encode_jpeg(&image, 90).unwrap(),
            weight_grams,
            captured_at: Local.with_ymd_and_hms(2026, 5, 17, 7, 30, 5).unwrap(),
            detection: DetectionType::Both,
        }
    }

    #[test]
    fn test_encode_jpeg_decodes_back() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 4, Luma([200])));
        let bytes = encode_jpeg(&image, 75).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 4));
    }

    #[tokio::test]
    async fn test_persist_writes_image_and_sidecar() {
        let dir = TempDir::new().unwrap();
        let store = CaptureStore::new(dir.path().join("images"), Some("garden".to_string()));

        let stored = store.persist(record(Some(11.456))).await.unwrap();

        assert_eq!(
            stored.image_path.file_name().unwrap(),
            "bird_20260517_073005_11.46g_both.jpg"
        );
        assert!(stored.image_path.exists());
        assert_eq!(std::fs::read(&stored.image_path).unwrap(), stored.record.image);

        let sidecar: CaptureMetadata =
            serde_json::from_slice(&std::fs::read(&stored.metadata_path).unwrap()).unwrap();
        assert_eq!(sidecar, stored.metadata);
        assert_eq!(sidecar.location.as_deref(), Some("garden"));
        assert_eq!(sidecar.weight, Some(11.456));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("images"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(PARTIAL_SUFFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_same_second_captures_do_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = CaptureStore::new(dir.path().to_path_buf(), None);

        let first = store.persist(record(None)).await.unwrap();
        let second = store.persist(record(None)).await.unwrap();

        assert_ne!(first.image_path, second.image_path);
        assert_eq!(
            second.image_path.file_name().unwrap(),
            "bird_20260517_073005_None_both-1.jpg"
        );
        assert_eq!(second.metadata.filename, "bird_20260517_073005_None_both-1.jpg");
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_a_persist_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let store = CaptureStore::new(blocker, None);

        let err = store.persist(record(None)).await.unwrap_err();
        assert!(matches!(err, Error::CapturePersist { .. }));
        assert!(!err.is_fatal());
    }
}
