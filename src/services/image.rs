//! Picture storage
//!
//! Uploaded profile and item pictures are decoded, shrunk to fit a square
//! bound (never enlarged, aspect ratio kept) and written under a fresh random
//! name. Decoding and encoding run on the blocking pool.

use crate::config::{file_extension, UploadConfig};
use crate::models::{DEFAULT_ITEM_IMAGE, DEFAULT_PROFILE_IMAGE};
use anyhow::Context;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Which kind of picture is being stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureKind {
    Profile,
    Item,
}

impl PictureKind {
    /// Subdirectory of the static root, also the URL segment
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Profile => "profile_pics",
            Self::Item => "item_pics",
        }
    }
}

/// Error types for picture uploads
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("File type not allowed. Allowed: {0}")]
    UnsupportedExtension(String),

    #[error("File too large. Maximum size: {max} bytes")]
    TooLarge { size: u64, max: u64 },

    /// Bytes are not a readable picture
    #[error("Could not read the picture: {0}")]
    Decode(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Writes resized pictures below the static root
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    max_file_size: u64,
    allowed_extensions: Vec<String>,
    profile_size: u32,
    item_size: u32,
}

impl ImageStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            root: config.path.clone(),
            max_file_size: config.max_file_size,
            allowed_extensions: config.allowed_extensions.clone(),
            profile_size: config.profile_picture_size,
            item_size: config.item_picture_size,
        }
    }

    /// Directory pictures of `kind` are written to
    pub fn dir(&self, kind: PictureKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    fn bound(&self, kind: PictureKind) -> u32 {
        match kind {
            PictureKind::Profile => self.profile_size,
            PictureKind::Item => self.item_size,
        }
    }

    /// Cheap checks that need no decoding; the form layer runs these too
    pub fn check(&self, original_name: &str, size: u64) -> Result<String, ImageError> {
        let ext = file_extension(original_name)
            .filter(|ext| self.allowed_extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
            .ok_or_else(|| ImageError::UnsupportedExtension(self.allowed_extensions.join(", ")))?;

        if size > self.max_file_size {
            return Err(ImageError::TooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(ext)
    }

    /// Create both picture directories and write grey placeholders for the
    /// default pictures that are missing
    pub fn ensure_defaults(&self) -> anyhow::Result<()> {
        for (kind, name) in [
            (PictureKind::Profile, DEFAULT_PROFILE_IMAGE),
            (PictureKind::Item, DEFAULT_ITEM_IMAGE),
        ] {
            let dir = self.dir(kind);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create picture directory {:?}", dir))?;

            let path = dir.join(name);
            if path.exists() {
                continue;
            }
            let bound = self.bound(kind);
            DynamicImage::ImageRgb8(ImageBuffer::from_pixel(bound, bound, Rgb([200u8, 200, 200])))
                .save_with_format(&path, ImageFormat::Jpeg)
                .with_context(|| format!("Failed to write placeholder {:?}", path))?;
            tracing::info!("Wrote placeholder picture {:?}", path);
        }
        Ok(())
    }

    /// Store an uploaded picture and return its new file name
    pub async fn save(
        &self,
        kind: PictureKind,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ImageError> {
        let ext = self.check(original_name, bytes.len() as u64)?;
        let filename = random_filename(&ext);
        let path = self.dir(kind).join(&filename);
        let bound = self.bound(kind);

        tokio::task::spawn_blocking(move || write_thumbnail(&bytes, bound, &ext, &path))
            .await
            .context("Picture task panicked")??;

        tracing::debug!("Stored {} picture {}", kind.dir_name(), filename);
        Ok(filename)
    }
}

/// 16 hex characters plus the lower-cased original extension
fn random_filename(ext: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}.{}", &hex[..16], ext)
}

/// Shrink to fit `bound`×`bound`; smaller pictures are returned unchanged
fn fit_within(img: DynamicImage, bound: u32) -> DynamicImage {
    if img.width() <= bound && img.height() <= bound {
        img
    } else {
        img.thumbnail(bound, bound)
    }
}

fn write_thumbnail(bytes: &[u8], bound: u32, ext: &str, path: &Path) -> Result<(), ImageError> {
    let format = ImageFormat::from_extension(ext)
        .ok_or_else(|| ImageError::UnsupportedExtension(ext.to_string()))?;
    let img = image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;

    let mut img = fit_within(img, bound);
    // JPEG has no alpha channel
    if format == ImageFormat::Jpeg {
        img = DynamicImage::ImageRgb8(img.to_rgb8());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create picture directory {:?}", parent))?;
    }
    img.save_with_format(path, format)
        .with_context(|| format!("Failed to write picture {:?}", path))?;

    Ok(())
}
