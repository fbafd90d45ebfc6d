//! Image and upload file I/O
//!
//! Keeps file handling out of the pipeline stages so those stay pure and
//! testable.

use crate::error::{PortraitError, Result};
use image::{DynamicImage, RgbaImage};
use std::path::{Path, PathBuf};

/// Upload extensions accepted by [`ImageIOService::store_upload`]
pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".tiff", ".tif", ".svg", ".ico", ".avif",
    ".heic", ".heif", ".jfif", ".jpe", ".jfi",
];

/// Service for image and upload file operations
#[derive(Debug)]
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Falls back to content sniffing when the extension is missing or wrong.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use badge_portrait::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("portrait.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {e}. Attempting content-based detection.",
                    path_ref.display()
                );
                let data = std::fs::read(path_ref)
                    .map_err(|io_err| PortraitError::file_io_error("read image", path_ref, &io_err))?;
                image::load_from_memory(&data).map_err(PortraitError::from)
            },
        }
    }

    /// Encode an RGBA buffer as PNG
    pub fn save_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PortraitError::file_io_error("create output directory", parent, &e))?;
        }
        image.save_with_format(path_ref, image::ImageFormat::Png)?;
        log::info!(
            "Saved {}x{} PNG to {}",
            image.width(),
            image.height(),
            path_ref.display()
        );
        Ok(())
    }

    /// Lowercase extension with its dot, if the name has one on the allow-list
    #[must_use]
    pub fn allowed_extension(file_name: &str) -> Option<String> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))?;
        ALLOWED_UPLOAD_EXTENSIONS
            .contains(&extension.as_str())
            .then_some(extension)
    }

    #[must_use]
    pub fn is_allowed_upload(file_name: &str) -> bool {
        Self::allowed_extension(file_name).is_some()
    }

    /// Store uploaded bytes as `<dir>/<uuid-v4><ext>`
    ///
    /// # Errors
    /// - `UnsupportedFormat` for names outside the allow-list or empty uploads
    /// - File system errors
    pub async fn store_upload(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let extension = Self::allowed_extension(file_name).ok_or_else(|| {
            PortraitError::unsupported_format(format!(
                "'{file_name}' is not an accepted image upload"
            ))
        })?;
        if bytes.is_empty() {
            return Err(PortraitError::unsupported_format("Upload is empty"));
        }

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| PortraitError::file_io_error("create upload directory", dir, &e))?;

        let path = dir.join(format!("{}{extension}", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| PortraitError::file_io_error("write upload", &path, &e))?;

        log::info!("Stored upload {file_name} as {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    #[test]
    fn test_upload_allow_list_is_case_insensitive() {
        assert!(ImageIOService::is_allowed_upload("portrait.JPG"));
        assert!(ImageIOService::is_allowed_upload("scan.heic"));
        assert!(ImageIOService::is_allowed_upload("a.b.jfif"));
        assert!(!ImageIOService::is_allowed_upload("notes.txt"));
        assert!(!ImageIOService::is_allowed_upload("no_extension"));
        assert_eq!(
            ImageIOService::allowed_extension("Photo.PNG").as_deref(),
            Some(".png")
        );
    }

    #[tokio::test]
    async fn test_store_upload_uses_uuid_name() {
        let dir = TempDir::new().unwrap();
        let uploads = dir.path().join("uploads");

        let path = ImageIOService::store_upload(&uploads, "Me.JPEG", b"bytes")
            .await
            .unwrap();
        assert_eq!(path.parent(), Some(uploads.as_path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("jpeg"));
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap();
        assert!(uuid::Uuid::parse_str(stem).is_ok());
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn test_store_upload_rejects_disallowed_extension() {
        let dir = TempDir::new().unwrap();
        let err = ImageIOService::store_upload(dir.path(), "script.exe", b"MZ")
            .await
            .unwrap_err();
        assert!(matches!(err, PortraitError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_png_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("badge.png");
        let image = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 0]));

        ImageIOService::save_png(&image, &path).unwrap();
        let loaded = ImageIOService::load_image(&path).unwrap().to_rgba8();
        assert_eq!(loaded, image);
    }
}
