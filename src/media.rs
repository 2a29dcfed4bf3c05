/**
 * Image storage
 * Bucketed image files on local disk, served under /uploads/{bucket}/
 */
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::MediaError;

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB
pub const BUCKETS: &[&str] = &["blog-images", "project-images"];
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    pub url: String,
    pub filename: String,
    pub size: usize,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub filename: String,
    pub url: String,
    pub size: u64,
    pub created_at: String,
}

/// Sniff the image type from its leading bytes.
pub fn detect_image_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: RIFF....WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        _ => "webp",
    }
}

fn extension_of(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

/// Reject path traversal and separators in a client-supplied file name.
pub fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains('\0')
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, MediaError> {
        if !BUCKETS.contains(&bucket) {
            return Err(MediaError::UnknownBucket(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    /// Validate and write an uploaded image under a fresh UUID file name.
    pub async fn save(
        &self,
        bucket: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredImage, MediaError> {
        let dir = self.bucket_dir(bucket)?;

        if !ALLOWED_EXTENSIONS.contains(&extension_of(original_name).as_str()) {
            return Err(MediaError::UnsupportedType);
        }
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if bytes.len() > MAX_FILE_SIZE {
            return Err(MediaError::TooLarge);
        }
        let mime_type = detect_image_type(bytes).ok_or(MediaError::UnsupportedType)?;

        tokio::fs::create_dir_all(&dir).await?;

        let filename = format!("{}.{}", Uuid::new_v4(), extension_for(mime_type));
        tokio::fs::write(dir.join(&filename), bytes).await?;

        tracing::info!(bucket, filename = %filename, size = bytes.len(), "image stored");

        Ok(StoredImage {
            url: format!("/uploads/{}/{}", bucket, filename),
            filename,
            size: bytes.len(),
            mime_type: mime_type.to_string(),
        })
    }

    pub async fn delete(&self, bucket: &str, filename: &str) -> Result<(), MediaError> {
        let dir = self.bucket_dir(bucket)?;
        if !is_safe_filename(filename) {
            return Err(MediaError::InvalidFilename);
        }

        match tokio::fs::remove_file(dir.join(filename)).await {
            Ok(()) => {
                tracing::info!(bucket, filename, "image deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MediaError::NotFound),
            Err(e) => Err(MediaError::Io(e)),
        }
    }

    /// Images in a bucket, newest first. A bucket never written to is empty.
    pub async fn list(&self, bucket: &str) -> Result<Vec<ImageInfo>, MediaError> {
        let dir = self.bucket_dir(bucket)?;

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(MediaError::Io(e)),
        };

        let mut images = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            if !ALLOWED_EXTENSIONS.contains(&extension_of(&filename).as_str()) {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            let created_at = metadata
                .created()
                .or_else(|_| metadata.modified())
                .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339())
                .unwrap_or_default();

            images.push(ImageInfo {
                url: format!("/uploads/{}/{}", bucket, filename),
                filename,
                size: metadata.len(),
                created_at,
            });
        }

        images.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn temp_store() -> ImageStore {
        ImageStore::new(std::env::temp_dir().join(format!("eqostack-media-{}", Uuid::new_v4())))
    }

    #[test]
    fn test_detect_image_type() {
        assert_eq!(detect_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(detect_image_type(PNG), Some("image/png"));
        assert_eq!(detect_image_type(b"GIF89a"), Some("image/gif"));
        assert_eq!(detect_image_type(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(detect_image_type(b"RIFF\0\0\0\0WAVE"), None);
        assert_eq!(detect_image_type(b"<svg"), None);
    }

    #[test]
    fn test_safe_filename() {
        assert!(is_safe_filename("a1b2.png"));
        assert!(!is_safe_filename("../etc/passwd"));
        assert!(!is_safe_filename("dir/file.png"));
        assert!(!is_safe_filename(""));
    }

    #[tokio::test]
    async fn test_save_list_delete() {
        let store = temp_store();

        let stored = store.save("blog-images", "cover.PNG", PNG).await.unwrap();
        assert!(stored.url.starts_with("/uploads/blog-images/"));
        assert!(stored.filename.ends_with(".png"));
        assert_eq!(stored.mime_type, "image/png");

        let listed = store.list("blog-images").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].filename, stored.filename);
        assert!(store.list("project-images").await.unwrap().is_empty());

        store.delete("blog-images", &stored.filename).await.unwrap();
        assert!(matches!(
            store.delete("blog-images", &stored.filename).await,
            Err(MediaError::NotFound)
        ));

        let _ = tokio::fs::remove_dir_all(store.root()).await;
    }

    #[tokio::test]
    async fn test_save_rejects_bad_input() {
        let store = temp_store();

        assert!(matches!(
            store.save("avatars", "a.png", PNG).await,
            Err(MediaError::UnknownBucket(_))
        ));
        assert!(matches!(
            store.save("blog-images", "a.svg", PNG).await,
            Err(MediaError::UnsupportedType)
        ));
        assert!(matches!(
            store.save("blog-images", "a.png", b"not an image").await,
            Err(MediaError::UnsupportedType)
        ));
        assert!(matches!(
            store.save("blog-images", "a.png", &[]).await,
            Err(MediaError::Empty)
        ));

        let mut huge = PNG.to_vec();
        huge.resize(MAX_FILE_SIZE + 1, 0);
        assert!(matches!(
            store.save("blog-images", "a.png", &huge).await,
            Err(MediaError::TooLarge)
        ));
        assert!(matches!(
            store.delete("blog-images", "../x.png").await,
            Err(MediaError::InvalidFilename)
        ));
    }
}
