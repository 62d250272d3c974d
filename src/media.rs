use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    constants::{IMAGE_EXTENSIONS, RECIPE_IMAGE_DIR},
    error::TypeError,
};

/// Image uploaded inline as `data:image/<ext>;base64,<payload>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Base64Image {
    pub extension: String,
    pub bytes: Vec<u8>,
}

impl TryFrom<&str> for Base64Image {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let (header, payload) = value
            .split_once(";base64,")
            .ok_or_else(|| TypeError::new("Expected a base64 encoded data URI"))?;

        let extension = header
            .strip_prefix("data:image/")
            .ok_or_else(|| TypeError::new("Expected an image data URI"))?
            .to_ascii_lowercase();

        if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(TypeError::new("Unsupported image format"));
        }

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|_e| TypeError::new("Invalid base64 payload"))?;

        if bytes.is_empty() {
            return Err(TypeError::new("The submitted image is empty"));
        }

        Ok(Self { extension, bytes })
    }
}

/// Stores uploads under `root` and maps stored paths to public URLs.
pub struct MediaStore {
    root: PathBuf,
    url: String,
}

impl MediaStore {
    pub fn new(root: PathBuf, url: String) -> Self {
        Self { root, url }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the image and returns its path relative to the media root.
    pub async fn save_image(&self, image: &Base64Image) -> Result<String, potion::Error> {
        let relative = format!(
            "{RECIPE_IMAGE_DIR}/{}.{}",
            uuid::Uuid::new_v4(),
            image.extension
        );
        let path = self.root.join(&relative);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(&path, e))?;
        }
        tokio::fs::write(&path, &image.bytes)
            .await
            .map_err(|e| storage_error(&path, e))?;

        log::debug!("Stored image {relative} ({} bytes)", image.bytes.len());
        Ok(relative)
    }

    /// Failing to delete a stale upload never fails the request.
    pub async fn remove(&self, relative: &str) {
        if relative.is_empty() {
            return;
        }
        let path = self.root.join(relative);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            log::warn!("Failed to remove {}: {e}", path.display());
        }
    }

    pub fn url(&self, relative: &str) -> String {
        format!("{}{}", self.url, relative)
    }

    /// Path segments the files are served under, taken from the media URL.
    pub fn url_segments(&self) -> Vec<String> {
        let path = match self.url.split_once("://") {
            Some((_, rest)) => rest.split_once('/').map(|(_, path)| path).unwrap_or(""),
            None => self.url.as_str(),
        };

        path.split('/')
            .filter(|segment| !segment.is_empty())
            .map(String::from)
            .collect()
    }
}

fn storage_error(path: &Path, e: std::io::Error) -> potion::Error {
    log::error!("Failed to store {}: {e}", path.display());
    potion::Error {
        code: 500,
        info: Some(String::from("Failed to store the uploaded image")),
        redirect: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    #[test]
    fn decodes_data_uri() {
        let image = Base64Image::try_from(PIXEL).unwrap();

        assert_eq!(image.extension, "png");
        assert_eq!(&image.bytes[1..4], b"PNG");
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(Base64Image::try_from("https://example.com/cat.png").is_err());
        assert!(Base64Image::try_from("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(Base64Image::try_from("data:image/bmp;base64,aGVsbG8=").is_err());
        assert!(Base64Image::try_from("data:image/png;base64,!!!").is_err());
        assert!(Base64Image::try_from("data:image/png;base64,").is_err());
    }

    #[test]
    fn serves_under_url_path() {
        let store = MediaStore::new(PathBuf::from("media"), String::from("/media/"));
        assert_eq!(store.url_segments(), vec!["media"]);

        let store = MediaStore::new(
            PathBuf::from("media"),
            String::from("https://cdn.example.com/static/media/"),
        );
        assert_eq!(store.url_segments(), vec!["static", "media"]);
    }

    #[tokio::test]
    async fn saves_and_removes_images() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf(), String::from("/media/"));
        let image = Base64Image::try_from(PIXEL).unwrap();

        let relative = store.save_image(&image).await.unwrap();
        assert!(relative.starts_with("recipes/images/"));
        assert!(relative.ends_with(".png"));
        assert_eq!(std::fs::read(dir.path().join(&relative)).unwrap(), image.bytes);
        assert_eq!(store.url(&relative), format!("/media/{relative}"));

        store.remove(&relative).await;
        assert!(!dir.path().join(&relative).exists());
    }
}
