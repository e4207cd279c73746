use std::path::PathBuf;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use uuid::Uuid;

use crate::{
    config::Config,
    constants::{IMAGE_EXTENSIONS, IMAGES_DIR},
    error::{ServiceError, ValidationError},
};

/// A decoded `data:image/<type>;base64,<payload>` upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Image {
    pub extension: String,
    pub bytes: Vec<u8>,
}

impl Base64Image {
    pub fn parse(data: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidImage(reason.to_string());

        let (header, payload) = data
            .trim()
            .split_once(";base64,")
            .ok_or_else(|| invalid("expected a base64 data URI"))?;

        let subtype = header
            .strip_prefix("data:image/")
            .ok_or_else(|| invalid("expected an image media type"))?
            .to_ascii_lowercase();

        let extension = match subtype.as_str() {
            "jpeg" => String::from("jpg"),
            _ => subtype,
        };
        if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(invalid("unsupported image type"));
        }

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| ValidationError::InvalidImage(format!("{e}")))?;
        if bytes.is_empty() {
            return Err(invalid("empty image"));
        }

        Ok(Self { extension, bytes })
    }
}

/// Accepts image payloads and hands back an opaque reference to keep on the recipe.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, image: &Base64Image) -> Result<String, ServiceError>;
}

/// Writes images under `<root>/recipes/images` with random file names.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.media_root)
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn store(&self, image: &Base64Image) -> Result<String, ServiceError> {
        let dir = self.root.join(IMAGES_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), image.extension);
        tokio::fs::write(dir.join(&file_name), &image.bytes).await?;

        log::debug!("Stored image {file_name} ({} bytes)", image.bytes.len());

        Ok(format!("{IMAGES_DIR}/{file_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent gif
    const GIF: &str = "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

    #[test]
    fn parses_data_uri() {
        let image = Base64Image::parse(GIF).unwrap();
        assert_eq!(image.extension, "gif");
        assert_eq!(&image.bytes[..3], b"GIF");

        let image = Base64Image::parse("data:image/JPEG;base64,AAEC").unwrap();
        assert_eq!(image.extension, "jpg");
        assert_eq!(image.bytes, vec![0, 1, 2]);
    }

    #[test]
    fn rejects_malformed_payloads() {
        for data in [
            "",
            "R0lGODlhAQABAIAAAAAAAP",
            "data:text/plain;base64,AAEC",
            "data:image/tiff;base64,AAEC",
            "data:image/png;base64,***",
            "data:image/png;base64,",
        ] {
            let err = Base64Image::parse(data).unwrap_err();
            assert_eq!(err.field(), "image", "{data}");
        }
    }

    #[tokio::test]
    async fn local_store_writes_under_images_dir() {
        let root = std::env::temp_dir().join(format!("foodgram-media-{}", Uuid::new_v4()));
        let store = LocalImageStore::new(&root);

        let image = Base64Image::parse(GIF).unwrap();
        let reference = store.store(&image).await.unwrap();

        assert!(reference.starts_with("recipes/images/"));
        assert!(reference.ends_with(".gif"));
        let written = tokio::fs::read(root.join(&reference)).await.unwrap();
        assert_eq!(written, image.bytes);

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn configured_store_writes_under_media_root() {
        let root = std::env::temp_dir().join(format!("foodgram-config-{}", Uuid::new_v4()));
        let config = Config {
            dev_mode: true,
            database_url: String::new(),
            database_max_connections: 1,
            jwt_secret: String::from("secret"),
            session_lifetime_hours: 1,
            short_link_base_url: String::new(),
            media_root: root.to_string_lossy().into_owned(),
        };

        let store = LocalImageStore::from_config(&config);
        let reference = store.store(&Base64Image::parse(GIF).unwrap()).await.unwrap();

        assert!(root.join(&reference).exists());
        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
