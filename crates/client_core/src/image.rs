use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image file is empty")]
    Empty,
    #[error("failed to read image '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

/// Encodes raw image bytes as a `data:` URL. The mime type is guessed from
/// `file_name`'s extension.
pub fn image_data_url(bytes: &[u8], file_name: &str) -> Result<String, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    let mime_type = mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or(FALLBACK_MIME);
    Ok(format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)))
}

pub async fn load_image_data_url(path: impl AsRef<Path>) -> Result<String, ImageError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|source| ImageError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    image_data_url(&bytes, &file_name)
}
