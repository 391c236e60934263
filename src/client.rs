//! Submission client for the catalog API.
//!
//! Stands in for the browser form: reads an image file, base64-encodes
//! it, and issues a single create request. One file read, then one
//! network call, sequenced; no retries.

use crate::product::{CreateProductRequest, ImageUpload, Product, ALLOWED_IMAGE_TYPES};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Errors surfaced by the submission client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid submission: {0}")]
    Invalid(String),

    #[error("failed to read image file: {0}")]
    Io(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server rejected the request with status {0}")]
    Api(u16),
}

/// A product submission, the client-side analogue of the create form
#[derive(Debug, Clone)]
pub struct Submission {
    pub name: String,
    pub description: String,
    /// Price in minor currency units
    pub price: i64,
    /// Path to the image file to upload
    pub image_path: String,
}

/// HTTP client for the catalog API
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Submit a new product: read the image, encode it, post the payload
    pub async fn create_product(&self, submission: &Submission) -> Result<Product, ClientError> {
        if submission.name.trim().is_empty() {
            return Err(ClientError::Invalid("name must not be empty".into()));
        }
        if submission.price < 0 {
            return Err(ClientError::Invalid("price must not be negative".into()));
        }

        // File read completes before the upload begins
        let bytes = tokio::fs::read(&submission.image_path).await?;
        let (content_type, data) = transport_payload(&submission.image_path, &bytes)?;

        debug!(
            image = %submission.image_path,
            size_bytes = bytes.len(),
            "image encoded for upload"
        );

        let request = CreateProductRequest {
            name: submission.name.clone(),
            description: submission.description.clone(),
            price: submission.price,
            images: vec![ImageUpload { content_type, data }],
        };

        let response = self
            .http
            .post(format!("{}/products", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Api(response.status().as_u16()));
        }

        let product: Product = response.json().await?;
        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Fetch all products
    pub async fn list_products(&self) -> Result<Vec<Product>, ClientError> {
        let response = self
            .http
            .get(format!("{}/products", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Api(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }

    /// Fetch one product by identifier
    pub async fn retrieve_product(&self, id: Uuid) -> Result<Product, ClientError> {
        let response = self
            .http
            .get(format!("{}/products/{}", self.base_url, id))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Api(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }
}

/// Build the transport payload for an image file. Raw image bytes are
/// base64-encoded; a file already holding a data URL (the form a browser
/// file reader produces) is passed through with its prefix stripped and
/// its MIME type taken from the URL itself.
pub fn transport_payload(path: &str, bytes: &[u8]) -> Result<(String, String), ClientError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        let trimmed = text.trim();
        if trimmed.starts_with("data:") {
            let content_type = data_url_content_type(trimmed)
                .ok_or_else(|| ClientError::Invalid(format!("unsupported data URL in {path}")))?;
            return Ok((
                content_type.to_string(),
                strip_data_url_prefix(trimmed).to_string(),
            ));
        }
    }
    let content_type = content_type_for_path(path)
        .ok_or_else(|| ClientError::Invalid(format!("unsupported image file: {path}")))?;
    Ok((content_type.to_string(), encode_image(bytes)))
}

/// Encode image bytes as a base64 transport payload
pub fn encode_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Strip a `data:image/...;base64,` prefix from an already-encoded
/// payload, the form a browser file reader produces
pub fn strip_data_url_prefix(payload: &str) -> &str {
    if payload.starts_with("data:") {
        if let Some(idx) = payload.find(";base64,") {
            return &payload[idx + ";base64,".len()..];
        }
    }
    payload
}

/// MIME type declared by a `data:<type>;base64,` URL, accepted only for
/// the allowed image types
pub fn data_url_content_type(payload: &str) -> Option<&str> {
    let rest = payload.strip_prefix("data:")?;
    let (content_type, _) = rest.split_once(";base64,")?;
    ALLOWED_IMAGE_TYPES
        .contains(&content_type)
        .then_some(content_type)
}

/// MIME type for an image file path, by extension
pub fn content_type_for_path(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_image() {
        assert_eq!(encode_image(b"hello"), "aGVsbG8=");
    }

    #[test]
    fn test_strip_data_url_prefix() {
        assert_eq!(
            strip_data_url_prefix("data:image/jpeg;base64,aGVsbG8="),
            "aGVsbG8="
        );
        assert_eq!(
            strip_data_url_prefix("data:image/png;base64,aGVsbG8="),
            "aGVsbG8="
        );
        // Already-bare payloads pass through untouched
        assert_eq!(strip_data_url_prefix("aGVsbG8="), "aGVsbG8=");
    }

    #[test]
    fn test_content_type_for_path() {
        assert_eq!(content_type_for_path("snack.jpg"), Some("image/jpeg"));
        assert_eq!(content_type_for_path("SNACK.JPEG"), Some("image/jpeg"));
        assert_eq!(content_type_for_path("photo.png"), Some("image/png"));
        assert_eq!(content_type_for_path("doc.pdf"), None);
        assert_eq!(content_type_for_path("noext"), None);
    }

    #[test]
    fn test_transport_payload_raw_bytes() {
        let (content_type, data) =
            transport_payload("snack.jpg", b"\xff\xd8\xff\xe0 fake jpeg").unwrap();
        assert_eq!(content_type, "image/jpeg");
        assert_eq!(data, STANDARD.encode(b"\xff\xd8\xff\xe0 fake jpeg"));
    }

    #[test]
    fn test_transport_payload_data_url_file() {
        let (content_type, data) =
            transport_payload("capture.b64", b"data:image/png;base64,aGVsbG8=\n").unwrap();
        assert_eq!(content_type, "image/png");
        assert_eq!(data, "aGVsbG8=");
    }

    #[test]
    fn test_transport_payload_rejects_unknown_file() {
        assert!(matches!(
            transport_payload("doc.pdf", b"%PDF-1.4"),
            Err(ClientError::Invalid(_))
        ));
    }

    #[test]
    fn test_transport_payload_rejects_non_image_data_url() {
        assert!(matches!(
            transport_payload("blob.b64", b"data:text/plain;base64,aGVsbG8="),
            Err(ClientError::Invalid(_))
        ));
    }

    #[test]
    fn test_data_url_content_type() {
        assert_eq!(
            data_url_content_type("data:image/jpeg;base64,aGVsbG8="),
            Some("image/jpeg")
        );
        assert_eq!(data_url_content_type("data:text/plain;base64,aGVsbG8="), None);
        assert_eq!(data_url_content_type("aGVsbG8="), None);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ApiClient::new("http://localhost:8080/");
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
