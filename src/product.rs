use crate::error::ApiError;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// MIME types accepted for product images
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// A persisted product record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Store-generated identifier
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Price in minor currency units (cents)
    pub price: i64,
    /// Ordered images, at least one, each with a resolved URL
    pub images: Vec<ProductImage>,
    pub created_at: DateTime<Utc>,
}

/// A stored image belonging to a product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductImage {
    /// Public URL of the stored object
    pub url: String,
    pub content_type: String,
    /// Key of the object in the bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
}

/// Create-product request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Price in minor currency units
    pub price: i64,
    pub images: Vec<ImageUpload>,
}

/// An image submitted for upload, base64-encoded for transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUpload {
    /// MIME type, e.g. `image/jpeg`
    #[serde(rename = "type")]
    pub content_type: String,
    /// Base64-encoded image bytes
    pub data: String,
}

impl ImageUpload {
    /// Decode the base64 payload into raw bytes
    pub fn decode(&self) -> Result<Vec<u8>, ApiError> {
        STANDARD
            .decode(self.data.trim())
            .map_err(|e| ApiError::Validation(format!("invalid base64 image data: {e}")))
    }
}

impl CreateProductRequest {
    /// Validate the request before any storage or database I/O
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("name must not be empty".into()));
        }
        if self.price < 0 {
            return Err(ApiError::Validation("price must not be negative".into()));
        }
        if self.images.is_empty() {
            return Err(ApiError::Validation(
                "at least one image is required".into(),
            ));
        }
        for image in &self.images {
            if !ALLOWED_IMAGE_TYPES.contains(&image.content_type.as_str()) {
                return Err(ApiError::Validation(format!(
                    "unsupported image type: {}",
                    image.content_type
                )));
            }
            if image.data.trim().is_empty() {
                return Err(ApiError::Validation("image data must not be empty".into()));
            }
        }
        Ok(())
    }
}

/// File extension for an allowed image MIME type
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpeg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateProductRequest {
        CreateProductRequest {
            name: "Ruck Snack".to_string(),
            description: "Trail mix for long carries".to_string(),
            price: 220000,
            images: vec![ImageUpload {
                content_type: "image/jpeg".to_string(),
                data: STANDARD.encode(b"\xff\xd8\xff\xe0 fake jpeg"),
            }],
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut req = valid_request();
        req.name = "   ".to_string();
        assert!(matches!(req.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut req = valid_request();
        req.price = -1;
        assert!(matches!(req.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_zero_price_allowed() {
        let mut req = valid_request();
        req.price = 0;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_missing_images_rejected() {
        let mut req = valid_request();
        req.images.clear();
        assert!(matches!(req.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_unsupported_type_rejected() {
        let mut req = valid_request();
        req.images[0].content_type = "image/tiff".to_string();
        assert!(matches!(req.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_decode_roundtrip() {
        let upload = ImageUpload {
            content_type: "image/png".to_string(),
            data: STANDARD.encode(b"png bytes"),
        };
        assert_eq!(upload.decode().unwrap(), b"png bytes");
    }

    #[test]
    fn test_decode_invalid_base64() {
        let upload = ImageUpload {
            content_type: "image/png".to_string(),
            data: "not!!base64%%".to_string(),
        };
        assert!(matches!(upload.decode(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_request_wire_shape() {
        let json = serde_json::json!({
            "name": "Ruck Snack",
            "description": "desc",
            "price": 220000,
            "images": [{"type": "image/jpeg", "data": "aGVsbG8="}]
        });
        let req: CreateProductRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.price, 220000);
        assert_eq!(req.images[0].content_type, "image/jpeg");
    }

    #[test]
    fn test_non_numeric_price_fails_deserialization() {
        let json = serde_json::json!({
            "name": "x",
            "price": "twenty",
            "images": []
        });
        assert!(serde_json::from_value::<CreateProductRequest>(json).is_err());
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpeg"), "jpeg");
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("application/pdf"), "bin");
    }
}
