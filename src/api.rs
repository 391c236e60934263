use crate::config::HttpConfig;
use crate::error::ApiError;
use crate::object_store::ImageStore;
use crate::product::{CreateProductRequest, Product};
use crate::product_store::{NewImage, ProductRepository};
use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub object_store: Arc<dyn ImageStore>,
    pub product_store: Arc<dyn ProductRepository>,
}

/// Query parameters for the product list
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum results; unset returns everything
    pub limit: Option<i64>,
    /// Offset for pagination
    pub offset: Option<i64>,
}

impl ListQuery {
    /// Negative bounds are bad input, not a store failure
    fn validate(&self) -> Result<(), ApiError> {
        if self.limit.is_some_and(|l| l < 0) {
            return Err(ApiError::Validation("limit must not be negative".into()));
        }
        if self.offset.is_some_and(|o| o < 0) {
            return Err(ApiError::Validation("offset must not be negative".into()));
        }
        Ok(())
    }
}

/// Create the API router
pub fn create_router(state: AppState, config: &HttpConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", get(get_product))
        .layer(TraceLayer::new_for_http());

    if config.cors_enabled {
        router = router.layer(cors_layer(config));
    }

    router.with_state(state)
}

/// CORS layer allowing credentialed requests from any origin. The
/// wildcard form is illegal with credentials, so the request origin and
/// headers are mirrored instead.
fn cors_layer(config: &HttpConfig) -> CorsLayer {
    let origin = if config.cors_origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "catalog-service"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.product_store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected",
                "error": e
            })),
        ),
    }
}

/// Create a product: validate, upload images, persist the record
#[instrument(skip(state, payload))]
async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    // Decode every payload up front so a bad image fails the whole
    // submission before any byte reaches the bucket
    let mut decoded = Vec::with_capacity(request.images.len());
    for image in &request.images {
        decoded.push((image.content_type.clone(), image.decode()?));
    }

    let mut stored = Vec::with_capacity(decoded.len());
    for (content_type, bytes) in decoded {
        let object = state.object_store.upload_image(&content_type, bytes).await?;
        stored.push(NewImage {
            url: object.url,
            content_type,
            object_key: object.key,
            size_bytes: object.size_bytes,
        });
    }

    let persisted = state
        .product_store
        .insert_product(
            &request.name,
            &request.description,
            request.price,
            &stored,
        )
        .await;

    let product = match persisted {
        Ok(product) => product,
        Err(e) => {
            // Uploaded objects are not removed on a failed write; flag
            // the orphans so they can be cleaned up out of band
            let orphans: Vec<&str> = stored.iter().map(|i| i.object_key.as_str()).collect();
            warn!(orphaned_keys = ?orphans, "database write failed after upload");
            return Err(e);
        }
    };

    info!(product_id = %product.id, "product created");

    Ok((StatusCode::CREATED, Json(product)))
}

/// List all products in creation order
#[instrument(skip(state))]
async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    params.validate()?;
    let products = state.product_store.list(params.limit, params.offset).await?;
    Ok(Json(products))
}

/// Get a single product by identifier
#[instrument(skip(state))]
async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    match state.product_store.get(id).await? {
        Some(product) => Ok(Json(product)),
        None => Err(ApiError::NotFound(format!("no product with id {id}"))),
    }
}

/// Start the HTTP API server
pub async fn start_api_server(state: AppState, config: &HttpConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting catalog API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::StoredObject;
    use crate::product::ImageUpload;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Image store fake that counts uploads instead of talking to S3
    struct FakeImageStore {
        uploads: AtomicUsize,
    }

    impl FakeImageStore {
        fn new() -> Self {
            Self {
                uploads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageStore for FakeImageStore {
        async fn upload_image(
            &self,
            content_type: &str,
            bytes: Vec<u8>,
        ) -> Result<StoredObject, ApiError> {
            let n = self.uploads.fetch_add(1, Ordering::SeqCst);
            let ext = crate::product::extension_for(content_type);
            let key = format!("products/2024-01-15/{n}.{ext}");
            Ok(StoredObject {
                url: format!("https://product-images.s3.us-east-1.amazonaws.com/{key}"),
                key,
                size_bytes: bytes.len() as i64,
            })
        }
    }

    /// In-memory repository fake preserving insertion order
    struct FakeRepository {
        products: Mutex<Vec<Product>>,
        writes: AtomicUsize,
    }

    impl FakeRepository {
        fn new() -> Self {
            Self {
                products: Mutex::new(Vec::new()),
                writes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProductRepository for FakeRepository {
        async fn insert_product(
            &self,
            name: &str,
            description: &str,
            price: i64,
            images: &[NewImage],
        ) -> Result<Product, ApiError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let product = Product {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: description.to_string(),
                price,
                images: images
                    .iter()
                    .map(|i| crate::product::ProductImage {
                        url: i.url.clone(),
                        content_type: i.content_type.clone(),
                        object_key: Some(i.object_key.clone()),
                        size_bytes: Some(i.size_bytes),
                    })
                    .collect(),
                created_at: Utc::now(),
            };
            self.products.lock().unwrap().push(product.clone());
            Ok(product)
        }

        async fn get(&self, id: Uuid) -> Result<Option<Product>, ApiError> {
            Ok(self
                .products
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.id == id)
                .cloned())
        }

        async fn list(
            &self,
            limit: Option<i64>,
            offset: Option<i64>,
        ) -> Result<Vec<Product>, ApiError> {
            let products = self.products.lock().unwrap();
            let offset = offset.unwrap_or(0) as usize;
            let limit = limit.unwrap_or(i64::MAX) as usize;
            Ok(products.iter().skip(offset).take(limit).cloned().collect())
        }

        async fn ping(&self) -> Result<(), String> {
            Ok(())
        }
    }

    fn test_state() -> (AppState, Arc<FakeImageStore>, Arc<FakeRepository>) {
        let object_store = Arc::new(FakeImageStore::new());
        let product_store = Arc::new(FakeRepository::new());
        let state = AppState {
            object_store: object_store.clone(),
            product_store: product_store.clone(),
        };
        (state, object_store, product_store)
    }

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

    #[tokio::test]
    async fn test_create_without_images_performs_no_io() {
        let (state, object_store, product_store) = test_state();
        let mut request = valid_request();
        request.images.clear();

        let result = create_product(State(state), Ok(Json(request))).await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert_eq!(object_store.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(product_store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_with_bad_base64_performs_no_io() {
        let (state, object_store, product_store) = test_state();
        let mut request = valid_request();
        request.images[0].data = "not!!base64%%".to_string();

        let result = create_product(State(state), Ok(Json(request))).await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert_eq!(object_store.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(product_store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let (state, _, _) = test_state();

        let (status, Json(created)) = create_product(State(state.clone()), Ok(Json(valid_request())))
            .await
            .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.price, 220000);
        assert!(created.images[0]
            .url
            .starts_with("https://product-images.s3.us-east-1.amazonaws.com/products/"));

        let Json(fetched) = get_product(State(state), Path(created.id)).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.price, 220000);
    }

    #[tokio::test]
    async fn test_list_returns_each_product_once_in_creation_order() {
        let (state, _, _) = test_state();

        let mut first = valid_request();
        first.name = "First".to_string();
        let mut second = valid_request();
        second.name = "Second".to_string();

        let (_, Json(first)) = create_product(State(state.clone()), Ok(Json(first)))
            .await
            .unwrap();
        let (_, Json(second)) = create_product(State(state.clone()), Ok(Json(second)))
            .await
            .unwrap();

        let query = ListQuery {
            limit: None,
            offset: None,
        };
        let Json(products) = list_products(State(state), Query(query)).await.unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, first.id);
        assert_eq!(products[1].id, second.id);
    }

    #[tokio::test]
    async fn test_get_unknown_id_returns_not_found() {
        let (state, _, _) = test_state();
        let result = get_product(State(state), Path(Uuid::new_v4())).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_negative_limit_rejected_before_store() {
        let (state, _, _) = test_state();
        let query = ListQuery {
            limit: Some(-1),
            offset: None,
        };
        let result = list_products(State(state), Query(query)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_list_query_rejects_negative_bounds() {
        let negative_limit = ListQuery {
            limit: Some(-1),
            offset: None,
        };
        assert!(negative_limit.validate().is_err());

        let negative_offset = ListQuery {
            limit: None,
            offset: Some(-5),
        };
        assert!(negative_offset.validate().is_err());

        let valid = ListQuery {
            limit: Some(0),
            offset: Some(0),
        };
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn test_list_query_defaults() {
        let query: ListQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(query.limit.is_none());
        assert!(query.offset.is_none());
    }

    #[test]
    fn test_list_query_pagination() {
        let query: ListQuery =
            serde_json::from_value(serde_json::json!({"limit": 20, "offset": 40})).unwrap();
        assert_eq!(query.limit, Some(20));
        assert_eq!(query.offset, Some(40));
    }

    #[test]
    fn test_cors_layer_builds_with_origin_list() {
        let config = HttpConfig {
            cors_origins: vec!["https://shop.example.com".to_string()],
            ..Default::default()
        };
        // Must not panic: credentials with listed origins is legal
        let _ = cors_layer(&config);
    }

    #[test]
    fn test_cors_layer_builds_with_mirrored_origin() {
        // Must not panic: mirror-request avoids the wildcard+credentials
        // combination tower-http rejects
        let _ = cors_layer(&HttpConfig::default());
    }
}
