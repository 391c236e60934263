//! Catalog Service
//!
//! A small e-commerce product catalog: an HTTP API for creating, listing,
//! and retrieving products, backed by S3-compatible object storage for
//! uploaded images and PostgreSQL for product records. A command-line
//! submission client covers the create flow end to end.
//!
//! ## Architecture
//!
//! ```text
//! Submission CLI              S3 Bucket                 PostgreSQL
//! ┌──────────────┐           ┌──────────────┐          ┌────────────────┐
//! │ read file    │           │ products/    │          │ products       │
//! │ base64 encode│           │   {date}/    │          │ product_images │
//! └──────────────┘           │   {uuid}.ext │          └────────────────┘
//!        │                   └──────────────┘                 ▲
//!        │ POST /products            ▲                        │
//!        ▼                           │                        │
//! ┌──────────────┐           ┌──────────────┐          ┌──────────────┐
//! │ HTTP API     │──────────▶│ Object       │          │ Product      │
//! │ (axum)       │           │ Store        │          │ Store        │
//! └──────────────┘           └──────────────┘          └──────────────┘
//!        │                                                    ▲
//!        └────────────────────────────────────────────────────┘
//! ```
//!
//! The create flow validates the payload before any I/O, uploads each
//! image to the bucket, then persists the record in one transaction.
//! Uploaded objects are not removed when the database write fails; the
//! orphaned keys are logged for out-of-band cleanup.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod object_store;
pub mod product;
pub mod product_store;

pub use api::{create_router, AppState};
pub use client::{ApiClient, Submission};
pub use config::Config;
pub use error::ApiError;
pub use object_store::{ImageStore, ObjectStore, StoredObject};
pub use product::{CreateProductRequest, ImageUpload, Product, ProductImage};
pub use product_store::{NewImage, ProductRepository, ProductStore};
