//! Command-line submission client for the catalog API.
//!
//! Usage:
//!   catalog create <name> <price> <image-path> [description]
//!   catalog list
//!   catalog show <id>
//!
//! The API base URL is taken from CATALOG_API_URL (default
//! http://localhost:8080).

use anyhow::{bail, Context, Result};
use catalog_service::client::{ApiClient, Submission};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let base_url =
        std::env::var("CATALOG_API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let client = ApiClient::new(base_url);

    match args.first().map(String::as_str) {
        Some("create") => {
            if args.len() < 4 {
                usage();
            }
            let price: i64 = args[2]
                .parse()
                .context("price must be an integer in minor currency units")?;
            let submission = Submission {
                name: args[1].clone(),
                price,
                image_path: args[3].clone(),
                description: args.get(4).cloned().unwrap_or_default(),
            };

            match client.create_product(&submission).await {
                Ok(product) => {
                    println!("{}", serde_json::to_string_pretty(&product)?);
                }
                Err(e) => {
                    // Generic failure surface, matching the form behavior
                    eprintln!("error creating product");
                    bail!(e);
                }
            }
        }
        Some("list") => {
            let products = client.list_products().await?;
            println!("{}", serde_json::to_string_pretty(&products)?);
        }
        Some("show") => {
            if args.len() < 2 {
                usage();
            }
            let id: Uuid = args[1].parse().context("id must be a UUID")?;
            let product = client.retrieve_product(id).await?;
            println!("{}", serde_json::to_string_pretty(&product)?);
        }
        _ => usage(),
    }

    Ok(())
}

fn usage() -> ! {
    eprintln!("usage:");
    eprintln!("  catalog create <name> <price> <image-path> [description]");
    eprintln!("  catalog list");
    eprintln!("  catalog show <id>");
    std::process::exit(2);
}
