//! Print the OpenAPI document as pretty JSON.
//!
//! Usage: `cargo run -p keel-api --bin generate-openapi > openapi.json`

use keel_api::ApiDoc;
use utoipa::OpenApi;

fn main() {
    match serde_json::to_string_pretty(&ApiDoc::openapi()) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
}
