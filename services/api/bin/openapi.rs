//! Writes the OpenAPI document for the relay's HTTP surface.
//!
//! The output path is the first argument, then `OPENAPI_OUT`, then
//! `openapi.json` in the working directory.

use anyhow::Context;
use callrelay_api::router::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

fn output_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("OPENAPI_OUT").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"))
}

fn main() -> anyhow::Result<()> {
    let path = output_path();
    let document = ApiDoc::openapi()
        .to_pretty_json()
        .context("Failed to serialize OpenAPI document")?;
    std::fs::write(&path, document)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
