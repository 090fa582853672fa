//! services/board/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the board's REST intents. The output path is
//! the first argument, `openapi.json` when none is given.

use board_lib::web::rest::ApiDoc;
use std::path::{Path, PathBuf};
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

/// Paths every generated document must describe.
const BOARD_PATHS: [&str; 4] = ["/board", "/notes", "/notes/{id}/like", "/thread"];

fn write_document(
    api_doc: &utoipa::openapi::OpenApi,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(missing) = BOARD_PATHS
        .iter()
        .find(|p| !api_doc.paths.paths.contains_key(**p))
    {
        return Err(format!("OpenAPI document is missing {}", missing).into());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, api_doc.to_pretty_json()?)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    write_document(&ApiDoc::openapi(), &output)?;
    println!("Board OpenAPI document written to {}", output.display());
    Ok(())
}
