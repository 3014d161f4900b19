//! Command implementations for the docxcite CLI
//!
//! Each command module handles the CLI interface and delegates to
//! docxcite-core for the actual work.

use anyhow::{Context, Result};

use docxcite_core::StyleInfo;

pub mod config;
pub mod process;

/// Read a CSL style from a local path or an http(s) URL.
pub async fn load_style(location: &str) -> Result<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let response = reqwest::get(location)
            .await
            .with_context(|| format!("Failed to fetch style {}", location))?
            .error_for_status()
            .with_context(|| format!("Failed to fetch style {}", location))?;
        return response
            .text()
            .await
            .with_context(|| format!("Failed to read style {}", location));
    }
    std::fs::read_to_string(location).with_context(|| format!("Failed to read style {}", location))
}

/// One-line style status: `Using <title>`, `not valid CSL` or `No CSL file`.
pub async fn style_status(location: Option<&str>) -> String {
    let Some(location) = location else {
        return "No CSL file".to_string();
    };
    match load_style(location).await {
        Ok(csl) => match StyleInfo::parse(&csl) {
            Ok(info) => info.status(),
            Err(_) => "not valid CSL".to_string(),
        },
        Err(error) => format!("{:#}", error),
    }
}
