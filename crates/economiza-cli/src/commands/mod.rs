pub mod batch;
pub mod bill;
pub mod config;
pub mod extract;

use std::path::Path;

use economiza_core::models::EconomizaConfig;

/// Load the config from `path`, else from the default location, else defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<EconomizaConfig> {
    if let Some(path) = path {
        return Ok(EconomizaConfig::from_file(Path::new(path))?);
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        Ok(EconomizaConfig::from_file(&default_path)?)
    } else {
        Ok(EconomizaConfig::default())
    }
}

/// Content type of a file, judged by its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        _ => "text/plain",
    }
}
