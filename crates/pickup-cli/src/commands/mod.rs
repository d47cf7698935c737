//! CLI subcommands.

pub mod check;
pub mod config;
pub mod ingest;

use std::path::{Path, PathBuf};

use pickup_core::intake::AdmissionProfile;
use pickup_core::models::config::PickupConfig;

/// Output format for extracted records.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

/// Admission profile selectable on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ProfileArg {
    /// PDF pickup orders
    Document,
    /// JPEG, PNG, or WebP photos
    Image,
}

impl From<ProfileArg> for AdmissionProfile {
    fn from(profile: ProfileArg) -> Self {
        match profile {
            ProfileArg::Document => AdmissionProfile::Document,
            ProfileArg::Image => AdmissionProfile::Image,
        }
    }
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pickup")
        .join("config.json")
}

/// Resolve the configuration file path from `--config` or the default.
pub fn config_path(explicit: Option<&str>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load configuration. An explicit path must exist; the default path falls
/// back to built-in defaults when absent.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<PickupConfig> {
    let path = config_path(explicit);
    if path.exists() {
        return PickupConfig::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e));
    }
    if explicit.is_some() {
        anyhow::bail!("Config file not found: {}", path.display());
    }
    Ok(PickupConfig::default())
}

/// MIME type implied by a file extension.
pub fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("order.PDF")), "application/pdf");
        assert_eq!(mime_for(Path::new("truck.jpeg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("notes.txt")), "application/octet-stream");
        assert_eq!(mime_for(Path::new("no_extension")), "application/octet-stream");
    }
}
