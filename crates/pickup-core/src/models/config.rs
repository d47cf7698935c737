//! Configuration structures for the intake pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the pickup pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PickupConfig {
    /// Upload admission and storage configuration.
    pub intake: IntakeConfig,

    /// Extraction configuration.
    pub extraction: ExtractionConfig,

    /// OCR model configuration.
    pub ocr: OcrConfig,
}

/// Admission limits and storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Maximum size of a single file in bytes.
    pub max_file_size: u64,

    /// Maximum number of files accepted in one request.
    pub max_files_per_batch: usize,

    /// MIME types accepted by the image profile.
    pub image_mime_types: Vec<String>,

    /// MIME types accepted by the document profile.
    pub document_mime_types: Vec<String>,

    /// Directory uploads are written to.
    pub storage_root: PathBuf,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024,
            max_files_per_batch: 10,
            image_mime_types: vec![
                "image/jpeg".to_string(),
                "image/jpg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
            document_mime_types: vec!["application/pdf".to_string()],
            storage_root: PathBuf::from("uploads"),
        }
    }
}

/// Extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Per-document time budget in seconds.
    pub timeout_secs: u64,

    /// Records below this confidence (0 - 100) are flagged for review.
    pub review_threshold: f32,

    /// Confidence attached to records whose recognition quality is unknown.
    pub fallback_confidence: f32,

    /// Prefix of synthesized order numbers.
    pub placeholder_prefix: String,

    /// Minimum embedded text length to trust the PDF text layer.
    pub min_text_length: usize,

    /// Try the embedded text layer before OCR.
    pub prefer_embedded_text: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            review_threshold: 80.0,
            fallback_confidence: 75.0,
            placeholder_prefix: "PO-AUTO".to_string(),
            min_text_length: 20,
            prefer_embedded_text: true,
        }
    }
}

/// OCR model file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Keep `[UNK]` tokens in recognized text instead of blanking them.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            keep_unk: false,
        }
    }
}

impl OcrConfig {
    /// Whether every model file is present on disk.
    pub fn models_present(&self) -> bool {
        [&self.detection_model, &self.recognition_model, &self.dictionary]
            .iter()
            .all(|name| self.model_dir.join(name).exists())
    }
}

impl PickupConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = PickupConfig::default();
        assert_eq!(config.intake.max_file_size, 5_242_880);
        assert_eq!(config.intake.max_files_per_batch, 10);
        assert_eq!(config.intake.document_mime_types, vec!["application/pdf"]);
        assert_eq!(config.extraction.fallback_confidence, 75.0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PickupConfig =
            serde_json::from_str(r#"{"intake": {"max_files_per_batch": 3}}"#).unwrap();
        assert_eq!(config.intake.max_files_per_batch, 3);
        assert_eq!(config.intake.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.extraction.timeout_secs, 60);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = PickupConfig::default();
        config.intake.storage_root = PathBuf::from("/srv/uploads");
        config.save(&path).unwrap();

        let loaded = PickupConfig::from_file(&path).unwrap();
        assert_eq!(loaded.intake.storage_root, PathBuf::from("/srv/uploads"));
    }
}
