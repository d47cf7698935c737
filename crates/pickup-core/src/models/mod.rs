//! Data models and configuration.

pub mod config;
pub mod order;

pub use config::{ExtractionConfig, IntakeConfig, OcrConfig, PickupConfig};
pub use order::{ExtractedPickupOrder, ExtractionMetadata, Party, REQUIRED_FIELDS, UNKNOWN};
