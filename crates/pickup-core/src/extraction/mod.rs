//! Pickup order extraction.
//!
//! A [`RecognitionBackend`] turns document bytes into text, the
//! [`PickupOrderParser`] locates fields in that text, and the
//! [`ExtractionEngine`] assembles a complete, confidence-scored record.

pub mod backend;
pub mod engine;
pub mod parser;
pub mod rules;

#[cfg(feature = "ocr")]
pub use backend::OcrBackend;
pub use backend::{
    BackendKind, BackendProvider, PdfTextBackend, Recognition, RecognitionBackend,
    RecognitionQuality, StandardProvider, UnverifiedBackend,
};
pub use engine::{aggregate_confidence, placeholder_order_number, ExtractionEngine};
pub use parser::{ParsedOrder, ParsedParty, PickupOrderParser};
