//! PDF body access for the recognition backends.

mod extractor;

pub use extractor::PdfExtractor;

use crate::error::PdfError;
use image::DynamicImage;

/// Type of PDF content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfType {
    /// Contains an extractable text layer.
    Text,
    /// Contains only images (scanned document).
    Image,
    /// Contains both text and images.
    Hybrid,
    /// Empty or unreadable.
    Empty,
}

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF processing implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Analyze the PDF to determine its type.
    fn analyze(&self, min_text_length: usize) -> PdfType;

    /// Extract text from the entire PDF.
    fn extract_text(&self) -> Result<String>;

    /// Extract every decodable embedded image.
    fn extract_images(&self) -> Vec<DynamicImage>;
}
