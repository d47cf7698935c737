//! Rule-based field extractors for pickup orders.

pub mod dates;
pub mod patterns;
pub mod quantities;

pub use dates::{extract_dates, DateExtractor, OrderDates};
pub use quantities::{extract_quantities, parse_quantity, OrderQuantities};
pub use patterns::*;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// Extracted value with its confidence score.
#[derive(Debug, Clone)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Position in source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}

/// Return the first capture group of `pattern` in `text`, trimmed.
pub(crate) fn labeled_value(pattern: &regex::Regex, text: &str) -> Option<ExtractionMatch<String>> {
    let caps = pattern.captures(text)?;
    let group = caps.get(1)?;
    let value = group.as_str().trim().trim_end_matches([',', ';']).trim();
    if value.is_empty() {
        return None;
    }
    Some(
        ExtractionMatch::new(value.to_string(), 0.9, value)
            .with_position(group.start(), group.end()),
    )
}
