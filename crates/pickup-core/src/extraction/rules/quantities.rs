//! Distance and quantity extraction.

use rust_decimal::Decimal;

use super::patterns::{DISTANCE_KM, EXPECTED_QUANTITY};
use super::ExtractionMatch;

/// Parse a non-negative number written with a decimal comma or point.
///
/// A comma is always the decimal separator when present, with dots and
/// spaces treated as grouping. Without a comma, a single dot is the decimal
/// separator and repeated dots are grouping.
pub fn parse_quantity(s: &str) -> Option<Decimal> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace() && *c != '\u{00a0}').collect();
    if compact.is_empty() || compact.starts_with('-') {
        return None;
    }

    let normalized = if compact.contains(',') {
        compact.replace('.', "").replace(',', ".")
    } else if compact.matches('.').count() > 1 {
        compact.replace('.', "")
    } else {
        compact
    };

    normalized
        .parse::<Decimal>()
        .ok()
        .filter(|d| !d.is_sign_negative())
}

/// Distance and expected quantity found on a pickup order.
#[derive(Debug, Clone, Default)]
pub struct OrderQuantities {
    pub distance_km: Option<ExtractionMatch<Decimal>>,
    pub expected_quantity: Option<ExtractionMatch<Decimal>>,
}

/// Extract labeled distance and quantity values.
pub fn extract_quantities(text: &str) -> OrderQuantities {
    let find = |pattern: &regex::Regex| {
        let caps = pattern.captures(text)?;
        let raw = caps.get(1)?;
        parse_quantity(raw.as_str()).map(|v| {
            ExtractionMatch::new(v, 0.9, raw.as_str()).with_position(raw.start(), raw.end())
        })
    };

    OrderQuantities {
        distance_km: find(&*DISTANCE_KM),
        expected_quantity: find(&*EXPECTED_QUANTITY),
    }
}
