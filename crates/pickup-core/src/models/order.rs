//! Pickup order record produced by extraction.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sentinel used for required text fields the engine could not read.
pub const UNKNOWN: &str = "UNKNOWN";

/// A structured, confidence-scored pickup order.
///
/// Required fields are always populated; when the engine cannot read one it
/// writes a placeholder and lists the field in `metadata.missing_fields`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedPickupOrder {
    /// Order number, or a synthesized unique placeholder.
    pub order_number: String,

    /// Date the order was issued.
    pub issue_date: NaiveDate,

    /// Planned pickup date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,

    /// Sender name.
    pub sender_name: String,

    /// Sender street address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_address: Option<String>,

    /// Sender city.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_city: Option<String>,

    /// Sender e-mail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_email: Option<String>,

    /// Recipient name.
    pub recipient_name: String,

    /// Recipient street address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_address: Option<String>,

    /// Recipient city.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_city: Option<String>,

    /// Recipient e-mail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,

    /// Collection basin code.
    pub basin_code: String,

    /// Collection basin description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basin_description: Option<String>,

    /// Flow type (material stream).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_type: Option<String>,

    /// Distance in kilometres.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<Decimal>,

    /// Expected quantity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_quantity: Option<Decimal>,

    /// Date the material is available for pickup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_date: Option<NaiveDate>,

    /// Date shipping was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_request_date: Option<NaiveDate>,

    /// Overall extraction confidence (0 - 100).
    pub confidence: f32,

    /// Extraction metadata.
    #[serde(default)]
    pub metadata: ExtractionMetadata,
}

/// Sender or recipient block as read from the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Party {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub email: Option<String>,
}

/// Metadata about the extraction process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    /// Recognition backend used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,

    /// Processing time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,

    /// Warnings encountered during extraction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Required or optional fields that could not be read.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,

    /// Field-level confidence scores (0.0 - 1.0).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub field_confidence: HashMap<String, f32>,
}

/// Names of the fields every record must carry.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "orderNumber",
    "issueDate",
    "senderName",
    "recipientName",
    "basinCode",
];

impl ExtractedPickupOrder {
    /// Whether a required field holds a placeholder rather than a read value.
    pub fn has_placeholders(&self) -> bool {
        REQUIRED_FIELDS
            .iter()
            .any(|f| self.metadata.missing_fields.iter().any(|m| m == f))
    }

    /// Whether the record must go through human review before use.
    pub fn needs_review(&self, threshold: f32) -> bool {
        self.confidence < threshold || self.has_placeholders()
    }

    /// Check field plausibility and return any issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for field in &self.metadata.missing_fields {
            if REQUIRED_FIELDS.contains(&field.as_str()) {
                issues.push(format!("Placeholder value for {}", field));
            }
        }

        if let Some(scheduled) = self.scheduled_date {
            if scheduled < self.issue_date {
                issues.push(format!(
                    "Scheduled date ({}) precedes issue date ({})",
                    scheduled, self.issue_date
                ));
            }
        }

        for (label, email) in [
            ("sender", &self.sender_email),
            ("recipient", &self.recipient_email),
        ] {
            if let Some(email) = email {
                if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
                    issues.push(format!("Malformed {} e-mail: {}", label, email));
                }
            }
        }

        if !(0.0..=100.0).contains(&self.confidence) {
            issues.push(format!("Confidence out of range: {}", self.confidence));
        }

        issues
    }
}
