//! Rule-based pickup order parser over recognized text.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::models::order::Party;

use super::rules::{
    extract_dates, extract_quantities, labeled_value, ExtractionMatch, BASIN_CODE,
    BASIN_DESCRIPTION, EMAIL, FLOW_TYPE, ORDER_NUMBER, PARTY_ADDRESS, PARTY_CITY, PARTY_NAME,
    RECIPIENT_SECTION, SENDER_SECTION,
};

/// Party block with per-field confidence.
#[derive(Debug, Clone, Default)]
pub struct ParsedParty {
    pub name: Option<ExtractionMatch<String>>,
    pub address: Option<ExtractionMatch<String>>,
    pub city: Option<ExtractionMatch<String>>,
    pub email: Option<ExtractionMatch<String>>,
}

impl ParsedParty {
    pub fn into_party(self) -> Party {
        Party {
            name: self.name.map(|m| m.value),
            address: self.address.map(|m| m.value),
            city: self.city.map(|m| m.value),
            email: self.email.map(|m| m.value),
        }
    }
}

/// Every field the parser could locate, each with its own confidence.
#[derive(Debug, Clone, Default)]
pub struct ParsedOrder {
    pub order_number: Option<ExtractionMatch<String>>,
    pub issue_date: Option<ExtractionMatch<NaiveDate>>,
    pub scheduled_date: Option<ExtractionMatch<NaiveDate>>,
    pub sender: ParsedParty,
    pub recipient: ParsedParty,
    pub basin_code: Option<ExtractionMatch<String>>,
    pub basin_description: Option<ExtractionMatch<String>>,
    pub flow_type: Option<ExtractionMatch<String>>,
    pub distance_km: Option<ExtractionMatch<Decimal>>,
    pub expected_quantity: Option<ExtractionMatch<Decimal>>,
    pub availability_date: Option<ExtractionMatch<NaiveDate>>,
    pub shipping_request_date: Option<ExtractionMatch<NaiveDate>>,
}

impl ParsedOrder {
    /// `(field name, required, confidence)` for every field; missing fields
    /// report `None`.
    pub fn field_confidences(&self) -> Vec<(&'static str, bool, Option<f32>)> {
        fn c<T>(m: &Option<ExtractionMatch<T>>) -> Option<f32> {
            m.as_ref().map(|m| m.confidence)
        }

        vec![
            ("orderNumber", true, c(&self.order_number)),
            ("issueDate", true, c(&self.issue_date)),
            ("senderName", true, c(&self.sender.name)),
            ("recipientName", true, c(&self.recipient.name)),
            ("basinCode", true, c(&self.basin_code)),
            ("scheduledDate", false, c(&self.scheduled_date)),
            ("senderAddress", false, c(&self.sender.address)),
            ("senderCity", false, c(&self.sender.city)),
            ("senderEmail", false, c(&self.sender.email)),
            ("recipientAddress", false, c(&self.recipient.address)),
            ("recipientCity", false, c(&self.recipient.city)),
            ("recipientEmail", false, c(&self.recipient.email)),
            ("basinDescription", false, c(&self.basin_description)),
            ("flowType", false, c(&self.flow_type)),
            ("distanceKm", false, c(&self.distance_km)),
            ("expectedQuantity", false, c(&self.expected_quantity)),
            ("availabilityDate", false, c(&self.availability_date)),
            ("shippingRequestDate", false, c(&self.shipping_request_date)),
        ]
    }
}

/// Parser for pickup order text.
#[derive(Debug, Clone, Default)]
pub struct PickupOrderParser;

impl PickupOrderParser {
    pub fn new() -> Self {
        Self
    }

    /// Locate every known field in `text`.
    pub fn parse(&self, text: &str) -> ParsedOrder {
        debug!("Parsing pickup order from {} characters of text", text.len());

        let dates = extract_dates(text);
        let quantities = extract_quantities(text);
        let (sender, recipient) = self.extract_parties(text);

        ParsedOrder {
            order_number: self.extract_order_number(text),
            issue_date: dates.issue_date,
            scheduled_date: dates.scheduled_date,
            sender,
            recipient,
            basin_code: labeled_value(&BASIN_CODE, text),
            basin_description: labeled_value(&BASIN_DESCRIPTION, text),
            flow_type: labeled_value(&FLOW_TYPE, text),
            distance_km: quantities.distance_km,
            expected_quantity: quantities.expected_quantity,
            availability_date: dates.availability_date,
            shipping_request_date: dates.shipping_request_date,
        }
    }

    fn extract_order_number(&self, text: &str) -> Option<ExtractionMatch<String>> {
        let caps = ORDER_NUMBER.captures(text)?;
        let group = caps.get(1)?;
        let value = group.as_str().trim_end_matches(['.', '-', '_', '/']);
        if value.is_empty() {
            return None;
        }
        Some(
            ExtractionMatch::new(value.to_string(), 0.95, value)
                .with_position(group.start(), group.start() + value.len()),
        )
    }

    fn extract_parties(&self, text: &str) -> (ParsedParty, ParsedParty) {
        let sender_pos = SENDER_SECTION.find(text).map(|m| (m.start(), m.end()));
        let recipient_pos = RECIPIENT_SECTION.find(text).map(|m| (m.start(), m.end()));

        let sender_text = section_body(text, sender_pos, recipient_pos);
        let recipient_text = section_body(text, recipient_pos, sender_pos);

        (self.parse_party(sender_text), self.parse_party(recipient_text))
    }

    fn parse_party(&self, block: &str) -> ParsedParty {
        if block.trim().is_empty() {
            return ParsedParty::default();
        }

        let mut party = ParsedParty {
            name: labeled_value(&PARTY_NAME, block),
            address: labeled_value(&PARTY_ADDRESS, block),
            city: labeled_value(&PARTY_CITY, block),
            email: EMAIL.find(block).map(|m| {
                ExtractionMatch::new(m.as_str().to_string(), 0.95, m.as_str())
                    .with_position(m.start(), m.end())
            }),
        };

        // Unlabeled layout: name on the header line or the first line after it,
        // followed by street and city lines.
        let free_lines: Vec<&str> = block
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .filter(|l| !l.contains(':') && !EMAIL.is_match(l))
            .collect();

        let mut free = free_lines.into_iter();
        if party.name.is_none() {
            party.name = free
                .next()
                .map(|l| ExtractionMatch::new(l.to_string(), 0.7, l));
        }
        if party.address.is_none() {
            party.address = free
                .next()
                .map(|l| ExtractionMatch::new(l.to_string(), 0.6, l));
        }
        if party.city.is_none() {
            party.city = free
                .next()
                .map(|l| ExtractionMatch::new(l.to_string(), 0.6, l));
        }

        party
    }
}

/// Text of a party section: from its header to the other header or the
/// first blank line after the section's content, whichever comes first.
/// Blank lines directly under the header are skipped.
fn section_body(
    text: &str,
    own: Option<(usize, usize)>,
    other: Option<(usize, usize)>,
) -> &str {
    let Some((_, body_start)) = own else {
        return "";
    };

    let end = match other {
        Some((other_start, _)) if other_start > body_start => other_start,
        _ => text.len(),
    };
    let body = &text[body_start..end];

    let mut start = None;
    let mut stop = body.len();
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let blank = line.trim().is_empty();
        match start {
            None if !blank => start = Some(offset),
            Some(_) if blank => {
                stop = offset;
                break;
            }
            _ => {}
        }
        offset += line.len();
    }

    match start {
        Some(start) => body[start..stop].trim_start_matches([' ', '\t']),
        None => "",
    }
}
