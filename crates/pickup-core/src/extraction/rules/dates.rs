//! Date extraction for pickup orders.

use chrono::NaiveDate;
use regex::Regex;

use super::patterns::{
    AVAILABILITY_DATE, DATE_DMY, DATE_ITALIAN_LONG, DATE_YMD, ISSUE_DATE, SCHEDULED_DATE,
    SHIPPING_REQUEST_DATE,
};
use super::{ExtractionMatch, FieldExtractor};

/// Date field extractor.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<Self::Output> = Vec::new();

        // YYYY-MM-DD first, so DD-MM-YY never grabs the tail of an ISO date
        for caps in DATE_YMD.captures_iter(text) {
            let year: i32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let day: u32 = caps[3].parse().unwrap_or(0);

            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                let m = caps.get(0).unwrap();
                results.push(
                    ExtractionMatch::new(date, 0.9, m.as_str())
                        .with_position(m.start(), m.end()),
                );
            }
        }

        // DD.MM.YYYY, DD/MM/YYYY, DD-MM-YYYY
        for caps in DATE_DMY.captures_iter(text) {
            let m = caps.get(0).unwrap();
            if overlaps(&results, m.start(), m.end()) {
                continue;
            }

            let day: u32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let year = parse_year(&caps[3]);

            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                results.push(
                    ExtractionMatch::new(date, 0.9, m.as_str())
                        .with_position(m.start(), m.end()),
                );
            }
        }

        // Italian long format: "15 marzo 2024"
        for caps in DATE_ITALIAN_LONG.captures_iter(text) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month = italian_month_to_number(&caps[2]);
            let year: i32 = caps[3].parse().unwrap_or(0);

            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                let m = caps.get(0).unwrap();
                results.push(
                    ExtractionMatch::new(date, 0.95, m.as_str())
                        .with_position(m.start(), m.end()),
                );
            }
        }

        results.sort_by_key(|r| r.position.map(|(start, _)| start).unwrap_or(usize::MAX));
        results
    }
}

/// Labeled dates found on a pickup order.
#[derive(Debug, Clone, Default)]
pub struct OrderDates {
    pub issue_date: Option<ExtractionMatch<NaiveDate>>,
    pub scheduled_date: Option<ExtractionMatch<NaiveDate>>,
    pub availability_date: Option<ExtractionMatch<NaiveDate>>,
    pub shipping_request_date: Option<ExtractionMatch<NaiveDate>>,
}

/// Extract all labeled dates from order text.
///
/// When no issue date is labeled, the first unlabeled date in the text is
/// used with reduced confidence.
pub fn extract_dates(text: &str) -> OrderDates {
    let extractor = DateExtractor::new();

    let mut result = OrderDates {
        issue_date: labeled_date(&extractor, &ISSUE_DATE, text),
        scheduled_date: labeled_date(&extractor, &SCHEDULED_DATE, text),
        availability_date: labeled_date(&extractor, &AVAILABILITY_DATE, text),
        shipping_request_date: labeled_date(&extractor, &SHIPPING_REQUEST_DATE, text),
    };

    if result.issue_date.is_none() {
        let labeled_values: Vec<NaiveDate> = [
            &result.scheduled_date,
            &result.availability_date,
            &result.shipping_request_date,
        ]
        .into_iter()
        .flatten()
        .map(|m| m.value)
        .collect();

        result.issue_date = extractor
            .extract_all(text)
            .into_iter()
            .find(|m| !labeled_values.contains(&m.value))
            .map(|mut m| {
                m.confidence = 0.6;
                m
            });
    }

    result
}

fn labeled_date(
    extractor: &DateExtractor,
    pattern: &Regex,
    text: &str,
) -> Option<ExtractionMatch<NaiveDate>> {
    let caps = pattern.captures(text)?;
    let date_text = caps.get(1)?.as_str();
    extractor
        .extract(date_text)
        .map(|m| ExtractionMatch::new(m.value, 0.95, date_text))
}

fn overlaps<T>(found: &[ExtractionMatch<T>], start: usize, end: usize) -> bool {
    found.iter().any(|r| match r.position {
        Some((s, e)) => start < e && s < end,
        None => false,
    })
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if year < 100 {
        // Two-digit year: assume 2000s for 00-50, 1900s for 51-99
        if year <= 50 {
            2000 + year
        } else {
            1900 + year
        }
    } else {
        year
    }
}

fn italian_month_to_number(month: &str) -> u32 {
    match month.to_lowercase().as_str() {
        "gennaio" => 1,
        "febbraio" => 2,
        "marzo" => 3,
        "aprile" => 4,
        "maggio" => 5,
        "giugno" => 6,
        "luglio" => 7,
        "agosto" => 8,
        "settembre" => 9,
        "ottobre" => 10,
        "novembre" => 11,
        "dicembre" => 12,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_extract_date_dmy() {
        let result = DateExtractor::new().extract("15/01/2024");
        assert_eq!(result.unwrap().value, ymd(2024, 1, 15));
    }

    #[test]
    fn test_extract_date_ymd() {
        let result = DateExtractor::new().extract("2024-01-15");
        assert_eq!(result.unwrap().value, ymd(2024, 1, 15));
    }

    #[test]
    fn test_extract_date_italian_long() {
        let result = DateExtractor::new().extract("15 Marzo 2024");
        assert_eq!(result.unwrap().value, ymd(2024, 3, 15));
    }

    #[test]
    fn test_two_digit_year() {
        let result = DateExtractor::new().extract("15.01.24");
        assert_eq!(result.unwrap().value, ymd(2024, 1, 15));
    }

    #[test]
    fn test_invalid_date_is_skipped() {
        assert!(DateExtractor::new().extract("31/02/2024").is_none());
    }

    #[test]
    fn test_extract_labeled_dates() {
        let text = "Order number: A-1\n\
                    Issue date: 01/03/2024\n\
                    Scheduled pickup: 2024-03-10\n\
                    Availability date: 05.03.2024\n\
                    Shipping request date: 02/03/2024\n";

        let dates = extract_dates(text);
        assert_eq!(dates.issue_date.unwrap().value, ymd(2024, 3, 1));
        assert_eq!(dates.scheduled_date.unwrap().value, ymd(2024, 3, 10));
        assert_eq!(dates.availability_date.unwrap().value, ymd(2024, 3, 5));
        assert_eq!(dates.shipping_request_date.unwrap().value, ymd(2024, 3, 2));
    }

    #[test]
    fn test_italian_labels() {
        let text = "Data emissione: 3 aprile 2024\nData ritiro: 10/04/2024";
        let dates = extract_dates(text);
        assert_eq!(dates.issue_date.unwrap().value, ymd(2024, 4, 3));
        assert_eq!(dates.scheduled_date.unwrap().value, ymd(2024, 4, 10));
    }

    #[test]
    fn test_unlabeled_issue_date_fallback() {
        let text = "Pickup date: 10/04/2024\nPrinted 01/04/2024";
        let dates = extract_dates(text);
        let issue = dates.issue_date.unwrap();
        assert_eq!(issue.value, ymd(2024, 4, 1));
        assert!(issue.confidence < 0.9);
    }
}
