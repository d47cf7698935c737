//! Admission control for inbound uploads.

use tracing::debug;

use super::{Admission, AdmissionProfile, RejectReason, UploadCandidate};
use crate::models::config::IntakeConfig;

/// Accepts or rejects uploads before anything is written.
///
/// Rules are applied in order: batch size, file size, MIME type.
#[derive(Debug, Clone)]
pub struct AdmissionFilter {
    max_file_size: u64,
    max_files_per_batch: usize,
    image_mime_types: Vec<String>,
    document_mime_types: Vec<String>,
}

impl AdmissionFilter {
    /// Create a filter from intake configuration.
    pub fn new(config: &IntakeConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            max_files_per_batch: config.max_files_per_batch,
            image_mime_types: normalize_all(&config.image_mime_types),
            document_mime_types: normalize_all(&config.document_mime_types),
        }
    }

    /// Maximum number of files per request.
    pub fn max_files_per_batch(&self) -> usize {
        self.max_files_per_batch
    }

    /// Check the batch size alone.
    pub fn admit_batch(&self, batch_size: usize) -> Admission {
        if batch_size > self.max_files_per_batch {
            debug!(batch_size, max = self.max_files_per_batch, "Rejecting batch");
            return Admission::Rejected(RejectReason::TooManyFiles {
                count: batch_size,
                max: self.max_files_per_batch,
            });
        }
        Admission::Accepted
    }

    /// Decide whether a single candidate may be stored.
    pub fn admit(
        &self,
        candidate: &UploadCandidate,
        batch_size: usize,
        profile: AdmissionProfile,
    ) -> Admission {
        if let Admission::Rejected(reason) = self.admit_batch(batch_size) {
            return Admission::Rejected(reason);
        }

        let size = candidate.size();
        if size > self.max_file_size {
            debug!(name = %candidate.original_name, size, "Rejecting oversized upload");
            return Admission::Rejected(RejectReason::TooLarge {
                size,
                max: self.max_file_size,
            });
        }

        let allowed = match profile {
            AdmissionProfile::Image => &self.image_mime_types,
            AdmissionProfile::Document => &self.document_mime_types,
        };
        let mime = normalize_mime(&candidate.mime_type);
        if !allowed.iter().any(|m| *m == mime) {
            debug!(
                name = %candidate.original_name,
                mime = %candidate.mime_type,
                ?profile,
                "Rejecting unsupported type"
            );
            return Admission::Rejected(RejectReason::UnsupportedType {
                mime_type: candidate.mime_type.clone(),
            });
        }

        Admission::Accepted
    }
}

/// Lowercase and strip parameters (`application/pdf; charset=binary`).
fn normalize_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

fn normalize_all(mimes: &[String]) -> Vec<String> {
    mimes.iter().map(|m| normalize_mime(m)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn filter() -> AdmissionFilter {
        AdmissionFilter::new(&IntakeConfig::default())
    }

    fn candidate(size: usize, mime: &str) -> UploadCandidate {
        UploadCandidate::new(vec![0u8; size], mime, "scan.bin")
    }

    #[test]
    fn test_accepts_pdf_document() {
        let upload = candidate(1024, "application/pdf");
        let result = filter().admit(&upload, 1, AdmissionProfile::Document);
        assert_eq!(result, Admission::Accepted);
    }

    #[test]
    fn test_rejects_oversized_image() {
        let upload = candidate(6_000_000, "image/jpeg");
        let result = filter().admit(&upload, 1, AdmissionProfile::Image);
        match result {
            Admission::Rejected(reason) => assert!(reason.to_string().starts_with("too large")),
            Admission::Accepted => panic!("oversized upload was accepted"),
        }
    }

    #[test]
    fn test_exact_limit_is_accepted() {
        let upload = candidate(5 * 1024 * 1024, "image/png");
        let result = filter().admit(&upload, 1, AdmissionProfile::Image);
        assert!(result.is_accepted());
    }

    #[test]
    fn test_rejects_eleven_files() {
        let result = filter().admit(&candidate(10, "image/png"), 11, AdmissionProfile::Image);
        assert_eq!(
            result,
            Admission::Rejected(RejectReason::TooManyFiles { count: 11, max: 10 })
        );
    }

    #[test]
    fn test_batch_rule_precedes_size_rule() {
        let upload = candidate(6_000_000, "text/plain");
        let result = filter().admit(&upload, 11, AdmissionProfile::Image);
        assert!(matches!(result, Admission::Rejected(RejectReason::TooManyFiles { .. })));
    }

    #[test]
    fn test_profiles_use_separate_allow_lists() {
        let f = filter();
        let pdf = candidate(10, "application/pdf");
        let jpg = candidate(10, "image/jpg");

        assert!(!f.admit(&pdf, 1, AdmissionProfile::Image).is_accepted());
        assert!(!f.admit(&jpg, 1, AdmissionProfile::Document).is_accepted());
        assert!(f.admit(&jpg, 1, AdmissionProfile::Image).is_accepted());
        assert!(f.admit(&candidate(10, "image/webp"), 1, AdmissionProfile::Image).is_accepted());
    }

    #[test]
    fn test_mime_matching_ignores_case_and_parameters() {
        let result = filter().admit(
            &candidate(10, "Application/PDF; charset=binary"),
            1,
            AdmissionProfile::Document,
        );
        assert!(result.is_accepted());
    }

    #[test]
    fn test_custom_limits() {
        let config = IntakeConfig {
            max_file_size: 100,
            max_files_per_batch: 2,
            ..IntakeConfig::default()
        };
        let f = AdmissionFilter::new(&config);
        assert!(!f.admit(&candidate(101, "image/png"), 1, AdmissionProfile::Image).is_accepted());
        assert!(!f.admit_batch(3).is_accepted());
        assert!(f.admit_batch(2).is_accepted());
    }
}
