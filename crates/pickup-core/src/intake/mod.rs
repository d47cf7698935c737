//! Upload intake: admission control, storage naming, and format checks.

mod admission;
mod format;
mod storage;

pub use admission::AdmissionFilter;
pub use format::{is_pdf, FormatValidator};
pub use storage::{sanitize_name, storage_key, StorageNamer, ANONYMOUS};

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A raw upload as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    /// File contents.
    pub bytes: Vec<u8>,
    /// MIME type declared by the client.
    pub mime_type: String,
    /// Original file name declared by the client.
    pub original_name: String,
}

impl UploadCandidate {
    pub fn new(
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            original_name: original_name.into(),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// An upload that passed admission and was written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedFile {
    /// Storage key, `{millis}_{requester}_{sanitizedName}`.
    pub key: String,
    /// Full destination path.
    pub path: PathBuf,
    /// Declared MIME type.
    pub mime_type: String,
    /// Original file name as declared.
    pub original_name: String,
    /// Size in bytes.
    pub size: u64,
}

/// Which allow-list an upload is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionProfile {
    /// Photographic evidence (JPEG, PNG, WebP).
    Image,
    /// Pickup order documents (PDF).
    Document,
}

/// Outcome of the admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }
}

/// Why an upload was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The request carried more files than allowed.
    TooManyFiles { count: usize, max: usize },
    /// The file exceeds the size limit.
    TooLarge { size: u64, max: u64 },
    /// The declared MIME type is not allowed for the profile.
    UnsupportedType { mime_type: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TooManyFiles { count, max } => {
                write!(f, "too many files ({} submitted, at most {} allowed)", count, max)
            }
            RejectReason::TooLarge { size, max } => {
                write!(f, "too large ({} bytes, at most {} allowed)", size, max)
            }
            RejectReason::UnsupportedType { mime_type } => {
                write!(f, "unsupported type: {}", mime_type)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason_messages() {
        let too_large = RejectReason::TooLarge { size: 6_000_000, max: 5_242_880 };
        assert!(too_large.to_string().starts_with("too large"));

        let too_many = RejectReason::TooManyFiles { count: 11, max: 10 };
        assert!(too_many.to_string().starts_with("too many files"));

        let unsupported = RejectReason::UnsupportedType { mime_type: "text/html".to_string() };
        assert_eq!(unsupported.to_string(), "unsupported type: text/html");
    }
}
