//! Error types for the pickup-core library.
//!
//! Admission rejections and format mismatches are ordinary outcomes and are
//! modelled as values ([`crate::intake::Admission`], `bool`), not as errors.

use thiserror::Error;

/// Main error type for the pickup library.
#[derive(Error, Debug)]
pub enum PickupError {
    /// Storage/persistence error.
    #[error("intake error: {0}")]
    Intake(#[from] IntakeError),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Field extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Session resource error.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while persisting an accepted upload.
#[derive(Error, Debug)]
pub enum IntakeError {
    /// The storage root could not be created.
    #[error("failed to prepare storage root {path}: {source}")]
    StorageRoot {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the file failed (disk full, permission denied, key collision).
    #[error("failed to persist {key}: {source}")]
    PersistenceFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF body.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract the text layer.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Reasons an extraction call did not produce a record.
///
/// A low-confidence record is still a success; these are the cases where no
/// record exists at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// The recognition backend could not be reached or initialised.
    #[error("recognition backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The caller cancelled the call.
    #[error("extraction cancelled")]
    Cancelled,

    /// The call exceeded its time budget.
    #[error("extraction timed out after {0:?}")]
    TimedOut(std::time::Duration),

    /// The document passed the header check but its body is unusable.
    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    /// The session was already closed.
    #[error("session is closed")]
    SessionClosed,

    /// Backend-internal failure.
    #[error("recognition failed: {0}")]
    Backend(String),
}

impl From<PdfError> for ExtractionError {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::Encrypted => {
                ExtractionError::CorruptPayload("document is encrypted".to_string())
            }
            other => ExtractionError::CorruptPayload(other.to_string()),
        }
    }
}

/// Errors related to session resources.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Acquiring the session resources failed.
    #[error("failed to open session: {0}")]
    Open(String),

    /// Releasing one or more session resources failed.
    #[error("failed to release session resources: {0}")]
    ReleaseFailed(String),
}

/// Pipeline stage that can fail after admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Writing the accepted upload to storage.
    Persist,
    /// Recognizing and parsing the stored document.
    Extract,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Persist => f.write_str("persist"),
            Stage::Extract => f.write_str("extract"),
        }
    }
}

/// A pipeline failure tagged with the stage and file it happened on.
#[derive(Error, Debug)]
#[error(
    "{stage} stage failed for {}: {source}",
    .storage_key.as_deref().unwrap_or("unstored upload")
)]
pub struct StageFailure {
    pub stage: Stage,
    /// Storage key, once one has been assigned.
    pub storage_key: Option<String>,
    #[source]
    pub source: PickupError,
}

impl StageFailure {
    pub fn new(stage: Stage, storage_key: Option<String>, source: impl Into<PickupError>) -> Self {
        Self {
            stage,
            storage_key,
            source: source.into(),
        }
    }
}

/// Result type for the pickup library.
pub type Result<T> = std::result::Result<T, PickupError>;
