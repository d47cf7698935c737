//! Core library for pickup order intake.
//!
//! This crate provides:
//! - Upload admission control (batch size, file size, MIME allow-lists)
//! - Traceable storage keys and collision-safe persistence
//! - Header-level format validation for PDF and image uploads
//! - Pickup order extraction behind a pluggable recognition backend
//! - Extraction sessions that own backend resources and release them once

pub mod error;
pub mod extraction;
pub mod intake;
pub mod models;
pub mod pdf;
pub mod pipeline;
pub mod session;

pub use error::{
    ExtractionError, IntakeError, PickupError, Result, SessionError, Stage, StageFailure,
};
pub use extraction::{
    BackendKind, BackendProvider, ExtractionEngine, PickupOrderParser, Recognition,
    RecognitionBackend, RecognitionQuality, StandardProvider,
};
pub use intake::{
    AcceptedFile, Admission, AdmissionFilter, AdmissionProfile, FormatValidator, RejectReason,
    StorageNamer, UploadCandidate,
};
pub use models::{ExtractedPickupOrder, ExtractionMetadata, PickupConfig};
pub use pdf::{PdfProcessor, PdfType};
pub use pipeline::{BatchOutcome, IngestOutcome, IntakePipeline};
pub use session::ExtractionSession;
