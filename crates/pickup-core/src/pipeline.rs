//! Intake pipeline: admit, persist, validate, extract.

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{IntakeError, SessionError, Stage, StageFailure};
use crate::intake::{
    AcceptedFile, Admission, AdmissionFilter, AdmissionProfile, FormatValidator, RejectReason,
    StorageNamer, UploadCandidate,
};
use crate::models::config::PickupConfig;
use crate::models::order::ExtractedPickupOrder;
use crate::session::ExtractionSession;

/// Result of pushing one upload through the pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Refused by admission; nothing was written.
    Rejected {
        original_name: String,
        reason: RejectReason,
    },
    /// Stored and format-checked; the profile has no extraction step.
    Stored { file: AcceptedFile },
    /// Stored, but the bytes are not the expected format. Extraction was skipped.
    FormatInvalid { file: AcceptedFile },
    /// Stored and extracted.
    Extracted {
        file: AcceptedFile,
        order: Box<ExtractedPickupOrder>,
        needs_review: bool,
        issues: Vec<String>,
    },
}

/// Result of a batch submission.
#[derive(Debug)]
pub enum BatchOutcome {
    /// The whole batch was refused before anything was written.
    Rejected(RejectReason),
    /// One entry per upload, in submission order.
    Processed(Vec<Result<IngestOutcome, StageFailure>>),
}

/// Runs uploads through admission, storage, format validation, and
/// extraction. Owns one extraction session.
pub struct IntakePipeline {
    admission: AdmissionFilter,
    storage: StorageNamer,
    session: ExtractionSession,
    review_threshold: f32,
}

impl IntakePipeline {
    pub fn new(config: &PickupConfig, session: ExtractionSession) -> Self {
        Self {
            admission: AdmissionFilter::new(&config.intake),
            storage: StorageNamer::new(config.intake.storage_root.clone()),
            session,
            review_threshold: config.extraction.review_threshold,
        }
    }

    /// Create the storage root. Idempotent.
    pub async fn initialize(&self) -> Result<(), IntakeError> {
        self.storage.ensure_root().await?;
        info!("Storage root ready at {}", self.storage.root().display());
        Ok(())
    }

    pub fn session(&self) -> &ExtractionSession {
        &self.session
    }

    pub fn storage(&self) -> &StorageNamer {
        &self.storage
    }

    /// Process a single upload that arrived in a request of `batch_size` files.
    pub async fn ingest(
        &self,
        candidate: &UploadCandidate,
        requester_id: Option<&str>,
        profile: AdmissionProfile,
        batch_size: usize,
    ) -> Result<IngestOutcome, StageFailure> {
        if let Admission::Rejected(reason) = self.admission.admit(candidate, batch_size, profile) {
            info!("Rejected {}: {}", candidate.original_name, reason);
            return Ok(IngestOutcome::Rejected {
                original_name: candidate.original_name.clone(),
                reason,
            });
        }

        let file = self
            .storage
            .name_and_persist(candidate, requester_id)
            .await
            .map_err(|e| StageFailure::new(Stage::Persist, None, e))?;
        debug!("Stored {} as {}", candidate.original_name, file.key);

        if !FormatValidator::new(profile).validate(&candidate.bytes) {
            warn!("Stored file {} is not a valid {:?} upload", file.key, profile);
            return Ok(IngestOutcome::FormatInvalid { file });
        }

        if profile == AdmissionProfile::Image {
            return Ok(IngestOutcome::Stored { file });
        }

        let order = self
            .session
            .run(&candidate.bytes)
            .await
            .map_err(|e| StageFailure::new(Stage::Extract, Some(file.key.clone()), e))?;

        let issues = order.validate();
        let needs_review = order.needs_review(self.review_threshold);
        if needs_review {
            info!(
                "Order {} from {} flagged for review (confidence {:.1})",
                order.order_number, file.key, order.confidence
            );
        }

        Ok(IngestOutcome::Extracted {
            file,
            order: Box::new(order),
            needs_review,
            issues,
        })
    }

    /// Process every upload of one request concurrently.
    ///
    /// The batch size is checked first; an oversized batch is refused as a
    /// whole. Uploads may finish in any order, but results are returned in
    /// submission order.
    pub async fn ingest_batch(
        &self,
        candidates: &[UploadCandidate],
        requester_id: Option<&str>,
        profile: AdmissionProfile,
    ) -> BatchOutcome {
        let batch_size = candidates.len();
        if let Admission::Rejected(reason) = self.admission.admit_batch(batch_size) {
            info!("Rejected batch: {}", reason);
            return BatchOutcome::Rejected(reason);
        }

        let results = join_all(
            candidates
                .iter()
                .map(|candidate| self.ingest(candidate, requester_id, profile, batch_size)),
        )
        .await;

        BatchOutcome::Processed(results)
    }

    /// Close the extraction session.
    pub fn shutdown(self) -> Result<(), SessionError> {
        self.session.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractionError, PickupError};
    use crate::extraction::backend::testing::{FakeBackend, FakeProvider};
    use crate::extraction::{BackendKind, RecognitionQuality, StandardProvider};
    use crate::models::order::UNKNOWN;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tempfile::TempDir;

    const ORDER_TEXT: &str = "Order number: ORD-7\n\
        Issue date: 2024-05-02\n\
        Sender: Acme Recycling\n\
        \n\
        Recipient: Green Plant\n\
        \n\
        Basin code: BX-04\n";

    fn config(dir: &TempDir) -> PickupConfig {
        let mut config = PickupConfig::default();
        config.intake.storage_root = dir.path().join("uploads");
        config
    }

    fn pipeline(dir: &TempDir, provider: &FakeProvider) -> IntakePipeline {
        let config = config(dir);
        let session = ExtractionSession::open(provider, config.extraction.clone()).unwrap();
        IntakePipeline::new(&config, session)
    }

    fn fake_provider() -> FakeProvider {
        FakeProvider::new(FakeBackend::new(ORDER_TEXT, RecognitionQuality::Measured(1.0)))
    }

    fn pdf(name: &str) -> UploadCandidate {
        UploadCandidate::new(b"%PDF-1.4 pickup order".to_vec(), "application/pdf", name)
    }

    fn stored_files(root: &Path) -> usize {
        std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_document_is_extracted() {
        let dir = TempDir::new().unwrap();
        let provider = fake_provider();
        let pipeline = pipeline(&dir, &provider);

        let outcome = pipeline
            .ingest(&pdf("order 7.pdf"), Some("ops"), AdmissionProfile::Document, 1)
            .await
            .unwrap();

        let (file, order) = match outcome {
            IngestOutcome::Extracted { file, order, .. } => (file, order),
            other => panic!("expected an extracted record, got {:?}", other),
        };
        assert!(file.key.ends_with("_ops_order_7.pdf"));
        assert!(file.path.exists());
        assert_eq!(order.order_number, "ORD-7");
        assert_eq!(order.sender_name, "Acme Recycling");
        assert_eq!(order.recipient_name, "Green Plant");
        assert_eq!(order.basin_code, "BX-04");
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected_without_writing() {
        let dir = TempDir::new().unwrap();
        let provider = fake_provider();
        let pipeline = pipeline(&dir, &provider);

        let candidate = UploadCandidate::new(vec![0u8; 6_000_000], "image/jpeg", "photo.jpg");
        let outcome = pipeline
            .ingest(&candidate, None, AdmissionProfile::Image, 1)
            .await
            .unwrap();

        match outcome {
            IngestOutcome::Rejected { reason, .. } => {
                assert!(reason.to_string().starts_with("too large"))
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(stored_files(&dir.path().join("uploads")), 0);
    }

    #[tokio::test]
    async fn test_bad_header_skips_extraction() {
        let dir = TempDir::new().unwrap();
        let provider = fake_provider();
        let pipeline = pipeline(&dir, &provider);

        for (i, bytes) in [b"XXXX-1.4 not a pdf".to_vec(), Vec::new()].into_iter().enumerate() {
            let candidate =
                UploadCandidate::new(bytes, "application/pdf", format!("scan-{}.pdf", i));
            let outcome = pipeline
                .ingest(&candidate, None, AdmissionProfile::Document, 1)
                .await
                .unwrap();
            assert!(matches!(outcome, IngestOutcome::FormatInvalid { .. }));
        }

        assert_eq!(provider.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_image_profile_stores_without_extraction() {
        let dir = TempDir::new().unwrap();
        let provider = fake_provider();
        let pipeline = pipeline(&dir, &provider);

        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        png.extend_from_slice(&[0u8; 32]);
        let candidate = UploadCandidate::new(png, "image/png", "truck.png");
        let outcome = pipeline
            .ingest(&candidate, Some("driver-12"), AdmissionProfile::Image, 1)
            .await
            .unwrap();

        let file = match outcome {
            IngestOutcome::Stored { file } => file,
            other => panic!("expected stored image, got {:?}", other),
        };
        assert!(file.key.ends_with("_driver-12_truck.png"));
        assert_eq!(provider.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_extraction_failure_names_stage_and_key() {
        let dir = TempDir::new().unwrap();
        let provider = fake_provider();
        let pipeline = pipeline(&dir, &provider);

        let candidate =
            UploadCandidate::new(b"%PDF-1.4 ...%%CORRUPT".to_vec(), "application/pdf", "bad.pdf");
        let failure = pipeline
            .ingest(&candidate, None, AdmissionProfile::Document, 1)
            .await
            .unwrap_err();

        assert_eq!(failure.stage, Stage::Extract);
        assert!(failure.storage_key.unwrap().ends_with("_anonymous_bad.pdf"));
        assert!(matches!(
            failure.source,
            PickupError::Extraction(ExtractionError::CorruptPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_persist_failure_is_distinct_from_rejection() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("uploads"), b"not a directory").unwrap();
        let provider = fake_provider();
        let pipeline = pipeline(&dir, &provider);

        let failure = pipeline
            .ingest(&pdf("order.pdf"), None, AdmissionProfile::Document, 1)
            .await
            .unwrap_err();

        assert_eq!(failure.stage, Stage::Persist);
        assert!(failure.storage_key.is_none());
        assert!(matches!(failure.source, PickupError::Intake(_)));
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected_before_persisting() {
        let dir = TempDir::new().unwrap();
        let provider = fake_provider();
        let pipeline = pipeline(&dir, &provider);

        let batch: Vec<_> = (0..11).map(|i| pdf(&format!("order-{}.pdf", i))).collect();
        let outcome = pipeline
            .ingest_batch(&batch, None, AdmissionProfile::Document)
            .await;

        match outcome {
            BatchOutcome::Rejected(reason) => {
                assert!(reason.to_string().starts_with("too many files"))
            }
            BatchOutcome::Processed(_) => panic!("batch of 11 should be rejected"),
        }
        assert!(!dir.path().join("uploads").exists());
    }

    #[tokio::test]
    async fn test_batch_results_keep_submission_order() {
        let dir = TempDir::new().unwrap();
        let provider = fake_provider();
        let pipeline = pipeline(&dir, &provider);

        let batch = vec![
            pdf("a.pdf"),
            UploadCandidate::new(b"GIF89a".to_vec(), "image/gif", "b.gif"),
            pdf("c.pdf"),
        ];
        let BatchOutcome::Processed(results) = pipeline
            .ingest_batch(&batch, Some("ops"), AdmissionProfile::Document)
            .await
        else {
            panic!("batch of 3 should be processed");
        };

        assert_eq!(results.len(), 3);
        let names: Vec<&str> = results
            .iter()
            .map(|result| match result {
                Ok(IngestOutcome::Extracted { file, .. }) => file.original_name.as_str(),
                Ok(IngestOutcome::Rejected { original_name, .. }) => original_name.as_str(),
                other => panic!("unexpected outcome {:?}", other),
            })
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.gif", "c.pdf"]);
        assert!(matches!(&results[1], Ok(IngestOutcome::Rejected { .. })));
    }

    #[tokio::test]
    async fn test_unverified_backend_flags_review() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let provider = StandardProvider::new(
            BackendKind::Unverified,
            config.extraction.clone(),
            config.ocr.clone(),
        );
        let session = ExtractionSession::open(&provider, config.extraction.clone()).unwrap();
        let pipeline = IntakePipeline::new(&config, session);
        pipeline.initialize().await.unwrap();

        let mut bytes = b"%PDF-1.4 ".to_vec();
        bytes.resize(50, b'.');
        let candidate = UploadCandidate::new(bytes, "application/pdf", "scan.pdf");
        let outcome = pipeline
            .ingest(&candidate, None, AdmissionProfile::Document, 1)
            .await
            .unwrap();

        let (order, needs_review, issues) = match outcome {
            IngestOutcome::Extracted {
                order,
                needs_review,
                issues,
                ..
            } => (order, needs_review, issues),
            other => panic!("expected an extracted record, got {:?}", other),
        };
        assert!(order.order_number.starts_with("PO-AUTO-"));
        assert_eq!(order.confidence, 75.0);
        assert_eq!(order.basin_code, UNKNOWN);
        assert!(needs_review);
        assert!(!issues.is_empty());

        pipeline.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_releases_session() {
        let dir = TempDir::new().unwrap();
        let provider = fake_provider();
        let pipeline = pipeline(&dir, &provider);
        let backend = Arc::clone(&provider.backend);

        pipeline.shutdown().unwrap();
        assert_eq!(backend.releases.load(Ordering::SeqCst), 1);
    }
}
