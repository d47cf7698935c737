//! Extraction sessions.
//!
//! A session owns the recognition backend and a scratch directory for a
//! bounded batch of work. Both are acquired once in [`ExtractionSession::open`]
//! and released exactly once, by the first [`ExtractionSession::close`] or on
//! drop.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, SessionError};
use crate::extraction::{BackendProvider, ExtractionEngine, RecognitionBackend};
use crate::models::config::ExtractionConfig;
use crate::models::order::ExtractedPickupOrder;

/// Scoped extraction resources.
pub struct ExtractionSession {
    engine: ExtractionEngine,
    backend: Arc<dyn RecognitionBackend>,
    scratch: Mutex<Option<TempDir>>,
    scratch_path: PathBuf,
    closed: AtomicBool,
}

impl ExtractionSession {
    /// Acquire a scratch directory and initialise a backend from `provider`.
    pub fn open(
        provider: &dyn BackendProvider,
        config: ExtractionConfig,
    ) -> Result<Self, SessionError> {
        let scratch = tempfile::Builder::new()
            .prefix("pickup-session-")
            .tempdir()
            .map_err(|e| SessionError::Open(format!("scratch directory: {}", e)))?;

        // On failure the scratch directory is dropped and removed here.
        let backend = provider
            .open(scratch.path())
            .map_err(|e| SessionError::Open(e.to_string()))?;

        info!(
            "Opened extraction session with {} backend in {}",
            backend.name(),
            scratch.path().display()
        );

        Ok(Self {
            engine: ExtractionEngine::new(Arc::clone(&backend), config),
            backend,
            scratch_path: scratch.path().to_path_buf(),
            scratch: Mutex::new(Some(scratch)),
            closed: AtomicBool::new(false),
        })
    }

    /// Override the per-document time budget.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.engine = self.engine.clone().with_timeout(timeout);
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_path
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Extract one document.
    pub async fn run(&self, bytes: &[u8]) -> Result<ExtractedPickupOrder, ExtractionError> {
        self.run_until(bytes, std::future::pending()).await
    }

    /// Extract one document, stopping early when `cancel` completes.
    pub async fn run_until<C>(
        &self,
        bytes: &[u8],
        cancel: C,
    ) -> Result<ExtractedPickupOrder, ExtractionError>
    where
        C: Future<Output = ()>,
    {
        if self.is_closed() {
            return Err(ExtractionError::SessionClosed);
        }
        self.engine.extract_until(bytes, cancel).await
    }

    /// Release the backend and scratch directory.
    ///
    /// Only the first call releases anything; later calls return `Ok(())`.
    /// Release failures are logged and returned but leave the session closed.
    pub fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("Session already closed");
            return Ok(());
        }

        let mut failures = Vec::new();

        if let Err(e) = self.backend.release() {
            warn!("Failed to release {} backend: {}", self.backend.name(), e);
            failures.push(format!("backend: {}", e));
        }

        let scratch = match self.scratch.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(dir) = scratch {
            if let Err(e) = dir.close() {
                warn!("Failed to remove scratch directory {}: {}", self.scratch_path.display(), e);
                failures.push(format!("scratch directory: {}", e));
            }
        }

        info!("Closed extraction session");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SessionError::ReleaseFailed(failures.join("; ")))
        }
    }
}

impl Drop for ExtractionSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::backend::testing::{FakeBackend, FakeProvider, UnavailableProvider};
    use crate::extraction::RecognitionQuality;
    use std::sync::atomic::Ordering;

    fn provider() -> FakeProvider {
        FakeProvider::new(FakeBackend::new(
            "Order number: A-1\nBasin code: B1\n",
            RecognitionQuality::Measured(1.0),
        ))
    }

    #[tokio::test]
    async fn test_run_then_close_releases_once() {
        let provider = provider();
        let session = ExtractionSession::open(&provider, ExtractionConfig::default()).unwrap();
        let scratch = session.scratch_dir().to_path_buf();
        assert!(scratch.is_dir());

        let order = session.run(b"%PDF-1.4").await.unwrap();
        assert_eq!(order.order_number, "A-1");

        session.close().unwrap();
        session.close().unwrap();
        drop(session);

        assert_eq!(provider.backend.releases.load(Ordering::SeqCst), 1);
        assert!(!scratch.exists());
    }

    #[test]
    fn test_close_without_run() {
        let provider = provider();
        let session = ExtractionSession::open(&provider, ExtractionConfig::default()).unwrap();
        assert!(!session.is_closed());
        session.close().unwrap();
        assert!(session.is_closed());
        assert_eq!(provider.backend.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases() {
        let provider = provider();
        {
            let _session = ExtractionSession::open(&provider, ExtractionConfig::default()).unwrap();
        }
        assert_eq!(provider.backend.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_after_close_fails() {
        let provider = provider();
        let session = ExtractionSession::open(&provider, ExtractionConfig::default()).unwrap();
        session.close().unwrap();

        let err = session.run(b"%PDF-1.4").await.unwrap_err();
        assert_eq!(err, ExtractionError::SessionClosed);
    }

    #[tokio::test]
    async fn test_release_failure_does_not_mask_run_outcome() {
        let mut backend =
            FakeBackend::new("Order number: A-2\n", RecognitionQuality::Measured(1.0));
        backend.fail_release = true;
        let provider = FakeProvider::new(backend);
        let session = ExtractionSession::open(&provider, ExtractionConfig::default()).unwrap();
        let scratch = session.scratch_dir().to_path_buf();

        let outcome = session.run(b"%PDF-1.4").await;
        let closed = session.close();

        assert_eq!(outcome.unwrap().order_number, "A-2");
        assert!(matches!(closed, Err(SessionError::ReleaseFailed(_))));
        assert!(!scratch.exists());

        // A failed release still counts as the one release.
        session.close().unwrap();
        assert_eq!(provider.backend.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_failure() {
        let result = ExtractionSession::open(&UnavailableProvider, ExtractionConfig::default());
        assert!(matches!(result, Err(SessionError::Open(_))));
    }

    #[tokio::test]
    async fn test_cancelled_run_then_close() {
        let provider = FakeProvider::new(
            FakeBackend::new("", RecognitionQuality::Unverified)
                .with_delay(Duration::from_millis(300)),
        );
        let session = ExtractionSession::open(&provider, ExtractionConfig::default()).unwrap();

        let cancel = tokio::time::sleep(Duration::from_millis(10));
        let err = session.run_until(b"%PDF-1.4", cancel).await.unwrap_err();
        assert_eq!(err, ExtractionError::Cancelled);

        session.close().unwrap();
        assert_eq!(provider.backend.releases.load(Ordering::SeqCst), 1);
    }
}
