//! Recognition backends: the replaceable capability that turns document bytes
//! into text.
//!
//! Backends are blocking and are driven from `spawn_blocking` by the
//! [`ExtractionEngine`](super::ExtractionEngine). Expensive setup happens in
//! [`BackendProvider::open`], once per session.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::ExtractionError;
use crate::models::config::{ExtractionConfig, OcrConfig};
use crate::pdf::{PdfExtractor, PdfProcessor};

/// How much the recognized text can be trusted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecognitionQuality {
    /// Aggregate certainty reported by the backend (0.0 - 1.0).
    Measured(f32),
    /// The backend has no quality signal.
    Unverified,
}

/// Output of a recognition pass.
#[derive(Debug, Clone)]
pub struct Recognition {
    /// Recognized text, lines separated by `\n`.
    pub text: String,
    /// Quality of the recognized text.
    pub quality: RecognitionQuality,
    /// Non-fatal problems met while recognizing.
    pub warnings: Vec<String>,
}

impl Recognition {
    pub fn new(text: impl Into<String>, quality: RecognitionQuality) -> Self {
        Self {
            text: text.into(),
            quality,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// A recognition capability.
pub trait RecognitionBackend: Send + Sync {
    /// Short name recorded in extraction metadata.
    fn name(&self) -> &str;

    /// Recognize the text of a document. Blocking.
    fn recognize(&self, bytes: &[u8]) -> Result<Recognition, ExtractionError>;

    /// Release held resources. Called once when the owning session closes.
    fn release(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Creates backends for a session.
pub trait BackendProvider: Send + Sync {
    /// Initialise a backend. `scratch_dir` lives as long as the session.
    fn open(&self, scratch_dir: &Path) -> Result<Arc<dyn RecognitionBackend>, ExtractionError>;
}

/// Reads the embedded PDF text layer.
#[derive(Debug, Clone)]
pub struct PdfTextBackend {
    min_text_length: usize,
}

impl PdfTextBackend {
    pub fn new(min_text_length: usize) -> Self {
        Self { min_text_length }
    }

    fn load(bytes: &[u8]) -> Result<PdfExtractor, ExtractionError> {
        let mut extractor = PdfExtractor::new();
        extractor.load(bytes)?;
        Ok(extractor)
    }

    fn text_layer(&self, extractor: &PdfExtractor) -> Result<Recognition, ExtractionError> {
        let text = extractor.extract_text()?;
        let length = text.trim().chars().count();

        if length >= self.min_text_length {
            Ok(Recognition::new(text, RecognitionQuality::Measured(1.0)))
        } else {
            debug!("Text layer has {} characters, below {}", length, self.min_text_length);
            Ok(Recognition::new(text, RecognitionQuality::Measured(0.5)).with_warning(format!(
                "Text layer too short ({} characters)",
                length
            )))
        }
    }
}

impl RecognitionBackend for PdfTextBackend {
    fn name(&self) -> &str {
        "pdf-text"
    }

    fn recognize(&self, bytes: &[u8]) -> Result<Recognition, ExtractionError> {
        let extractor = Self::load(bytes)?;
        debug!("Reading text layer of {} page(s)", extractor.page_count());
        self.text_layer(&extractor)
    }
}

/// Recognizes nothing and reports no quality signal.
///
/// Every record it produces carries placeholders and the fallback confidence,
/// so it is always routed to human review.
#[derive(Debug, Clone, Default)]
pub struct UnverifiedBackend;

impl RecognitionBackend for UnverifiedBackend {
    fn name(&self) -> &str {
        "unverified"
    }

    fn recognize(&self, _bytes: &[u8]) -> Result<Recognition, ExtractionError> {
        Ok(Recognition::new(String::new(), RecognitionQuality::Unverified)
            .with_warning("No recognition backend configured; record needs manual entry"))
    }
}

/// Height in pixels of one line bucket when ordering OCR regions.
const ROW_HEIGHT: f32 = 20.0;

/// A recognized region positioned by its top-left corner.
#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
struct TextRegion {
    x: f32,
    y: f32,
    text: String,
    confidence: f32,
}

/// Sort regions top to bottom by line bucket, then left to right.
#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
fn sort_reading_order(regions: &mut [TextRegion]) {
    regions.sort_by(|a, b| {
        let row_a = (a.y / ROW_HEIGHT) as i32;
        let row_b = (b.y / ROW_HEIGHT) as i32;
        row_a
            .cmp(&row_b)
            .then_with(|| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });
}

#[cfg(feature = "ocr")]
pub use ocr::OcrBackend;

#[cfg(feature = "ocr")]
mod ocr {
    use std::sync::Mutex;

    use image::GenericImageView;
    use tracing::{debug, info, warn};

    use super::{
        PdfTextBackend, Recognition, RecognitionBackend, RecognitionQuality, TextRegion,
        sort_reading_order,
    };
    use crate::error::ExtractionError;
    use crate::models::config::{ExtractionConfig, OcrConfig};
    use crate::pdf::{PdfProcessor, PdfType};

    /// OCR over images embedded in the PDF, using `pure-onnx-ocr`.
    pub struct OcrBackend {
        engine: Mutex<pure_onnx_ocr::engine::OcrEngine>,
        text_layer: PdfTextBackend,
        min_text_length: usize,
        prefer_embedded_text: bool,
        keep_unk: bool,
    }

    impl OcrBackend {
        /// Load the detection and recognition models named in `ocr`.
        pub fn open(
            ocr: &OcrConfig,
            extraction: &ExtractionConfig,
        ) -> Result<Self, ExtractionError> {
            if !ocr.models_present() {
                return Err(ExtractionError::BackendUnavailable(format!(
                    "OCR models not found in {}",
                    ocr.model_dir.display()
                )));
            }

            let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
                .det_model_path(&ocr.model_dir.join(&ocr.detection_model))
                .rec_model_path(&ocr.model_dir.join(&ocr.recognition_model))
                .dictionary_path(&ocr.model_dir.join(&ocr.dictionary))
                .build()
                .map_err(|e| ExtractionError::BackendUnavailable(format!("pure-onnx-ocr: {}", e)))?;

            info!("Loaded OCR models from {}", ocr.model_dir.display());

            Ok(Self {
                engine: Mutex::new(engine),
                text_layer: PdfTextBackend::new(extraction.min_text_length),
                min_text_length: extraction.min_text_length,
                prefer_embedded_text: extraction.prefer_embedded_text,
                keep_unk: ocr.keep_unk,
            })
        }
    }

    impl RecognitionBackend for OcrBackend {
        fn name(&self) -> &str {
            "ocr"
        }

        fn recognize(&self, bytes: &[u8]) -> Result<Recognition, ExtractionError> {
            let extractor = PdfTextBackend::load(bytes)?;
            let pdf_type = extractor.analyze(self.min_text_length);

            if self.prefer_embedded_text && matches!(pdf_type, PdfType::Text | PdfType::Hybrid) {
                debug!("Using embedded text layer ({:?})", pdf_type);
                return self.text_layer.text_layer(&extractor);
            }

            let images = extractor.extract_images();
            if images.is_empty() {
                warn!("No decodable page images, falling back to text layer");
                return Ok(self
                    .text_layer
                    .text_layer(&extractor)?
                    .with_warning("No decodable page images; used text layer"));
            }

            let engine = self
                .engine
                .lock()
                .map_err(|_| ExtractionError::Backend("OCR engine lock poisoned".to_string()))?;

            let mut lines = Vec::new();
            let mut confidences = Vec::new();
            for image in &images {
                let (width, height) = image.dimensions();
                debug!("Running OCR on {}x{} image", width, height);

                let regions = engine
                    .run_from_image(image)
                    .map_err(|e| ExtractionError::Backend(format!("pure-onnx-ocr: {}", e)))?;

                let mut page: Vec<TextRegion> = regions
                    .iter()
                    .map(|region| {
                        let (x, y) = top_left(&region.bounding_box);
                        let text = if self.keep_unk {
                            region.text.clone()
                        } else {
                            region.text.replace("[UNK]", " ")
                        };
                        TextRegion {
                            x,
                            y,
                            text,
                            confidence: region.confidence,
                        }
                    })
                    .collect();
                sort_reading_order(&mut page);

                for region in page {
                    lines.push(region.text);
                    confidences.push(region.confidence);
                }
            }

            let quality = if confidences.is_empty() {
                0.0
            } else {
                confidences.iter().sum::<f32>() / confidences.len() as f32
            };

            info!(
                "OCR recognized {} regions across {} image(s), mean certainty {:.2}",
                lines.len(),
                images.len(),
                quality
            );

            Ok(Recognition::new(
                lines.join("\n"),
                RecognitionQuality::Measured(quality.clamp(0.0, 1.0)),
            ))
        }
    }

    /// Smallest x and y over the first four polygon corners.
    fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f32, f32) {
        polygon
            .exterior()
            .coords()
            .take(4)
            .fold((f32::INFINITY, f32::INFINITY), |(x, y), c| {
                (x.min(c.x as f32), y.min(c.y as f32))
            })
    }
}

/// Which backend a [`StandardProvider`] opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded PDF text layer.
    Text,
    /// OCR over page images (requires the `ocr` feature and model files).
    Ocr,
    /// No recognition; every record needs review.
    Unverified,
}

/// Provider for the built-in backends.
#[derive(Debug, Clone)]
pub struct StandardProvider {
    kind: BackendKind,
    extraction: ExtractionConfig,
    ocr: OcrConfig,
}

impl StandardProvider {
    pub fn new(kind: BackendKind, extraction: ExtractionConfig, ocr: OcrConfig) -> Self {
        Self {
            kind,
            extraction,
            ocr,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }
}

impl BackendProvider for StandardProvider {
    fn open(&self, scratch_dir: &Path) -> Result<Arc<dyn RecognitionBackend>, ExtractionError> {
        debug!("Opening {:?} backend, scratch dir {}", self.kind, scratch_dir.display());

        let backend: Arc<dyn RecognitionBackend> = match self.kind {
            BackendKind::Text => Arc::new(PdfTextBackend::new(self.extraction.min_text_length)),
            BackendKind::Unverified => Arc::new(UnverifiedBackend),
            #[cfg(feature = "ocr")]
            BackendKind::Ocr => Arc::new(OcrBackend::open(&self.ocr, &self.extraction)?),
            #[cfg(not(feature = "ocr"))]
            BackendKind::Ocr => {
                return Err(ExtractionError::BackendUnavailable(format!(
                    "built without OCR support (models in {})",
                    self.ocr.model_dir.display()
                )));
            }
        };

        info!("Recognition backend ready: {}", backend.name());
        Ok(backend)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic backends for exercising the engine and pipeline.

    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    /// Returns canned text after an optional delay and counts releases.
    pub struct FakeBackend {
        pub text: String,
        pub quality: RecognitionQuality,
        pub delay: Option<Duration>,
        pub fail_release: bool,
        pub calls: Arc<AtomicUsize>,
        pub releases: Arc<AtomicUsize>,
    }

    impl FakeBackend {
        pub fn new(text: &str, quality: RecognitionQuality) -> Self {
            Self {
                text: text.to_string(),
                quality,
                delay: None,
                fail_release: false,
                calls: Arc::new(AtomicUsize::new(0)),
                releases: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    impl RecognitionBackend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        fn recognize(&self, bytes: &[u8]) -> Result<Recognition, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            if bytes.ends_with(b"%%CORRUPT") {
                return Err(ExtractionError::CorruptPayload("truncated body".to_string()));
            }
            Ok(Recognition::new(self.text.clone(), self.quality))
        }

        fn release(&self) -> Result<(), String> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            if self.fail_release {
                Err("handle already gone".to_string())
            } else {
                Ok(())
            }
        }
    }

    /// Hands out one shared [`FakeBackend`].
    pub struct FakeProvider {
        pub backend: Arc<FakeBackend>,
        pub opens: AtomicUsize,
    }

    impl FakeProvider {
        pub fn new(backend: FakeBackend) -> Self {
            Self {
                backend: Arc::new(backend),
                opens: AtomicUsize::new(0),
            }
        }
    }

    impl BackendProvider for FakeProvider {
        fn open(
            &self,
            _scratch_dir: &Path,
        ) -> Result<Arc<dyn RecognitionBackend>, ExtractionError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(self.backend.clone())
        }
    }

    /// Fails every open.
    pub struct UnavailableProvider;

    impl BackendProvider for UnavailableProvider {
        fn open(
            &self,
            _scratch_dir: &Path,
        ) -> Result<Arc<dyn RecognitionBackend>, ExtractionError> {
            Err(ExtractionError::BackendUnavailable("no models".to_string()))
        }
    }
}
