//! Extraction engine: recognition, parsing, and record assembly.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::models::config::ExtractionConfig;
use crate::models::order::{ExtractedPickupOrder, ExtractionMetadata, UNKNOWN};

use super::backend::{Recognition, RecognitionBackend, RecognitionQuality};
use super::parser::{ParsedOrder, PickupOrderParser};

static PLACEHOLDER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Synthesize a process-unique order number: `{prefix}-{millis}-{seq}`.
pub fn placeholder_order_number(prefix: &str) -> String {
    let seq = PLACEHOLDER_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{:04}", prefix, Utc::now().timestamp_millis(), seq)
}

/// Combine per-field confidences and recognition quality into a 0 - 100 score.
///
/// Required fields weigh 2, optional fields 1, missing fields contribute 0.
/// Without a quality signal the fallback confidence is returned unchanged.
pub fn aggregate_confidence(
    fields: &[(&str, bool, Option<f32>)],
    quality: RecognitionQuality,
    fallback: f32,
) -> f32 {
    let quality = match quality {
        RecognitionQuality::Unverified if fallback.is_finite() => {
            return fallback.clamp(0.0, 100.0);
        }
        RecognitionQuality::Unverified => return 0.0,
        RecognitionQuality::Measured(q) => unit_or_zero(q),
    };

    let (weighted, total) = fields
        .iter()
        .fold((0.0f32, 0.0f32), |(weighted, total), (_, required, confidence)| {
            let weight = if *required { 2.0 } else { 1.0 };
            let confidence = unit_or_zero(confidence.unwrap_or(0.0));
            (weighted + weight * confidence, total + weight)
        });

    if total == 0.0 {
        return 0.0;
    }

    (100.0 * weighted / total * quality).clamp(0.0, 100.0)
}

/// Clamp to `0.0..=1.0`; NaN and infinities count as no signal.
fn unit_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Turns validated document bytes into a complete [`ExtractedPickupOrder`].
///
/// Recognition runs on the blocking pool; calls on one engine are serialized.
#[derive(Clone)]
pub struct ExtractionEngine {
    backend: Arc<dyn RecognitionBackend>,
    parser: PickupOrderParser,
    config: ExtractionConfig,
    timeout: Option<Duration>,
    busy: Arc<Mutex<()>>,
}

impl ExtractionEngine {
    pub fn new(backend: Arc<dyn RecognitionBackend>, config: ExtractionConfig) -> Self {
        let timeout = match config.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            backend,
            parser: PickupOrderParser::new(),
            config,
            timeout,
            busy: Arc::new(Mutex::new(())),
        }
    }

    /// Override the per-document time budget. `None` disables it.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Extract a record from `bytes`.
    pub async fn extract(&self, bytes: &[u8]) -> Result<ExtractedPickupOrder, ExtractionError> {
        self.extract_until(bytes, std::future::pending()).await
    }

    /// Extract a record, giving up with [`ExtractionError::Cancelled`] as soon
    /// as `cancel` completes.
    pub async fn extract_until<C>(
        &self,
        bytes: &[u8],
        cancel: C,
    ) -> Result<ExtractedPickupOrder, ExtractionError>
    where
        C: Future<Output = ()>,
    {
        let start = Instant::now();
        info!(
            "Starting extraction of {} bytes with {} backend",
            bytes.len(),
            self.backend.name()
        );

        let recognition = tokio::select! {
            biased;
            _ = cancel => {
                warn!("Extraction cancelled after {}ms", start.elapsed().as_millis());
                return Err(ExtractionError::Cancelled);
            }
            result = self.recognize(bytes) => result?,
        };

        let order = self.assemble(recognition, start.elapsed());
        info!(
            "Extracted order {} with confidence {:.1} in {}ms",
            order.order_number,
            order.confidence,
            order.metadata.processing_time_ms.unwrap_or_default()
        );
        Ok(order)
    }

    /// Run the backend on the blocking pool.
    ///
    /// Only the recognition itself is bounded by the timeout; time spent
    /// queued behind other documents on this engine does not count.
    async fn recognize(&self, bytes: &[u8]) -> Result<Recognition, ExtractionError> {
        let guard = Arc::clone(&self.busy).lock_owned().await;
        let backend = Arc::clone(&self.backend);
        let bytes = bytes.to_vec();

        // The guard moves into the task so a timed-out call keeps the backend
        // reserved until it actually returns.
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            backend.recognize(&bytes)
        });

        let joined = match self.timeout {
            None => task.await,
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("Extraction exceeded its {:?} budget", limit);
                    return Err(ExtractionError::TimedOut(limit));
                }
            },
        };

        joined.map_err(|e| ExtractionError::Backend(format!("recognition task failed: {}", e)))?
    }

    fn assemble(&self, recognition: Recognition, elapsed: Duration) -> ExtractedPickupOrder {
        let parsed = self.parser.parse(&recognition.text);
        let fields = parsed.field_confidences();

        let confidence =
            aggregate_confidence(&fields, recognition.quality, self.config.fallback_confidence);

        let mut metadata = ExtractionMetadata {
            engine: Some(self.backend.name().to_string()),
            processing_time_ms: Some(elapsed.as_millis() as u64),
            warnings: recognition.warnings,
            ..Default::default()
        };

        for (name, required, field_confidence) in &fields {
            match field_confidence {
                Some(c) => {
                    metadata.field_confidence.insert(name.to_string(), *c);
                }
                None => {
                    metadata.missing_fields.push(name.to_string());
                    if *required {
                        metadata
                            .warnings
                            .push(format!("{} not found; placeholder used", name));
                    }
                }
            }
        }

        debug!(
            "Parsed {} of {} fields",
            metadata.field_confidence.len(),
            fields.len()
        );

        self.build_record(parsed, confidence, metadata)
    }

    fn build_record(
        &self,
        parsed: ParsedOrder,
        confidence: f32,
        metadata: ExtractionMetadata,
    ) -> ExtractedPickupOrder {
        let unknown = || UNKNOWN.to_string();

        let order_number = parsed
            .order_number
            .map(|m| m.value)
            .unwrap_or_else(|| placeholder_order_number(&self.config.placeholder_prefix));
        let issue_date = parsed
            .issue_date
            .map(|m| m.value)
            .unwrap_or_else(|| Utc::now().date_naive());

        let sender = parsed.sender.into_party();
        let recipient = parsed.recipient.into_party();

        ExtractedPickupOrder {
            order_number,
            issue_date,
            scheduled_date: parsed.scheduled_date.map(|m| m.value),
            sender_name: sender.name.unwrap_or_else(unknown),
            sender_address: sender.address,
            sender_city: sender.city,
            sender_email: sender.email,
            recipient_name: recipient.name.unwrap_or_else(unknown),
            recipient_address: recipient.address,
            recipient_city: recipient.city,
            recipient_email: recipient.email,
            basin_code: parsed.basin_code.map(|m| m.value).unwrap_or_else(unknown),
            basin_description: parsed.basin_description.map(|m| m.value),
            flow_type: parsed.flow_type.map(|m| m.value),
            distance_km: parsed.distance_km.map(|m| m.value),
            expected_quantity: parsed.expected_quantity.map(|m| m.value),
            availability_date: parsed.availability_date.map(|m| m.value),
            shipping_request_date: parsed.shipping_request_date.map(|m| m.value),
            confidence,
            metadata,
        }
    }
}
