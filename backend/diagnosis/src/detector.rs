use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use cropdoc_core::{
    DiagnosisError, GenerationClient, GenerationRequest, ImageRef, ImageSource, PersistedAdvisory,
    RawResponse,
};
use cropdoc_logging::{
    redact_and_truncate, redact_secrets_and_truncate, DiagnosisEvent, EventLogger,
};
use cropdoc_store::AdvisoryStore;
use cropdoc_understanding::{encode, normalize, PromptBuilder};

/// Bounds applied to the two network calls of a run.
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    pub fetch_timeout: Duration,
    pub generation_timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(15),
            generation_timeout: Duration::from_secs(60),
        }
    }
}

/// Runs the image → model → advisory pipeline.
///
/// Every call fetches and diagnoses afresh; nothing is cached between calls.
/// A record is written only after the model output has been normalized.
pub struct DiseaseDetector {
    images: Arc<dyn ImageSource>,
    generator: Arc<dyn GenerationClient>,
    store: Arc<dyn AdvisoryStore>,
    config: DetectorConfig,
}

impl DiseaseDetector {
    pub fn new(
        images: Arc<dyn ImageSource>,
        generator: Arc<dyn GenerationClient>,
        store: Arc<dyn AdvisoryStore>,
    ) -> Self {
        Self {
            images,
            generator,
            store,
            config: DetectorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Diagnose the referenced image and store the resulting advisory.
    ///
    /// `None` (or a blank reference) fails with [`DiagnosisError::Input`]
    /// before any I/O happens.
    #[instrument(skip(self, image), fields(provider = %self.generator.name()))]
    pub async fn diagnose(&self, image: Option<ImageRef>) -> Result<PersistedAdvisory, DiagnosisError> {
        let request_id = Uuid::new_v4().to_string();
        let result = self.run(&request_id, image).await;

        if let Err(e) = &result {
            error!(request_id = %request_id, kind = e.kind(), error = %redact_and_truncate(&e.to_string(), 500), "Disease detection failed");
            let raw_response = match e {
                DiagnosisError::MalformedResponse { raw, .. } => Some(raw.clone()),
                _ => None,
            };
            EventLogger::log_event(
                &request_id,
                DiagnosisEvent::Failed {
                    kind: e.kind().to_string(),
                    detail: e.to_string(),
                    raw_response,
                },
            );
        }

        result
    }

    async fn run(
        &self,
        request_id: &str,
        image: Option<ImageRef>,
    ) -> Result<PersistedAdvisory, DiagnosisError> {
        let image = validate_input(image)?;

        info!(request_id = %request_id, image = %image.reference(), "Processing disease detection");
        EventLogger::log_event(
            request_id,
            DiagnosisEvent::Requested {
                image: image.reference().to_string(),
                mime_type: image.mime_type().to_string(),
            },
        );

        let encoded = encode(self.images.as_ref(), &image, self.config.fetch_timeout).await?;
        let request = PromptBuilder::build(encoded);
        let raw = self.generate(&request).await?;

        let normalized = match normalize(&raw.text) {
            Ok(normalized) => normalized,
            Err(e) => {
                if let DiagnosisError::MalformedResponse { raw: text, reason } = &e {
                    warn!(
                        request_id = %request_id,
                        reason = %reason,
                        raw = %redact_secrets_and_truncate(text, 2_000),
                        "Model returned malformed output"
                    );
                }
                return Err(e);
            }
        };

        if !normalized.is_complete() {
            let defaulted: Vec<&str> = normalized.defaulted.iter().map(|f| f.key()).collect();
            warn!(
                request_id = %request_id,
                defaulted = ?defaulted,
                "Model omitted advisory fields, fallbacks substituted"
            );
        }
        let defaulted_fields = normalized
            .defaulted
            .iter()
            .map(|f| f.key().to_string())
            .collect();

        let record = self
            .store
            .save(&image, normalized.advisory)
            .await
            .map_err(|e| DiagnosisError::Storage(format!("{e:#}")))?;

        info!(request_id = %request_id, advisory_id = %record.id, disease = %record.disease_name, "Advisory stored");
        EventLogger::log_event(
            request_id,
            DiagnosisEvent::Diagnosed {
                advisory_id: record.id.to_string(),
                disease_name: record.disease_name.clone(),
                defaulted_fields,
                provider: raw.provider,
                latency_ms: raw.latency_ms,
            },
        );

        Ok(record)
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse, DiagnosisError> {
        let provider = self.generator.name().to_string();
        match tokio::time::timeout(self.config.generation_timeout, self.generator.invoke(request)).await {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => Err(DiagnosisError::Generation {
                provider,
                message: format!("{e:#}"),
            }),
            Err(_) => Err(DiagnosisError::Generation {
                provider,
                message: format!(
                    "timed out after {}ms",
                    self.config.generation_timeout.as_millis()
                ),
            }),
        }
    }
}

fn validate_input(image: Option<ImageRef>) -> Result<ImageRef, DiagnosisError> {
    let image = image.ok_or_else(|| DiagnosisError::Input("no image reference supplied".into()))?;
    if image.reference().trim().is_empty() {
        return Err(DiagnosisError::Input("image reference is blank".into()));
    }
    if image.mime_type().trim().is_empty() {
        return Err(DiagnosisError::Input("image MIME type is missing".into()));
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;
    use cropdoc_core::{NormalizedAdvisory, INFORMATION_NOT_AVAILABLE};
    use cropdoc_providers::MockGenerationClient;
    use cropdoc_store::InMemoryAdvisoryStore;

    const LEAF_RUST: &str =
        r#"{"diseaseName":"Leaf Rust","causes":"Fungal infection","treatment":"Apply fungicide"}"#;

    #[derive(Default)]
    struct FakeImages {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ImageSource for FakeImages {
        async fn fetch(&self, _reference: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(b"leaf".to_vec())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl AdvisoryStore for FailingStore {
        async fn save(&self, _image: &ImageRef, _advisory: NormalizedAdvisory) -> Result<PersistedAdvisory> {
            anyhow::bail!("disk I/O error")
        }
        async fn get(&self, _id: Uuid) -> Result<Option<PersistedAdvisory>> {
            Ok(None)
        }
        async fn list_for_image(&self, _image: &str) -> Result<Vec<PersistedAdvisory>> {
            Ok(Vec::new())
        }
    }

    struct SlowClient;

    #[async_trait]
    impl GenerationClient for SlowClient {
        fn name(&self) -> &str {
            "slow"
        }
        async fn invoke(&self, _request: &GenerationRequest) -> Result<RawResponse> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(RawResponse::new(LEAF_RUST))
        }
    }

    struct Harness {
        images: Arc<FakeImages>,
        generator: Arc<MockGenerationClient>,
        store: Arc<InMemoryAdvisoryStore>,
        detector: DiseaseDetector,
    }

    fn harness(generator: MockGenerationClient) -> Harness {
        let images = Arc::new(FakeImages::default());
        let generator = Arc::new(generator);
        let store = Arc::new(InMemoryAdvisoryStore::new());
        let detector = DiseaseDetector::new(images.clone(), generator.clone(), store.clone());
        Harness {
            images,
            generator,
            store,
            detector,
        }
    }

    fn img_123() -> Option<ImageRef> {
        Some(ImageRef::new("img-123", "image/jpeg"))
    }

    #[tokio::test]
    async fn test_complete_response_persisted_verbatim() {
        let h = harness(MockGenerationClient::new("mock").with_response(LEAF_RUST));

        let record = h.detector.diagnose(img_123()).await.unwrap();
        assert_eq!(record.image, "img-123");
        assert_eq!(record.disease_name, "Leaf Rust");
        assert_eq!(record.causes, "Fungal infection");
        assert_eq!(record.treatment, "Apply fungicide");

        let stored = h.store.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_partial_response_persisted_with_fallbacks() {
        let h = harness(MockGenerationClient::new("mock").with_response(r#"{"diseaseName":"Leaf Rust"}"#));

        let record = h.detector.diagnose(img_123()).await.unwrap();
        assert_eq!(record.image, "img-123");
        assert_eq!(record.disease_name, "Leaf Rust");
        assert_eq!(record.causes, INFORMATION_NOT_AVAILABLE);
        assert_eq!(record.treatment, INFORMATION_NOT_AVAILABLE);
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_not_persisted() {
        let h = harness(MockGenerationClient::new("mock").with_response(""));

        let err = h.detector.diagnose(img_123()).await.unwrap_err();
        assert!(matches!(err, DiagnosisError::EmptyResponse));
        assert_eq!(err.status_code(), 500);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_response_not_persisted() {
        let h = harness(MockGenerationClient::new("mock").with_response("not json"));

        let err = h.detector.diagnose(img_123()).await.unwrap_err();
        match &err {
            DiagnosisError::MalformedResponse { raw, .. } => assert_eq!(raw, "not json"),
            other => panic!("expected malformed response, got {other:?}"),
        }
        assert_eq!(err.status_code(), 500);
        assert!(h.store.is_empty());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_malformed_response_logs_raw_text() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let h = harness(
            MockGenerationClient::new("mock").with_response("not json, lot 5551234567"),
        );
        let err = h.detector.diagnose(img_123()).await.unwrap_err();
        assert!(matches!(err, DiagnosisError::MalformedResponse { .. }));

        let output = logs.contents();
        assert!(output.contains("Model returned malformed output"));
        assert!(output.contains("not json, lot 5551234567"));
        assert!(output.contains("raw_response"));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_missing_input_makes_no_calls() {
        let h = harness(MockGenerationClient::new("mock").with_response(LEAF_RUST));

        let err = h.detector.diagnose(None).await.unwrap_err();
        assert!(matches!(err, DiagnosisError::Input(_)));
        assert_eq!(err.status_code(), 400);

        let err = h
            .detector
            .diagnose(Some(ImageRef::new("   ", "image/jpeg")))
            .await
            .unwrap_err();
        assert!(matches!(err, DiagnosisError::Input(_)));

        assert_eq!(h.images.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.generator.calls(), 0);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_classified() {
        let h = harness(MockGenerationClient::new("mock").failing("quota exhausted"));

        let err = h.detector.diagnose(img_123()).await.unwrap_err();
        match &err {
            DiagnosisError::Generation { provider, message } => {
                assert_eq!(provider, "mock");
                assert!(message.contains("quota exhausted"));
            }
            other => panic!("expected generation error, got {other:?}"),
        }
        assert!(!err.public_message().contains("quota"));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_generation() {
        let images = Arc::new(FakeImages {
            fail: true,
            ..Default::default()
        });
        let generator = Arc::new(MockGenerationClient::new("mock").with_response(LEAF_RUST));
        let store = Arc::new(InMemoryAdvisoryStore::new());
        let detector = DiseaseDetector::new(images, generator.clone(), store.clone());

        let err = detector.diagnose(img_123()).await.unwrap_err();
        assert!(matches!(err, DiagnosisError::Fetch(_)));
        assert_eq!(generator.calls(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_classified() {
        let detector = DiseaseDetector::new(
            Arc::new(FakeImages::default()),
            Arc::new(MockGenerationClient::new("mock").with_response(LEAF_RUST)),
            Arc::new(FailingStore),
        );

        let err = detector.diagnose(img_123()).await.unwrap_err();
        assert!(matches!(err, DiagnosisError::Storage(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_slow_generation_times_out() {
        let store = Arc::new(InMemoryAdvisoryStore::new());
        let detector = DiseaseDetector::new(
            Arc::new(FakeImages::default()),
            Arc::new(SlowClient),
            store.clone(),
        )
        .with_config(DetectorConfig {
            fetch_timeout: Duration::from_secs(1),
            generation_timeout: Duration::from_millis(20),
        });

        let err = detector.diagnose(img_123()).await.unwrap_err();
        match err {
            DiagnosisError::Generation { provider, message } => {
                assert_eq!(provider, "slow");
                assert!(message.contains("timed out"));
            }
            other => panic!("expected generation error, got {other:?}"),
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_repeat_image_diagnosed_afresh() {
        let h = harness(MockGenerationClient::new("mock").with_response(LEAF_RUST));

        let first = h.detector.diagnose(img_123()).await.unwrap();
        let second = h.detector.diagnose(img_123()).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(h.images.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.generator.calls(), 2);
        assert_eq!(h.store.list_for_image("img-123").await.unwrap().len(), 2);
    }
}
