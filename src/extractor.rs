use std::sync::Arc;

use async_trait::async_trait;
use ndarray::Array1;

use crate::error::SessionError;

/// Lifecycle of a pluggable feature extractor.
///
/// Extractors may load weights over the network or warm up a device, so a
/// session has to function while the extractor is still `Loading`: raw
/// captures collected in that window are queued and converted once the
/// extractor reports `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

/// A raw sample taken from a capture source, opaque to the session core.
/// Only the extractor chosen at construction interprets its contents.
#[derive(Debug, Clone)]
pub enum RawCapture {
    /// Encoded or raw image bytes.
    Frame(Vec<u8>),
    /// A window of audio samples.
    Audio(Vec<f32>),
    /// A short text snippet.
    Text(String),
}

/// A frozen extractor with a blocking `extract`.
///
/// Suitable for extractors whose forward pass is cheap enough to run inline
/// on the session's cooperative loops.
pub trait SyncFeatureExtractor: Send + Sync {
    fn status(&self) -> ExtractorStatus;

    /// Output dimensionality, fixed for the lifetime of the extractor once
    /// it reports `Ready`.
    fn embedding_size(&self) -> usize;

    fn extract(&self, raw: &RawCapture) -> Result<Array1<f32>, SessionError>;
}

/// A frozen extractor whose `extract` may perform I/O (remote inference,
/// device readback) and therefore suspends.
#[async_trait]
pub trait AsyncFeatureExtractor: Send + Sync {
    fn status(&self) -> ExtractorStatus;

    fn embedding_size(&self) -> usize;

    async fn extract(&self, raw: &RawCapture) -> Result<Array1<f32>, SessionError>;
}

#[derive(Clone)]
enum Backend {
    Sync(Arc<dyn SyncFeatureExtractor>),
    Async(Arc<dyn AsyncFeatureExtractor>),
}

/// Normalizes a pluggable extractor into a uniform asynchronous
/// `extract(raw) -> vector` contract.
///
/// The backend variant is chosen once at construction; there is no runtime
/// probing of what kind of extractor was supplied. The adapter is cheap to
/// clone and shares the underlying extractor.
#[derive(Clone)]
pub struct FeatureExtractionAdapter {
    backend: Backend,
}

impl FeatureExtractionAdapter {
    /// Wraps a synchronous extractor.
    pub fn from_sync(extractor: Arc<dyn SyncFeatureExtractor>) -> Self {
        Self {
            backend: Backend::Sync(extractor),
        }
    }

    /// Wraps an asynchronous extractor.
    pub fn from_async(extractor: Arc<dyn AsyncFeatureExtractor>) -> Self {
        Self {
            backend: Backend::Async(extractor),
        }
    }

    pub fn status(&self) -> ExtractorStatus {
        match &self.backend {
            Backend::Sync(e) => e.status(),
            Backend::Async(e) => e.status(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == ExtractorStatus::Ready
    }

    /// Output dimensionality once ready. Meaningless before that.
    pub fn embedding_size(&self) -> usize {
        match &self.backend {
            Backend::Sync(e) => e.embedding_size(),
            Backend::Async(e) => e.embedding_size(),
        }
    }

    /// Runs the extractor on a raw capture.
    ///
    /// Fails with `ExtractorNotReady` before the extractor reports `Ready`,
    /// and with `Extraction` if the produced vector does not match the
    /// advertised dimensionality.
    pub async fn extract(&self, raw: &RawCapture) -> Result<Array1<f32>, SessionError> {
        if !self.is_ready() {
            return Err(SessionError::ExtractorNotReady);
        }
        let vector = match &self.backend {
            Backend::Sync(e) => e.extract(raw)?,
            Backend::Async(e) => e.extract(raw).await?,
        };
        let expected = self.embedding_size();
        if vector.len() != expected {
            return Err(SessionError::Extraction(format!(
                "extractor produced {} values, expected {}",
                vector.len(),
                expected
            )));
        }
        Ok(vector)
    }
}

impl std::fmt::Debug for FeatureExtractionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.backend {
            Backend::Sync(_) => "sync",
            Backend::Async(_) => "async",
        };
        f.debug_struct("FeatureExtractionAdapter")
            .field("backend", &kind)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedExtractor {
        status: ExtractorStatus,
        dim: usize,
        produce: usize,
    }

    impl SyncFeatureExtractor for FixedExtractor {
        fn status(&self) -> ExtractorStatus {
            self.status
        }

        fn embedding_size(&self) -> usize {
            self.dim
        }

        fn extract(&self, _raw: &RawCapture) -> Result<Array1<f32>, SessionError> {
            Ok(Array1::zeros(self.produce))
        }
    }

    struct SlowExtractor {
        dim: usize,
    }

    #[async_trait]
    impl AsyncFeatureExtractor for SlowExtractor {
        fn status(&self) -> ExtractorStatus {
            ExtractorStatus::Ready
        }

        fn embedding_size(&self) -> usize {
            self.dim
        }

        async fn extract(&self, raw: &RawCapture) -> Result<Array1<f32>, SessionError> {
            tokio::task::yield_now().await;
            match raw {
                RawCapture::Audio(samples) => {
                    let mut v = Array1::zeros(self.dim);
                    for (i, s) in samples.iter().take(self.dim).enumerate() {
                        v[i] = *s;
                    }
                    Ok(v)
                }
                _ => Err(SessionError::Extraction("unsupported modality".into())),
            }
        }
    }

    #[tokio::test]
    async fn not_ready_is_reported() {
        let adapter = FeatureExtractionAdapter::from_sync(Arc::new(FixedExtractor {
            status: ExtractorStatus::Loading,
            dim: 4,
            produce: 4,
        }));
        let result = adapter.extract(&RawCapture::Text("hi".into())).await;
        assert!(matches!(result, Err(SessionError::ExtractorNotReady)));
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_extraction_error() {
        let adapter = FeatureExtractionAdapter::from_sync(Arc::new(FixedExtractor {
            status: ExtractorStatus::Ready,
            dim: 4,
            produce: 3,
        }));
        let result = adapter.extract(&RawCapture::Text("hi".into())).await;
        assert!(matches!(result, Err(SessionError::Extraction(_))));
    }

    #[tokio::test]
    async fn async_backend_extracts() {
        let adapter = FeatureExtractionAdapter::from_async(Arc::new(SlowExtractor { dim: 3 }));
        let v = adapter
            .extract(&RawCapture::Audio(vec![1.0, 2.0, 3.0]))
            .await
            .unwrap();
        assert_eq!(v.len(), 3);
        assert_eq!(v[1], 2.0);
    }

    #[tokio::test]
    async fn async_backend_rejects_unsupported_modality() {
        let adapter = FeatureExtractionAdapter::from_async(Arc::new(SlowExtractor { dim: 3 }));
        let result = adapter.extract(&RawCapture::Text("nope".into())).await;
        assert!(matches!(result, Err(SessionError::Extraction(_))));
    }
}
