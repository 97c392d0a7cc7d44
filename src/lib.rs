//! Incremental transfer-learning sessions: teach a small classifier by
//! recording a few examples per class from a live capture source, then test
//! it immediately with a continuous throttled prediction loop.
//!
//! The feature extractor (image embedding, audio embedding, text
//! embedding, landmarks) is a frozen, pluggable collaborator; this crate
//! only trains a small classifier head on its output and coordinates the
//! three cooperative loops around it: the capture interval, the training
//! fit procedure, and the prediction frame loop.
//!
//! # Basic usage
//!
//! ```no_run
//! # async fn demo(adapter: teachable::FeatureExtractionAdapter)
//! #     -> Result<(), teachable::SessionError> {
//! use std::sync::Arc;
//! use teachable::{BufferedSource, LearningSession, RawCapture, TrainingConfig};
//!
//! let source = Arc::new(BufferedSource::new());
//! let session = LearningSession::builder()
//!     .with_extractor(adapter)
//!     .with_capture_source(source.clone())
//!     .build()?;
//!
//! session.add_class();
//! session.add_class();
//!
//! // Record examples for class 0 while the host feeds frames.
//! source.push(RawCapture::Text("hello".into()));
//! session.start_collecting(0)?;
//! // ...
//! session.stop_collecting();
//!
//! session.train(&TrainingConfig::default()).await?;
//! session.start_prediction();
//! let snapshot = session.snapshot();
//! assert_eq!(snapshot.probabilities.len(), snapshot.classes.len());
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod capture;
pub mod classifier;
pub mod error;
pub mod extractor;
pub mod registry;
pub mod runtime;
pub mod session;

pub use buffer::{ExampleBuffer, LabeledFeature, PendingExample};
pub use capture::{BufferedSource, CaptureSource};
pub use classifier::{HeadInfo, SoftmaxHead, TrainingConfig, TrainingRun, TrainingStatus};
pub use error::SessionError;
pub use extractor::{
    AsyncFeatureExtractor, ExtractorStatus, FeatureExtractionAdapter, RawCapture,
    SyncFeatureExtractor,
};
pub use registry::{ClassId, ClassLabel, ClassRegistry};
pub use session::{
    CollectOutcome, LearningSession, SessionBuilder, SessionConfig, SessionSnapshot,
};

pub fn init_logger() {
    env_logger::init();
}
