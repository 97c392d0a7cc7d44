use thiserror::Error;

/// Errors surfaced by a learning session.
///
/// Extraction and training failures are caught at the session boundary and
/// converted into state flags plus one of these values; they are never
/// allowed to panic across the API.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The feature extractor has not finished loading.
    #[error("feature extractor is not ready")]
    ExtractorNotReady,

    /// The extractor rejected a raw capture. The offending example is
    /// dropped and collection continues.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The capture source has no sample available or has failed.
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// The fit procedure failed; any partially built head was disposed.
    #[error("training failed: {0}")]
    Training(String),

    /// A class index outside the current registry.
    #[error("class index {0} is out of range")]
    InvalidClass(usize),

    /// The registry refuses to drop its last remaining class.
    #[error("cannot remove the last remaining class")]
    LastClass,

    /// Collection is refused while a training run is active; the capture
    /// and fit loops never mutate the example set concurrently.
    #[error("a training run is in progress")]
    TrainingInProgress,

    /// Training preconditions are not met; carries the human-readable
    /// blocking reasons shown next to a disabled train action.
    #[error("training blocked: {}", .0.join("; "))]
    NotTrainable(Vec<String>),

    /// Session construction failed.
    #[error("build error: {0}")]
    Build(String),
}
