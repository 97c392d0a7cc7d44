use std::sync::Mutex;

use crate::error::SessionError;
use crate::extractor::RawCapture;

/// Supplies the latest raw sample on demand.
///
/// Device acquisition (camera permissions, microphone streams) lives outside
/// the session core; a source only has to answer "is a sample available" and
/// "give me the most recent one". Failures are reported upward, never
/// swallowed.
pub trait CaptureSource: Send + Sync {
    fn is_ready(&self) -> bool;

    fn latest(&self) -> Result<RawCapture, SessionError>;
}

/// A push/pull adapter between a host that produces frames and the session
/// loops that consume them.
///
/// The host pushes each new sample with [`BufferedSource::push`]; the
/// session's capture and prediction loops read whatever is most recent.
/// Older samples are overwritten, never queued.
#[derive(Default)]
pub struct BufferedSource {
    slot: Mutex<Option<RawCapture>>,
}

impl BufferedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current sample.
    pub fn push(&self, raw: RawCapture) {
        let mut slot = self.slot.lock().expect("capture slot poisoned");
        *slot = Some(raw);
    }

    /// Drops the current sample, e.g. when the device is detached.
    pub fn clear(&self) {
        let mut slot = self.slot.lock().expect("capture slot poisoned");
        *slot = None;
    }
}

impl CaptureSource for BufferedSource {
    fn is_ready(&self) -> bool {
        self.slot.lock().expect("capture slot poisoned").is_some()
    }

    fn latest(&self) -> Result<RawCapture, SessionError> {
        self.slot
            .lock()
            .expect("capture slot poisoned")
            .clone()
            .ok_or_else(|| SessionError::CaptureUnavailable("no sample captured yet".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_is_not_ready() {
        let source = BufferedSource::new();
        assert!(!source.is_ready());
        assert!(matches!(
            source.latest(),
            Err(SessionError::CaptureUnavailable(_))
        ));
    }

    #[test]
    fn push_overwrites_previous_sample() {
        let source = BufferedSource::new();
        source.push(RawCapture::Text("first".into()));
        source.push(RawCapture::Text("second".into()));
        assert!(source.is_ready());
        match source.latest().unwrap() {
            RawCapture::Text(s) => assert_eq!(s, "second"),
            other => panic!("unexpected capture: {:?}", other),
        }
    }

    #[test]
    fn clear_empties_the_slot() {
        let source = BufferedSource::new();
        source.push(RawCapture::Audio(vec![0.0]));
        source.clear();
        assert!(!source.is_ready());
    }
}
