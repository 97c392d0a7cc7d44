use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::buffer::ExampleBuffer;
use crate::capture::CaptureSource;
use crate::classifier::{fit_epoch, SoftmaxHead, TrainingConfig, TrainingRun, TrainingStatus};
use crate::error::SessionError;
use crate::extractor::{ExtractorStatus, FeatureExtractionAdapter, RawCapture};
use crate::registry::{ClassId, ClassLabel, ClassRegistry};

/// Timing knobs for the session's cooperative loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Period of the repeating capture while a class is being recorded.
    pub capture_interval: Duration,
    /// Minimum spacing between successful predictions.
    pub prediction_throttle: Duration,
    /// Tick period of the prediction loop; stands in for the host's
    /// per-frame callback.
    pub frame_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_interval: Duration::from_millis(100),
            prediction_throttle: Duration::from_millis(100),
            frame_interval: Duration::from_millis(16),
        }
    }
}

/// What happened to a single capture-and-commit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Extracted and committed; carries the class's new example count.
    Committed { examples: usize },
    /// Extractor not ready yet; queued, carries the new pending count.
    Queued { pending: usize },
    /// A capture was already in flight; this one was ignored, not queued.
    InFlight,
    /// The result was discarded because the class was removed or the
    /// session shut down while extraction ran.
    Discarded,
}

/// Read-only published state of a session. Everything the UI needs to
/// render; external code can never mutate internal buffers through it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub classes: Vec<ClassLabel>,
    /// Always the same length as `classes`.
    pub probabilities: Vec<f32>,
    pub collecting_class: Option<usize>,
    pub is_training: bool,
    pub training_percent: u8,
    pub is_trained: bool,
    pub pending_examples: usize,
    pub can_collect: bool,
    pub can_train: bool,
    pub train_blockers: Vec<String>,
}

pub type TrainedCallback = Box<dyn Fn() + Send + Sync>;

struct SessionState {
    registry: ClassRegistry,
    buffer: ExampleBuffer,
    head: Option<SoftmaxHead>,
    probabilities: Vec<f32>,
    collecting: Option<usize>,
    training: TrainingRun,
    is_trained: bool,
    predicting: bool,
    last_prediction: Option<Instant>,
    /// Bumped on every head invalidation; a finishing training run refuses
    /// to install its head when the epoch moved underneath it.
    model_epoch: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            registry: ClassRegistry::new(),
            buffer: ExampleBuffer::new(),
            head: None,
            probabilities: Vec::new(),
            collecting: None,
            training: TrainingRun::default(),
            is_trained: false,
            predicting: false,
            last_prediction: None,
            model_epoch: 0,
        }
    }
}

struct Shared {
    state: Mutex<SessionState>,
    adapter: FeatureExtractionAdapter,
    source: Arc<dyn CaptureSource>,
    config: SessionConfig,
    /// Single-flight guard for capture-and-commit.
    collect_flight: AtomicBool,
    /// Single-flight guard for the pending-queue drain.
    flush_flight: AtomicBool,
    /// Single-flight guard for extraction+inference in the prediction loop.
    predict_flight: AtomicBool,
    /// Bumped whenever collection stops or restarts; a capture interval
    /// task exits once its generation is stale.
    collect_generation: AtomicU64,
    /// Same scheme for the prediction loop, so a stop/start pair can never
    /// leave two loops running.
    predict_generation: AtomicU64,
    /// Flipped on teardown; in-flight work checks it and discards results.
    closed: AtomicBool,
    shutdown: broadcast::Sender<()>,
    probs_tx: watch::Sender<Vec<f32>>,
    on_trained: Option<TrainedCallback>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state poisoned")
    }
}

/// Clears a single-flight flag when the guarded scope exits, on every path.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// An incremental transfer-learning session.
///
/// Collects labeled examples through a pluggable feature extractor, trains
/// a small classifier head on the buffered features, and runs a throttled
/// prediction loop over the latest capture. All feature vectors and the
/// live head are exclusively owned by the session; hosts observe state
/// through [`LearningSession::snapshot`] and the probability watch channel.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> Result<(), teachable::SessionError> {
/// use std::sync::Arc;
/// use teachable::{BufferedSource, LearningSession, TrainingConfig};
/// # let adapter: teachable::FeatureExtractionAdapter = unimplemented!();
///
/// let source = Arc::new(BufferedSource::new());
/// let session = LearningSession::builder()
///     .with_extractor(adapter)
///     .with_capture_source(source.clone())
///     .build()?;
///
/// session.add_class();
/// session.add_class();
/// session.start_collecting(0)?;
/// // ... later ...
/// session.stop_collecting();
/// session.train(&TrainingConfig::default()).await?;
/// session.start_prediction();
/// # Ok(())
/// # }
/// ```
pub struct LearningSession {
    shared: Arc<Shared>,
}

impl LearningSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    // ---- class registry -------------------------------------------------

    /// Appends a class with a generated default name and zero count,
    /// growing the probability vector in step. Any live head is discarded:
    /// it was trained against an obsolete class set and its output would no
    /// longer line up with the classes.
    pub fn add_class(&self) -> ClassId {
        let mut state = self.shared.lock();
        let id = state.registry.add_class();
        state.probabilities.push(0.0);
        Self::invalidate_head(&mut state, &self.shared.probs_tx);
        id
    }

    pub fn rename_class(&self, class_index: usize, name: &str) -> Result<(), SessionError> {
        self.shared.lock().registry.rename_class(class_index, name)
    }

    /// Removes a class. The class's vectors are dropped, higher labels are
    /// re-indexed downward, any live head is discarded (it was trained
    /// against an obsolete class set) and collection is force-stopped.
    pub fn remove_class(&self, class_index: usize) -> Result<(), SessionError> {
        let mut state = self.shared.lock();
        let removed = state.registry.remove_class(class_index)?;
        state.buffer.remove_class(class_index);
        if state.collecting.take().is_some() {
            self.shared.collect_generation.fetch_add(1, Ordering::SeqCst);
        }
        state.probabilities = vec![0.0; state.registry.len()];
        Self::invalidate_head(&mut state, &self.shared.probs_tx);
        info!("removed class '{}'", removed.name);
        Ok(())
    }

    // ---- collection -----------------------------------------------------

    /// Records one example for a class.
    ///
    /// When the extractor is still loading the raw capture is queued;
    /// when it is ready the feature is extracted and committed. Refused
    /// while a training run is active. A call
    /// arriving while another capture is in flight is ignored rather than
    /// queued twice.
    pub async fn collect_example(
        &self,
        class_index: usize,
        raw: RawCapture,
    ) -> Result<CollectOutcome, SessionError> {
        Self::collect_into(&self.shared, class_index, raw).await
    }

    async fn collect_into(
        shared: &Shared,
        class_index: usize,
        raw: RawCapture,
    ) -> Result<CollectOutcome, SessionError> {
        {
            let state = shared.lock();
            if class_index >= state.registry.len() {
                return Err(SessionError::InvalidClass(class_index));
            }
            if state.training.status == TrainingStatus::Running {
                return Err(SessionError::TrainingInProgress);
            }
        }
        match shared.adapter.status() {
            ExtractorStatus::Error => Err(SessionError::CaptureUnavailable(
                "feature extractor failed to load".into(),
            )),
            ExtractorStatus::Ready => {
                if shared
                    .collect_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    return Ok(CollectOutcome::InFlight);
                }
                let _guard = FlightGuard(&shared.collect_flight);

                let vector = match shared.adapter.extract(&raw).await {
                    Ok(vector) => vector,
                    Err(e) => {
                        warn!("dropping example for class {}: {}", class_index, e);
                        return Err(e);
                    }
                };

                let mut state = shared.lock();
                if shared.closed.load(Ordering::SeqCst) || class_index >= state.registry.len() {
                    return Ok(CollectOutcome::Discarded);
                }
                state.buffer.push_committed(class_index, vector);
                let examples = state.registry.increment_count(class_index)?;
                Ok(CollectOutcome::Committed { examples })
            }
            ExtractorStatus::Idle | ExtractorStatus::Loading => {
                let mut state = shared.lock();
                let pending = state.buffer.push_pending(class_index, raw);
                debug!(
                    "extractor not ready; queued example for class {} ({} pending)",
                    class_index, pending
                );
                Ok(CollectOutcome::Queued { pending })
            }
        }
    }

    /// Drains the pending queue in original order, one conversion per
    /// cooperative yield so a large backlog cannot starve the other loops.
    /// Stops early if the extractor leaves `Ready`. Returns the number of
    /// examples committed.
    pub async fn flush_pending(&self) -> usize {
        let shared = &self.shared;
        if shared
            .flush_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return 0;
        }
        let _guard = FlightGuard(&shared.flush_flight);

        let mut flushed = 0usize;
        loop {
            if !shared.adapter.is_ready() || shared.closed.load(Ordering::SeqCst) {
                break;
            }
            let item = { shared.lock().buffer.pop_pending() };
            let Some(item) = item else { break };

            match shared.adapter.extract(&item.raw).await {
                Ok(vector) => {
                    let mut state = shared.lock();
                    if !shared.closed.load(Ordering::SeqCst)
                        && item.class_index < state.registry.len()
                    {
                        // Count first so the committed store and the label
                        // counts can never come apart.
                        match state.registry.increment_count(item.class_index) {
                            Ok(_) => {
                                state.buffer.push_committed(item.class_index, vector);
                                flushed += 1;
                            }
                            Err(e) => debug!(
                                "dropping flushed example for class {}: {}",
                                item.class_index, e
                            ),
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "dropping pending example for class {}: {}",
                        item.class_index, e
                    );
                }
            }
            tokio::task::yield_now().await;
        }
        if flushed > 0 {
            debug!("flushed {} pending examples", flushed);
        }
        flushed
    }

    /// Starts interval-repeated capture for one class.
    ///
    /// Stops any previous collection first (at most one class records at a
    /// time) and invalidates a trained head: newly recorded data obsoletes
    /// the old model. Refused while a training run is active. The first
    /// capture fires immediately, then repeats at the configured interval
    /// until stopped.
    pub fn start_collecting(&self, class_index: usize) -> Result<(), SessionError> {
        let generation = {
            let mut state = self.shared.lock();
            if class_index >= state.registry.len() {
                return Err(SessionError::InvalidClass(class_index));
            }
            if state.training.status == TrainingStatus::Running {
                return Err(SessionError::TrainingInProgress);
            }
            state.collecting = Some(class_index);
            Self::invalidate_head(&mut state, &self.shared.probs_tx);
            self.shared.collect_generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        info!("collecting examples for class {}", class_index);

        let weak = Arc::downgrade(&self.shared);
        let mut shutdown_rx = self.shared.shutdown.subscribe();
        let period = self.shared.config.capture_interval;
        tokio::spawn(async move {
            // The first tick of a tokio interval completes immediately,
            // so one capture lands right away before the cadence starts.
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        let Some(shared) = weak.upgrade() else { break };
                        if shared.collect_generation.load(Ordering::SeqCst) != generation {
                            break;
                        }
                        Self::capture_once(&shared, class_index).await;
                    }
                }
            }
            debug!("capture interval for class {} ended", class_index);
        });
        Ok(())
    }

    async fn capture_once(shared: &Shared, class_index: usize) {
        let raw = match shared.source.latest() {
            Ok(raw) => raw,
            Err(e) => {
                debug!("capture skipped: {}", e);
                return;
            }
        };
        if let Err(e) = Self::collect_into(shared, class_index, raw).await {
            warn!("capture for class {} dropped: {}", class_index, e);
        }
    }

    /// Cancels the capture interval. A no-op when nothing is active.
    pub fn stop_collecting(&self) {
        let mut state = self.shared.lock();
        if state.collecting.take().is_some() {
            self.shared.collect_generation.fetch_add(1, Ordering::SeqCst);
            debug!("collection stopped");
        }
    }

    /// Disposes one class's committed vectors and pending captures,
    /// leaving other classes untouched. Invalidates a trained head.
    pub fn clear_class_examples(&self, class_index: usize) -> Result<(), SessionError> {
        let mut state = self.shared.lock();
        if class_index >= state.registry.len() {
            return Err(SessionError::InvalidClass(class_index));
        }
        state.buffer.clear_class(class_index);
        state.registry.reset_count(class_index)?;
        Self::invalidate_head(&mut state, &self.shared.probs_tx);
        Ok(())
    }

    // ---- training -------------------------------------------------------

    pub fn can_train(&self) -> bool {
        self.train_blockers().is_empty()
    }

    /// Human-readable reasons the train action is currently disabled.
    pub fn train_blockers(&self) -> Vec<String> {
        let state = self.shared.lock();
        Self::blockers_locked(&state, &self.shared.adapter)
    }

    fn blockers_locked(state: &SessionState, adapter: &FeatureExtractionAdapter) -> Vec<String> {
        let mut blockers = Vec::new();
        if !adapter.is_ready() {
            blockers.push("feature extractor is not ready".to_string());
        }
        if state.training.status == TrainingStatus::Running {
            blockers.push("training is already in progress".to_string());
        }
        if state.buffer.pending_len() > 0 {
            blockers.push(format!(
                "{} pending examples awaiting extraction",
                state.buffer.pending_len()
            ));
        }
        if state.registry.len() < 2 {
            blockers.push("at least two classes are required".to_string());
        } else {
            let empty = state.registry.empty_class_names();
            if !empty.is_empty() {
                blockers.push(format!("classes with no examples: {}", empty.join(", ")));
            }
        }
        blockers
    }

    /// Trains a fresh classifier head on the committed feature set.
    ///
    /// Stops any active collection and drains the pending queue first; the
    /// run then refuses to start unless every blocker is clear. The prior
    /// head is disposed before the replacement is allocated. Progress is
    /// published once per epoch with a cooperative yield at each boundary.
    /// On failure the partial head is dropped and the error is returned;
    /// nothing panics across this boundary.
    pub async fn train(&self, config: &TrainingConfig) -> Result<(), SessionError> {
        self.stop_collecting();
        self.flush_pending().await;

        let (inputs, targets, num_classes, run_epoch) = {
            let mut state = self.shared.lock();
            let blockers = Self::blockers_locked(&state, &self.shared.adapter);
            if !blockers.is_empty() {
                return Err(SessionError::NotTrainable(blockers));
            }
            // Dispose the previous head before the new run allocates.
            Self::invalidate_head(&mut state, &self.shared.probs_tx);
            let num_classes = state.registry.len();
            let Some((inputs, targets)) = state.buffer.stacked(num_classes) else {
                return Err(SessionError::Training("no committed examples".into()));
            };
            state.training = TrainingRun {
                status: TrainingStatus::Running,
                percent: 0,
            };
            (inputs, targets, num_classes, state.model_epoch)
        };

        let epochs = config.epochs.max(1);
        info!(
            "training: {} examples, {} classes, {} epochs",
            inputs.nrows(),
            num_classes,
            epochs
        );
        let mut head = SoftmaxHead::new_seeded(
            inputs.ncols(),
            config.hidden_units,
            num_classes,
            config.seed,
        );

        let mut outcome: Result<(), SessionError> = Ok(());
        for epoch in 1..=epochs {
            if self.shared.closed.load(Ordering::SeqCst) {
                outcome = Err(SessionError::Training("session shut down".into()));
                break;
            }
            match fit_epoch(
                &mut head,
                &inputs,
                &targets,
                config.batch_size,
                config.learning_rate,
                config.seed.wrapping_add(epoch as u64),
            ) {
                Ok(loss) => {
                    let percent = ((epoch as f32 / epochs as f32) * 100.0).round() as u8;
                    self.shared.lock().training.percent = percent;
                    debug!("epoch {}/{}: loss {:.4} ({}%)", epoch, epochs, loss, percent);
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
            // Epoch boundaries are suspension points so the other loops
            // stay responsive during a long fit.
            tokio::task::yield_now().await;
        }

        match outcome {
            Ok(()) => {
                {
                    let mut state = self.shared.lock();
                    // The class set or example data moved while the fit
                    // ran; a head trained against the old snapshot must
                    // not be installed.
                    if state.model_epoch != run_epoch {
                        state.training = TrainingRun {
                            status: TrainingStatus::Failed,
                            percent: 0,
                        };
                        drop(state);
                        drop(head);
                        let e =
                            SessionError::Training("session changed during the run".into());
                        warn!("training discarded: {}", e);
                        return Err(e);
                    }
                    state.head = Some(head);
                    state.is_trained = true;
                    state.training = TrainingRun {
                        status: TrainingStatus::Succeeded,
                        percent: 100,
                    };
                }
                info!("training succeeded");
                if let Some(callback) = &self.shared.on_trained {
                    callback();
                }
                Ok(())
            }
            Err(e) => {
                // The partial head is dropped here; transient batch and
                // label tensors go with this scope on every exit path.
                drop(head);
                let mut state = self.shared.lock();
                state.training = TrainingRun {
                    status: TrainingStatus::Failed,
                    percent: 0,
                };
                warn!("training failed: {}", e);
                Err(e)
            }
        }
    }

    // ---- prediction -----------------------------------------------------

    /// Arms the throttled prediction loop. Returns `false` when there is
    /// no trained head, a training run is active, or the loop is already
    /// running.
    pub fn start_prediction(&self) -> bool {
        {
            let mut state = self.shared.lock();
            if state.predicting
                || state.head.is_none()
                || state.training.status == TrainingStatus::Running
            {
                return false;
            }
            state.predicting = true;
            state.last_prediction = None;
        }
        debug!("prediction loop armed");

        let generation = self.shared.predict_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(&self.shared);
        let mut shutdown_rx = self.shared.shutdown.subscribe();
        let frame = self.shared.config.frame_interval;
        let throttle = self.shared.config.prediction_throttle;
        tokio::spawn(async move {
            let mut ticker = interval(frame);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        let Some(shared) = weak.upgrade() else { break };
                        if shared.predict_generation.load(Ordering::SeqCst) != generation {
                            return;
                        }
                        if !Self::prediction_tick(&shared, throttle).await {
                            break;
                        }
                    }
                }
            }
            // Reset the request flag so the loop can be re-armed after a
            // self-cancel (e.g. when a new training run starts), unless a
            // newer loop already took over.
            if let Some(shared) = weak.upgrade() {
                if shared.predict_generation.load(Ordering::SeqCst) == generation {
                    shared.lock().predicting = false;
                }
            }
            debug!("prediction loop ended");
        });
        true
    }

    /// One frame tick: returns `false` when the loop should self-cancel.
    async fn prediction_tick(shared: &Shared, throttle: Duration) -> bool {
        {
            let state = shared.lock();
            if !state.predicting
                || state.head.is_none()
                || state.training.status == TrainingStatus::Running
            {
                return false;
            }
            if let Some(last) = state.last_prediction {
                if last.elapsed() < throttle {
                    return true;
                }
            }
        }
        // Extraction may itself suspend; without this guard a slow
        // extractor would pile up overlapping inference calls.
        if shared
            .predict_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return true;
        }
        let _guard = FlightGuard(&shared.predict_flight);

        let raw = match shared.source.latest() {
            Ok(raw) => raw,
            Err(e) => {
                debug!("prediction skipped: {}", e);
                return true;
            }
        };
        let vector = match shared.adapter.extract(&raw).await {
            Ok(vector) => vector,
            Err(e) => {
                debug!("prediction extraction failed: {}", e);
                return true;
            }
        };

        let mut state = shared.lock();
        // The triggering conditions may have flipped while extraction ran.
        if shared.closed.load(Ordering::SeqCst) || !state.predicting {
            return false;
        }
        let Some(head) = state.head.as_ref() else {
            return false;
        };
        let probabilities = head.forward(&vector).to_vec();
        state.probabilities = probabilities;
        state.last_prediction = Some(Instant::now());
        let _ = shared.probs_tx.send(state.probabilities.clone());
        true
    }

    /// Stops the prediction loop; it observes the flag on its next tick.
    pub fn stop_prediction(&self) {
        self.shared.predict_generation.fetch_add(1, Ordering::SeqCst);
        self.shared.lock().predicting = false;
    }

    // ---- published state ------------------------------------------------

    /// A consistent read-only view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.shared.lock();
        let blockers = Self::blockers_locked(&state, &self.shared.adapter);
        SessionSnapshot {
            classes: state.registry.classes().to_vec(),
            probabilities: state.probabilities.clone(),
            collecting_class: state.collecting,
            is_training: state.training.status == TrainingStatus::Running,
            training_percent: state.training.percent,
            is_trained: state.is_trained,
            pending_examples: state.buffer.pending_len(),
            can_collect: self.shared.source.is_ready()
                && self.shared.adapter.status() != ExtractorStatus::Error,
            can_train: blockers.is_empty(),
            train_blockers: blockers,
        }
    }

    /// Watch channel carrying each published probability vector.
    pub fn subscribe_probabilities(&self) -> watch::Receiver<Vec<f32>> {
        self.shared.probs_tx.subscribe()
    }

    /// Tears the session down: flips the cancellation flag, broadcasts
    /// shutdown to every loop, and stops collection and prediction. Work
    /// already in flight observes the flag and discards its result.
    pub fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.collect_generation.fetch_add(1, Ordering::SeqCst);
        self.shared.predict_generation.fetch_add(1, Ordering::SeqCst);
        let _ = self.shared.shutdown.send(());
        let mut state = self.shared.lock();
        state.collecting = None;
        state.predicting = false;
        debug!("session shut down");
    }

    fn invalidate_head(state: &mut SessionState, probs_tx: &watch::Sender<Vec<f32>>) {
        state.model_epoch += 1;
        if state.head.take().is_some() {
            debug!("discarding trained head");
        }
        state.is_trained = false;
        if state.training.status != TrainingStatus::Running {
            state.training = TrainingRun::default();
        }
        for p in state.probabilities.iter_mut() {
            *p = 0.0;
        }
        let _ = probs_tx.send(state.probabilities.clone());
    }
}

impl Drop for LearningSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Fluent construction of a [`LearningSession`].
pub struct SessionBuilder {
    adapter: Option<FeatureExtractionAdapter>,
    source: Option<Arc<dyn CaptureSource>>,
    config: SessionConfig,
    on_trained: Option<TrainedCallback>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            adapter: None,
            source: None,
            config: SessionConfig::default(),
            on_trained: None,
        }
    }

    /// Sets the feature-extraction adapter, chosen once for the session.
    pub fn with_extractor(mut self, adapter: FeatureExtractionAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_capture_source(mut self, source: Arc<dyn CaptureSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_capture_interval(mut self, interval: Duration) -> Self {
        self.config.capture_interval = interval;
        self
    }

    pub fn with_prediction_throttle(mut self, throttle: Duration) -> Self {
        self.config.prediction_throttle = throttle;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.config.frame_interval = interval;
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Callback fired after a successful training run; used by hosts to
    /// switch to a test phase.
    pub fn on_trained(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_trained = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> Result<LearningSession, SessionError> {
        let adapter = self
            .adapter
            .ok_or_else(|| SessionError::Build("a feature extractor is required".into()))?;
        let source = self
            .source
            .ok_or_else(|| SessionError::Build("a capture source is required".into()))?;
        let (probs_tx, _) = watch::channel(Vec::new());
        let (shutdown, _) = broadcast::channel(4);

        Ok(LearningSession {
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::new()),
                adapter,
                source,
                config: self.config,
                collect_flight: AtomicBool::new(false),
                flush_flight: AtomicBool::new(false),
                predict_flight: AtomicBool::new(false),
                collect_generation: AtomicU64::new(0),
                predict_generation: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                shutdown,
                probs_tx,
                on_trained: self.on_trained,
            }),
        })
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::SyncFeatureExtractor;
    use ndarray::Array1;

    struct NullExtractor;

    impl SyncFeatureExtractor for NullExtractor {
        fn status(&self) -> ExtractorStatus {
            ExtractorStatus::Ready
        }

        fn embedding_size(&self) -> usize {
            1
        }

        fn extract(&self, _raw: &RawCapture) -> Result<Array1<f32>, SessionError> {
            Ok(Array1::zeros(1))
        }
    }

    #[test]
    fn builder_requires_extractor_and_source() {
        let missing_both = SessionBuilder::new().build();
        assert!(matches!(missing_both, Err(SessionError::Build(_))));

        let adapter = FeatureExtractionAdapter::from_sync(Arc::new(NullExtractor));
        let missing_source = SessionBuilder::new().with_extractor(adapter).build();
        assert!(matches!(missing_source, Err(SessionError::Build(_))));
    }
}
