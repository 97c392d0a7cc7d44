use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use log::info;
use ndarray::Array1;
use teachable::{
    BufferedSource, ExtractorStatus, FeatureExtractionAdapter, LearningSession, RawCapture,
    SessionError, SyncFeatureExtractor, TrainingConfig,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Examples to record per class
    #[arg(short, long, default_value_t = 12)]
    examples: usize,

    /// Training epochs
    #[arg(long, default_value_t = 30)]
    epochs: usize,

    /// Seed for weight initialization and the synthetic signal
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Pools an audio window into a fixed number of energy bins and
/// L2-normalizes the result. Stands in for a real audio embedding model.
struct EnergyBins {
    bins: usize,
}

impl SyncFeatureExtractor for EnergyBins {
    fn status(&self) -> ExtractorStatus {
        ExtractorStatus::Ready
    }

    fn embedding_size(&self) -> usize {
        self.bins
    }

    fn extract(&self, raw: &RawCapture) -> Result<Array1<f32>, SessionError> {
        let samples = match raw {
            RawCapture::Audio(samples) if !samples.is_empty() => samples,
            RawCapture::Audio(_) => {
                return Err(SessionError::Extraction("empty audio window".into()))
            }
            other => {
                return Err(SessionError::Extraction(format!(
                    "unsupported modality: {:?}",
                    other
                )))
            }
        };
        let chunk = (samples.len() / self.bins).max(1);
        let mut features = Array1::<f32>::zeros(self.bins);
        for (i, window) in samples.chunks(chunk).take(self.bins).enumerate() {
            features[i] = window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32;
        }
        let norm = features.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 1e-10 {
            features.mapv_inplace(|v| v / norm);
        }
        Ok(features)
    }
}

fn lcg(state: u64) -> u64 {
    state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407)
}

/// A synthetic audio window: quiet noise for class 0, a loud tone for
/// class 1, with seed-derived jitter.
fn synth_window(class: usize, seed: u64) -> RawCapture {
    let mut state = if seed == 0 { 1 } else { seed };
    let mut samples = Vec::with_capacity(256);
    for i in 0..256 {
        state = lcg(state);
        let noise = ((state >> 33) as f32 / (1u64 << 31) as f32) * 0.1 - 0.05;
        let sample = match class {
            0 => noise,
            _ => (i as f32 * 0.3).sin() * 0.8 + noise,
        };
        samples.push(sample);
    }
    RawCapture::Audio(samples)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("=== Starting Transfer-Learning Session Demo ===");
    let start_time = Instant::now();

    let source = Arc::new(BufferedSource::new());
    let adapter = FeatureExtractionAdapter::from_sync(Arc::new(EnergyBins { bins: 16 }));
    let session = LearningSession::builder()
        .with_extractor(adapter)
        .with_capture_source(source.clone())
        .with_prediction_throttle(Duration::from_millis(50))
        .on_trained(|| info!("training complete, switching to test phase"))
        .build()?;

    session.add_class();
    session.add_class();
    session.rename_class(0, "quiet")?;
    session.rename_class(1, "loud")?;

    info!("Recording {} examples per class...", args.examples);
    for class in 0..2 {
        for i in 0..args.examples {
            let raw = synth_window(class, args.seed + (class * 1000 + i) as u64);
            session.collect_example(class, raw).await?;
        }
    }

    let snapshot = session.snapshot();
    for class in &snapshot.classes {
        info!("{}: {} examples", class.name, class.example_count);
    }
    if !snapshot.can_train {
        anyhow::bail!("cannot train: {}", snapshot.train_blockers.join("; "));
    }

    info!("Training for {} epochs...", args.epochs);
    let train_start = Instant::now();
    session
        .train(&TrainingConfig {
            epochs: args.epochs,
            seed: args.seed,
            ..TrainingConfig::default()
        })
        .await?;
    info!("Training took {:.2?}", train_start.elapsed());

    // Live test phase: feed probes and read the published probabilities.
    let mut probabilities = session.subscribe_probabilities();
    session.start_prediction();
    for (label, class) in [("quiet", 0usize), ("loud", 1usize)] {
        source.push(synth_window(class, args.seed + 9999 + class as u64));
        tokio::time::timeout(Duration::from_secs(2), probabilities.changed()).await??;
        let probs = probabilities.borrow_and_update().clone();
        let snapshot = session.snapshot();
        println!("probe '{}':", label);
        for (class, p) in snapshot.classes.iter().zip(&probs) {
            println!("  {}: {:.1}%", class.name, p * 100.0);
        }
    }
    session.stop_prediction();
    session.shutdown();

    info!("=== Demo Complete (took {:.2?}) ===", start_time.elapsed());
    Ok(())
}
