use log::debug;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use super::model::{lcg, SoftmaxHead};
use crate::error::SessionError;

/// Hyperparameters for one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    /// Clamped to the dataset size before use.
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Width of the dense hidden layer.
    pub hidden_units: usize,
    /// Seed for weight initialization and epoch shuffling.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 16,
            learning_rate: 0.1,
            hidden_units: 128,
            seed: 42,
        }
    }
}

/// Status of the current or most recent training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrainingStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Transient record of a training run, published through session
/// snapshots while the fit loop is in progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainingRun {
    pub status: TrainingStatus,
    /// `round(epoch / epochs * 100)`, updated once per epoch.
    pub percent: u8,
}

/// Runs a single epoch of minibatch SGD minimizing categorical
/// cross-entropy and returns the mean loss over the dataset.
///
/// `shuffle_seed` should vary per epoch so that batch composition does,
/// while remaining reproducible for a fixed session seed.
pub fn fit_epoch(
    head: &mut SoftmaxHead,
    inputs: &Array2<f32>,
    targets: &Array2<f32>,
    batch_size: usize,
    learning_rate: f32,
    shuffle_seed: u64,
) -> Result<f32, SessionError> {
    let n = inputs.len_of(Axis(0));
    if n == 0 {
        return Err(SessionError::Training("empty dataset".into()));
    }
    if targets.len_of(Axis(0)) != n {
        return Err(SessionError::Training(format!(
            "{} inputs but {} label rows",
            n,
            targets.len_of(Axis(0))
        )));
    }
    if inputs.len_of(Axis(1)) != head.input_dim() {
        return Err(SessionError::Training(format!(
            "input dimension {} does not match head input {}",
            inputs.len_of(Axis(1)),
            head.input_dim()
        )));
    }
    if targets.len_of(Axis(1)) != head.num_classes() {
        return Err(SessionError::Training(format!(
            "label width {} does not match {} classes",
            targets.len_of(Axis(1)),
            head.num_classes()
        )));
    }

    let batch = batch_size.clamp(1, n);
    let order = shuffled_indices(n, shuffle_seed);
    let mut total_loss = 0.0f32;

    for chunk in order.chunks(batch) {
        let xb = inputs.select(Axis(0), chunk);
        let tb = targets.select(Axis(0), chunk);
        let m = chunk.len() as f32;

        let z1 = xb.dot(&head.w1) + &head.b1;
        let a1 = z1.mapv(|v| v.max(0.0));
        let mut probs = a1.dot(&head.w2) + &head.b2;
        for mut row in probs.rows_mut() {
            let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }

        let log_probs = probs.mapv(|v| v.max(1e-7).ln());
        total_loss -= (&tb * &log_probs).sum();

        // Backward pass: output gradient, then hidden gradient masked by
        // the ReLU derivative, with parameter updates applied in place.
        let grad_z2 = (&probs - &tb) / m;
        let grad_w2 = a1.t().dot(&grad_z2);
        let grad_b2 = grad_z2.sum_axis(Axis(0));
        let grad_a1 = grad_z2.dot(&head.w2.t());
        let mask = z1.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let grad_z1 = &grad_a1 * &mask;
        let grad_w1 = xb.t().dot(&grad_z1);
        let grad_b1 = grad_z1.sum_axis(Axis(0));

        head.w2.scaled_add(-learning_rate, &grad_w2);
        head.b2.scaled_add(-learning_rate, &grad_b2);
        head.w1.scaled_add(-learning_rate, &grad_w1);
        head.b1.scaled_add(-learning_rate, &grad_b1);
    }

    let mean_loss = total_loss / n as f32;
    if !mean_loss.is_finite() {
        return Err(SessionError::Training(format!(
            "loss diverged ({})",
            mean_loss
        )));
    }
    Ok(mean_loss)
}

/// Fits a freshly initialized head on the full dataset and reports progress
/// once per epoch through `on_epoch(percent, mean_loss)`.
///
/// This is the synchronous fit used by tests and benchmarks; the session
/// drives [`fit_epoch`] directly so it can yield at epoch boundaries.
pub fn fit(
    inputs: &Array2<f32>,
    targets: &Array2<f32>,
    config: &TrainingConfig,
    mut on_epoch: impl FnMut(u8, f32),
) -> Result<SoftmaxHead, SessionError> {
    let input_dim = inputs.len_of(Axis(1));
    let num_classes = targets.len_of(Axis(1));
    let mut head = SoftmaxHead::new_seeded(input_dim, config.hidden_units, num_classes, config.seed);
    let epochs = config.epochs.max(1);

    for epoch in 1..=epochs {
        let loss = fit_epoch(
            &mut head,
            inputs,
            targets,
            config.batch_size,
            config.learning_rate,
            config.seed.wrapping_add(epoch as u64),
        )?;
        let percent = ((epoch as f32 / epochs as f32) * 100.0).round() as u8;
        debug!("epoch {}/{}: loss {:.4}", epoch, epochs, loss);
        on_epoch(percent, loss);
    }
    Ok(head)
}

fn shuffled_indices(n: usize, seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    let mut state = if seed == 0 { 1 } else { seed };
    for i in (1..n).rev() {
        state = lcg(state);
        let j = (state % (i as u64 + 1)) as usize;
        order.swap(i, j);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    /// Two well-separated clusters: class 0 around +1, class 1 around -1,
    /// with small seed-derived jitter.
    fn clusters(per_class: usize, dim: usize) -> (Array2<f32>, Array2<f32>) {
        let n = per_class * 2;
        let mut inputs = Array2::<f32>::zeros((n, dim));
        let mut targets = Array2::<f32>::zeros((n, 2));
        let mut state = 9u64;
        for i in 0..n {
            let class = i % 2;
            let center = if class == 0 { 1.0 } else { -1.0 };
            for j in 0..dim {
                state = lcg(state);
                let jitter = ((state >> 33) as f32 / (1u64 << 31) as f32) * 0.2 - 0.1;
                inputs[[i, j]] = center + jitter;
            }
            targets[[i, class]] = 1.0;
        }
        (inputs, targets)
    }

    #[test]
    fn loss_decreases_over_epochs() {
        let (inputs, targets) = clusters(10, 8);
        let mut losses = Vec::new();
        fit(
            &inputs,
            &targets,
            &TrainingConfig {
                epochs: 10,
                ..TrainingConfig::default()
            },
            |_, loss| losses.push(loss),
        )
        .unwrap();
        assert_eq!(losses.len(), 10);
        assert!(
            losses.last().unwrap() < losses.first().unwrap(),
            "loss did not decrease: {:?}",
            losses
        );
    }

    /// Statistical smoke test: one epoch on a separable 2-class dataset is
    /// already better than chance on the training examples.
    #[test]
    fn one_epoch_beats_chance_on_training_data() {
        let (inputs, targets) = clusters(10, 8);
        let head = fit(
            &inputs,
            &targets,
            &TrainingConfig {
                epochs: 1,
                ..TrainingConfig::default()
            },
            |_, _| {},
        )
        .unwrap();

        let mut correct = 0usize;
        for i in 0..inputs.len_of(Axis(0)) {
            let x: Array1<f32> = inputs.row(i).to_owned();
            let (predicted, _) = head.predict(&x);
            let expected = if targets[[i, 0]] == 1.0 { 0 } else { 1 };
            if predicted == expected {
                correct += 1;
            }
        }
        assert!(
            correct > inputs.len_of(Axis(0)) / 2,
            "only {}/{} correct",
            correct,
            inputs.len_of(Axis(0))
        );
    }

    #[test]
    fn batch_size_is_clamped_to_dataset() {
        let (inputs, targets) = clusters(2, 4);
        let result = fit(
            &inputs,
            &targets,
            &TrainingConfig {
                epochs: 2,
                batch_size: 1000,
                ..TrainingConfig::default()
            },
            |_, _| {},
        );
        assert!(result.is_ok());
    }

    #[test]
    fn progress_is_reported_per_epoch() {
        let (inputs, targets) = clusters(3, 4);
        let mut percents = Vec::new();
        fit(
            &inputs,
            &targets,
            &TrainingConfig {
                epochs: 4,
                ..TrainingConfig::default()
            },
            |p, _| percents.push(p),
        )
        .unwrap();
        assert_eq!(percents, vec![25, 50, 75, 100]);
    }

    #[test]
    fn mismatched_labels_are_rejected() {
        let (inputs, _) = clusters(2, 4);
        let bad_targets = Array2::<f32>::zeros((1, 2));
        let mut head = SoftmaxHead::new_seeded(4, 8, 2, 1);
        let result = fit_epoch(&mut head, &inputs, &bad_targets, 4, 0.1, 1);
        assert!(matches!(result, Err(SessionError::Training(_))));
    }
}
