use ndarray::{Array1, Array2, Axis};

use super::HeadInfo;

/// Multiplicative congruential step used for deterministic weight
/// initialization and epoch shuffling. Numerically cheap and reproducible
/// across platforms; classification quality does not depend on the
/// statistical strength of the generator.
pub(crate) fn lcg(state: u64) -> u64 {
    state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407)
}

/// Maps an LCG output onto [0, 1).
fn unit(value: u64) -> f32 {
    ((value >> 11) as f64 / (1u64 << 53) as f64) as f32
}

/// The trainable classifier head: a dense hidden layer with ReLU
/// activation feeding a softmax output sized to the class count.
///
/// At most one head is alive per session; the previous one is disposed
/// before a new training run allocates its replacement. The head owns its
/// weight tensors outright, so dropping it releases everything.
#[derive(Debug, Clone)]
pub struct SoftmaxHead {
    pub(crate) w1: Array2<f32>,
    pub(crate) b1: Array1<f32>,
    pub(crate) w2: Array2<f32>,
    pub(crate) b2: Array1<f32>,
    input_dim: usize,
    hidden_dim: usize,
    num_classes: usize,
}

impl SoftmaxHead {
    /// Allocates an untrained head with deterministic, seed-derived
    /// uniform weights scaled for the fan-in of each layer.
    pub fn new_seeded(input_dim: usize, hidden_dim: usize, num_classes: usize, seed: u64) -> Self {
        let mut state = if seed == 0 { 1 } else { seed };
        let mut init = |rows: usize, cols: usize, fan_in: usize| -> Array2<f32> {
            let limit = (6.0 / fan_in as f32).sqrt();
            let mut w = Array2::<f32>::zeros((rows, cols));
            for value in w.iter_mut() {
                state = lcg(state);
                *value = (unit(state) * 2.0 - 1.0) * limit;
            }
            w
        };
        let w1 = init(input_dim, hidden_dim, input_dim);
        let w2 = init(hidden_dim, num_classes, hidden_dim);
        Self {
            w1,
            b1: Array1::zeros(hidden_dim),
            w2,
            b2: Array1::zeros(num_classes),
            input_dim,
            hidden_dim,
            num_classes,
        }
    }

    pub fn info(&self) -> HeadInfo {
        HeadInfo {
            input_dim: self.input_dim,
            hidden_dim: self.hidden_dim,
            num_classes: self.num_classes,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Hidden-layer activations for a batch, one row per example.
    pub(crate) fn hidden(&self, inputs: &Array2<f32>) -> Array2<f32> {
        let z1 = inputs.dot(&self.w1) + &self.b1;
        z1.mapv(|v| v.max(0.0))
    }

    /// Forward pass over a batch; each row of the result is a probability
    /// distribution over the classes.
    pub fn forward_batch(&self, inputs: &Array2<f32>) -> Array2<f32> {
        let a1 = self.hidden(inputs);
        let mut z2 = a1.dot(&self.w2) + &self.b2;
        softmax_rows(&mut z2);
        z2
    }

    /// Forward pass for a single feature vector.
    pub fn forward(&self, input: &Array1<f32>) -> Array1<f32> {
        let batch = input.clone().insert_axis(Axis(0));
        let probs = self.forward_batch(&batch);
        probs.row(0).to_owned()
    }

    /// Predicted class position and the full probability vector.
    pub fn predict(&self, input: &Array1<f32>) -> (usize, Array1<f32>) {
        let probs = self.forward(input);
        let best = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);
        (best, probs)
    }
}

/// In-place numerically stable softmax over each row.
fn softmax_rows(logits: &mut Array2<f32>) {
    for mut row in logits.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn seeded_init_is_deterministic() {
        let a = SoftmaxHead::new_seeded(8, 16, 3, 42);
        let b = SoftmaxHead::new_seeded(8, 16, 3, 42);
        let c = SoftmaxHead::new_seeded(8, 16, 3, 43);
        assert_eq!(a.w1, b.w1);
        assert_eq!(a.w2, b.w2);
        assert_ne!(a.w1, c.w1);
    }

    #[test]
    fn forward_produces_a_distribution() {
        let head = SoftmaxHead::new_seeded(4, 8, 3, 7);
        let probs = head.forward(&array![0.5, -0.2, 0.1, 0.9]);
        assert_eq!(probs.len(), 3);
        let sum: f32 = probs.sum();
        assert!((sum - 1.0).abs() < 1e-5, "probabilities sum to {}", sum);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn batch_and_single_forward_agree() {
        let head = SoftmaxHead::new_seeded(4, 8, 2, 11);
        let x = array![1.0, 2.0, 3.0, 4.0];
        let single = head.forward(&x);
        let batch = head.forward_batch(&x.clone().insert_axis(Axis(0)));
        for (a, b) in single.iter().zip(batch.row(0).iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn info_reflects_construction() {
        let head = SoftmaxHead::new_seeded(12, 128, 5, 1);
        let info = head.info();
        assert_eq!(info.input_dim, 12);
        assert_eq!(info.hidden_dim, 128);
        assert_eq!(info.num_classes, 5);
    }
}
