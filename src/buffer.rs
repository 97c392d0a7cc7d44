use std::collections::VecDeque;

use ndarray::{Array1, Array2, Axis};

use crate::extractor::RawCapture;

/// A committed feature vector and the class position it was recorded for.
#[derive(Debug, Clone)]
pub struct LabeledFeature {
    pub class_index: usize,
    pub vector: Array1<f32>,
}

/// A raw capture recorded before the extractor was ready, awaiting
/// conversion into a feature vector.
#[derive(Debug, Clone)]
pub struct PendingExample {
    pub class_index: usize,
    pub raw: RawCapture,
}

/// Holds committed feature vectors keyed by class position plus the FIFO
/// queue of raw captures recorded while the extractor was still loading.
///
/// The buffer is exclusively owned by the session; external code observes
/// counts through session snapshots only.
#[derive(Debug, Default)]
pub struct ExampleBuffer {
    committed: Vec<LabeledFeature>,
    pending: VecDeque<PendingExample>,
}

impl ExampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_committed(&mut self, class_index: usize, vector: Array1<f32>) {
        self.committed.push(LabeledFeature {
            class_index,
            vector,
        });
    }

    /// Queues a raw capture and returns the new pending count.
    pub fn push_pending(&mut self, class_index: usize, raw: RawCapture) -> usize {
        self.pending.push_back(PendingExample { class_index, raw });
        self.pending.len()
    }

    /// Takes the oldest pending capture, preserving original order.
    pub fn pop_pending(&mut self) -> Option<PendingExample> {
        self.pending.pop_front()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }

    pub fn count_for(&self, class_index: usize) -> usize {
        self.committed
            .iter()
            .filter(|f| f.class_index == class_index)
            .count()
    }

    /// Drops everything recorded for `class_index` and re-labels vectors
    /// for higher positions downward by one, matching a registry removal.
    pub fn remove_class(&mut self, class_index: usize) {
        self.committed.retain(|f| f.class_index != class_index);
        for feature in &mut self.committed {
            if feature.class_index > class_index {
                feature.class_index -= 1;
            }
        }
        self.pending.retain(|p| p.class_index != class_index);
        for pending in &mut self.pending {
            if pending.class_index > class_index {
                pending.class_index -= 1;
            }
        }
    }

    /// Disposes committed vectors and pending captures for one class,
    /// leaving every other class untouched.
    pub fn clear_class(&mut self, class_index: usize) {
        self.committed.retain(|f| f.class_index != class_index);
        self.pending.retain(|p| p.class_index != class_index);
    }

    pub fn clear(&mut self) {
        self.committed.clear();
        self.pending.clear();
    }

    /// Stacks the committed set into one batch tensor with one-hot labels.
    ///
    /// Returns `None` when nothing has been committed. Vectors are assumed
    /// to share the dimensionality fixed by the extractor; labels must be
    /// valid positions below `num_classes`.
    pub fn stacked(&self, num_classes: usize) -> Option<(Array2<f32>, Array2<f32>)> {
        let first = self.committed.first()?;
        let dim = first.vector.len();
        let n = self.committed.len();

        let mut inputs = Array2::<f32>::zeros((n, dim));
        let mut targets = Array2::<f32>::zeros((n, num_classes));
        for (i, feature) in self.committed.iter().enumerate() {
            inputs.row_mut(i).assign(&feature.vector);
            targets[[i, feature.class_index]] = 1.0;
        }
        debug_assert_eq!(inputs.len_of(Axis(0)), targets.len_of(Axis(0)));
        Some((inputs, targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn vector(fill: f32) -> Array1<f32> {
        array![fill, fill + 1.0]
    }

    #[test]
    fn pending_queue_is_fifo() {
        let mut buffer = ExampleBuffer::new();
        assert_eq!(buffer.push_pending(0, RawCapture::Text("a".into())), 1);
        assert_eq!(buffer.push_pending(1, RawCapture::Text("b".into())), 2);
        let first = buffer.pop_pending().unwrap();
        assert_eq!(first.class_index, 0);
        let second = buffer.pop_pending().unwrap();
        assert_eq!(second.class_index, 1);
        assert!(buffer.pop_pending().is_none());
    }

    #[test]
    fn remove_class_relabels_higher_indices() {
        let mut buffer = ExampleBuffer::new();
        buffer.push_committed(0, vector(0.0));
        buffer.push_committed(1, vector(1.0));
        buffer.push_committed(1, vector(2.0));
        buffer.push_committed(2, vector(3.0));
        buffer.push_pending(2, RawCapture::Text("late".into()));

        buffer.remove_class(1);

        assert_eq!(buffer.committed_len(), 2);
        assert_eq!(buffer.count_for(0), 1);
        assert_eq!(buffer.count_for(1), 1);
        assert_eq!(buffer.count_for(2), 0);
        let pending = buffer.pop_pending().unwrap();
        assert_eq!(pending.class_index, 1);
    }

    #[test]
    fn clear_class_leaves_other_classes_untouched() {
        let mut buffer = ExampleBuffer::new();
        buffer.push_committed(0, vector(0.0));
        buffer.push_committed(1, vector(1.0));
        buffer.push_pending(0, RawCapture::Text("x".into()));
        buffer.push_pending(1, RawCapture::Text("y".into()));

        buffer.clear_class(0);

        assert_eq!(buffer.count_for(0), 0);
        assert_eq!(buffer.count_for(1), 1);
        assert_eq!(buffer.pending_len(), 1);
        assert_eq!(buffer.pop_pending().unwrap().class_index, 1);
    }

    #[test]
    fn stacked_builds_one_hot_targets() {
        let mut buffer = ExampleBuffer::new();
        buffer.push_committed(0, vector(0.0));
        buffer.push_committed(2, vector(1.0));

        let (inputs, targets) = buffer.stacked(3).unwrap();
        assert_eq!(inputs.shape(), &[2, 2]);
        assert_eq!(targets.shape(), &[2, 3]);
        assert_eq!(targets[[0, 0]], 1.0);
        assert_eq!(targets[[1, 2]], 1.0);
        assert_eq!(targets.sum(), 2.0);
    }

    #[test]
    fn stacked_is_none_when_empty() {
        let buffer = ExampleBuffer::new();
        assert!(buffer.stacked(2).is_none());
    }
}
