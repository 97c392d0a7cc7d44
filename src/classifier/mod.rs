mod model;
mod trainer;

pub use model::SoftmaxHead;
pub use trainer::{fit, fit_epoch, TrainingConfig, TrainingRun, TrainingStatus};

/// Information about a trained classifier head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadInfo {
    /// Input dimensionality, fixed by the feature extractor.
    pub input_dim: usize,
    /// Width of the dense hidden layer.
    pub hidden_dim: usize,
    /// Number of output classes at training time.
    pub num_classes: usize,
}
