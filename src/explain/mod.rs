//! SmoothGrad and guided backpropagation.
//!
//! # Algorithm
//!
//! For a batch of images and a differentiable model:
//!
//! 1. The model is dispatched to its framework backend; channels-first models
//!    are switched to evaluation mode.
//! 2. The working input is the preprocessed image, or the raw array in the
//!    model's layout.
//! 3. A baseline forward pass settles the target labels (classification
//!    only): a single label is broadcast, a label list must match the batch,
//!    and no labels means the arg-max class of each image.
//! 4. `num_samples` times, Gaussian noise with standard deviation
//!    `sigma * (max(input) - min(input))` is added to the input, and the
//!    gradient of the selected scores (or of the whole output for regression)
//!    w.r.t. the noisy input is accumulated.
//! 5. The mean gradient is returned channel-last, `N×H×W×C`, with the labels.
//!
//! Guided backpropagation runs the same loop with a [`GuidedRelu`](crate::hooks::GuidedRelu)
//! interceptor registered on the model for the duration of the call, so
//! negative gradients are cut at every ReLU. With `num_samples = 1` and
//! `sigma = 0` it is plain guided backpropagation.
//!
//! # Example
//!
//! ```rust
//! use briny_saliency::backend::Framework;
//! use briny_saliency::explain::{smooth_grad, ExplainConfig};
//! use briny_saliency::image::Image;
//! use briny_saliency::nn::{Layer, Sequential};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let mut model = Sequential::new(
//!     Framework::ChannelsLast,
//!     vec![Layer::Flatten, Layer::linear_init(4 * 4 * 3, 10, &mut rng)],
//! );
//! let image = Image::from_u8(vec![1, 4, 4, 3], &[128; 48]).unwrap();
//! let config = ExplainConfig::default().with_num_samples(4).with_seed(1);
//!
//! let explanation = smooth_grad(&image, None, &mut model, None, &config).unwrap();
//! assert_eq!(explanation.gradients.shape, vec![1, 4, 4, 3]);
//! assert_eq!(explanation.labels.map(|l| l.len()), Some(1));
//! ```

mod config;
mod engine;
mod labels;
mod noise;
mod rescale;

pub use config::{ExplainConfig, Mode};
pub use engine::{GradientBackend, backend_for, dispatch, input_gradient};
pub use labels::Target;
pub use noise::NoiseSampler;
pub use rescale::rescale;

use crate::backend::Frameworks;
use crate::error::Result;
use crate::image::{Image, Preprocess};
use crate::model::Model;
use crate::tensors::Tensor;

use engine::Pass;

/// Averaged input gradients and the labels they were taken for.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    /// `N×H×W×C` gradients.
    pub gradients: Tensor<f32>,
    /// Target label per image; `None` in regression mode.
    pub labels: Option<Vec<usize>>,
}

/// SmoothGrad explainer bound to a configuration and a framework registry.
#[derive(Debug, Clone, Default)]
pub struct SmoothGrad {
    config: ExplainConfig,
    frameworks: Option<Frameworks>,
}

impl SmoothGrad {
    /// An explainer dispatching through [`Frameworks::global`].
    pub fn new(config: ExplainConfig) -> Self {
        Self {
            config,
            frameworks: None,
        }
    }

    /// Uses `frameworks` instead of the process-wide registry.
    pub fn with_frameworks(mut self, frameworks: Frameworks) -> Self {
        self.frameworks = Some(frameworks);
        self
    }

    /// The configuration every call to `explain` uses.
    pub fn config(&self) -> &ExplainConfig {
        &self.config
    }

    /// Explains `image` under `model`.
    pub fn explain(
        &self,
        model: &mut dyn Model,
        image: &Image,
        preprocess: Option<&Preprocess<'_>>,
        target: Option<Target>,
    ) -> Result<Explanation> {
        let frameworks = self.frameworks.as_ref().unwrap_or_else(|| Frameworks::global());
        engine::run(
            frameworks,
            Pass::Plain,
            model,
            image,
            preprocess,
            target,
            &self.config,
        )
    }
}

/// Guided backpropagation explainer bound to a configuration and a framework registry.
#[derive(Debug, Clone, Default)]
pub struct GuidedBackprop {
    config: ExplainConfig,
    frameworks: Option<Frameworks>,
}

impl GuidedBackprop {
    /// An explainer dispatching through [`Frameworks::global`].
    pub fn new(config: ExplainConfig) -> Self {
        Self {
            config,
            frameworks: None,
        }
    }

    /// Uses `frameworks` instead of the process-wide registry.
    pub fn with_frameworks(mut self, frameworks: Frameworks) -> Self {
        self.frameworks = Some(frameworks);
        self
    }

    /// The configuration every call to `explain` uses.
    pub fn config(&self) -> &ExplainConfig {
        &self.config
    }

    /// Explains `image` under `model`; the model must expose ReLU hooks.
    pub fn explain(
        &self,
        model: &mut dyn Model,
        image: &Image,
        preprocess: Option<&Preprocess<'_>>,
        target: Option<Target>,
    ) -> Result<Explanation> {
        let frameworks = self.frameworks.as_ref().unwrap_or_else(|| Frameworks::global());
        engine::run(
            frameworks,
            Pass::Guided,
            model,
            image,
            preprocess,
            target,
            &self.config,
        )
    }
}

/// SmoothGrad with the process-wide framework registry.
///
/// # Errors
/// - [`Error::InvalidArgument`](crate::Error::InvalidArgument) for `num_samples == 0` or a bad `sigma`.
/// - [`Error::UnsupportedModel`](crate::Error::UnsupportedModel) when no enabled framework claims `model`.
/// - [`Error::LabelMismatch`](crate::Error::LabelMismatch) when a label list does not match the batch.
pub fn smooth_grad(
    image: &Image,
    target: Option<Target>,
    model: &mut dyn Model,
    preprocess: Option<&Preprocess<'_>>,
    config: &ExplainConfig,
) -> Result<Explanation> {
    engine::run(
        Frameworks::global(),
        Pass::Plain,
        model,
        image,
        preprocess,
        target,
        config,
    )
}

/// Guided backpropagation with the process-wide framework registry.
///
/// Fails like [`smooth_grad`], and with
/// [`Error::InvalidArgument`](crate::Error::InvalidArgument) if the model exposes no ReLU hooks.
pub fn guided_backprop(
    image: &Image,
    target: Option<Target>,
    model: &mut dyn Model,
    preprocess: Option<&Preprocess<'_>>,
    config: &ExplainConfig,
) -> Result<Explanation> {
    engine::run(
        Frameworks::global(),
        Pass::Guided,
        model,
        image,
        preprocess,
        target,
        config,
    )
}
