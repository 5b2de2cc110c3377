//! briny_saliency: gradient saliency maps on a lightweight autodiff engine.
//!
//! Computes SmoothGrad and guided backpropagation explanations for image
//! classifiers and regressors, on top of a minimal tensor + autograd core in
//! which every differentiable operation returns its output together with a
//! backward closure.
//!
//! # Features
//!
//! - SmoothGrad: input gradients averaged over Gaussian-perturbed copies of the input.
//! - Guided backpropagation: the same loop with negative gradients cut at every ReLU.
//! - Two model families (channels-first and channels-last) behind one dispatcher.
//! - Rescaling of preprocessed images back to the raw image's value range.
//!
//! # Modules
//!
//! - [`tensors`]: Core tensor data structures and operations.
//! - [`backprop`]: Differentiable operations and autograd utilities.
//! - [`ops`]: Raw parallel kernels.
//! - [`model`] / [`nn`]: The model capability trait and a sequential model.
//! - [`hooks`]: ReLU interceptors with scoped registration.
//! - [`image`]: Raw image container and model-input conversions.
//! - [`backend`]: Framework registry used for dispatch.
//! - [`explain`]: SmoothGrad, guided backpropagation and rescaling.
//!
//! # Example
//!
//! ```rust
//! use briny_saliency::backend::Framework;
//! use briny_saliency::explain::{guided_backprop, ExplainConfig, Mode};
//! use briny_saliency::image::Image;
//! use briny_saliency::nn::{Layer, Sequential};
//! use briny_saliency::tensor;
//!
//! let mut model = Sequential::new(
//!     Framework::ChannelsFirst,
//!     vec![
//!         Layer::Flatten,
//!         Layer::linear(tensor!([[1.0], [-1.0]]), tensor!([0.0])).unwrap(),
//!         Layer::Relu,
//!     ],
//! );
//! let image = Image::from_u8(vec![1, 1, 2, 1], &[3, 1]).unwrap();
//! let config = ExplainConfig::default()
//!     .with_mode(Mode::Regression)
//!     .with_num_samples(1)
//!     .with_sigma(0.0);
//!
//! let explanation = guided_backprop(&image, None, &mut model, None, &config).unwrap();
//! assert_eq!(explanation.gradients.data, vec![1.0, -1.0]);
//! ```

pub mod approx;
pub mod backend;
pub mod backprop;
pub mod error;
pub mod explain;
pub mod hooks;
pub mod image;
pub mod model;
pub mod nn;
pub mod ops;
pub mod tensors;

pub use error::{Error, Result};
pub use explain::{Explanation, guided_backprop, rescale, smooth_grad};
