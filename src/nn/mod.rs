//! Minimal model building blocks.
//!
//! [`Sequential`] covers the classifiers and regressors the explainers are
//! exercised with: convolutions, dense layers, ReLU, flatten and dropout, in
//! either the channels-first or channels-last family. Anything more exotic
//! implements [`Model`](crate::model::Model) directly.

mod layers;
mod sequential;

pub use layers::Layer;
pub use sequential::Sequential;
