//! The capability interface every explainable model implements.
//!
//! A [`Model`] reports which [`Framework`] it belongs to, optionally toggles
//! into evaluation mode, and records a [`Trace`]: the forward output paired
//! with a one-shot backward pass that maps `dL/d(output)` to `dL/d(input)`.
//! Models that want guided backpropagation also expose a [`HookSlot`].

use std::fmt;

use crate::backend::Framework;
use crate::error::{Error, Result};
use crate::hooks::HookSlot;
use crate::tensors::Tensor;

type TraceBackFn<'a> = Box<dyn FnOnce(&Tensor<f32>) -> Result<Tensor<f32>> + 'a>;

/// Forward output plus the deferred backward pass that produced it.
///
/// Consumed by [`Trace::backward`], so no graph outlives a single gradient.
pub struct Trace<'a> {
    pub output: Tensor<f32>,
    backward: TraceBackFn<'a>,
}

impl fmt::Debug for Trace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trace")
            .field("output_shape", &self.output.shape)
            .finish_non_exhaustive()
    }
}

impl<'a> Trace<'a> {
    /// Pairs an output with the closure that differentiates it.
    pub fn new(
        output: Tensor<f32>,
        backward: impl FnOnce(&Tensor<f32>) -> Result<Tensor<f32>> + 'a,
    ) -> Self {
        Self {
            output,
            backward: Box::new(backward),
        }
    }

    /// Runs the backward pass seeded with `grad_output` (same shape as the output).
    ///
    /// # Errors
    /// Fails on a seed/output shape mismatch or if any op's backward fails.
    pub fn backward(self, grad_output: &Tensor<f32>) -> Result<Tensor<f32>> {
        if grad_output.shape != self.output.shape {
            return Err(Error::Shape(format!(
                "backward seed {:?} does not match output {:?}",
                grad_output.shape, self.output.shape
            )));
        }
        (self.backward)(grad_output)
    }
}

/// A differentiable image model.
pub trait Model {
    /// The family this model belongs to, `None` if it belongs to neither.
    fn framework(&self) -> Option<Framework>;

    /// Concrete type name, reported when no framework claims the model.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Switches to inference behaviour (e.g. disables dropout).
    fn eval(&mut self) {}

    /// Runs a forward pass and keeps what is needed to differentiate it.
    fn trace(&self, input: &Tensor<f32>) -> Result<Trace<'_>>;

    /// Runs a forward pass only.
    fn forward(&self, input: &Tensor<f32>) -> Result<Tensor<f32>> {
        Ok(self.trace(input)?.output)
    }

    /// Where ReLU interceptors are registered, if the model supports them.
    fn relu_hooks(&self) -> Option<&HookSlot> {
        None
    }
}
