//! ReLU interceptors for modified backward passes.
//!
//! A model exposes one [`HookSlot`]; every ReLU it runs reports its forward
//! output to the registered [`ReluHook`] and lets the hook replace the
//! gradient flowing back through it. Registration is scoped: the returned
//! [`HookHandle`] empties the slot when dropped, on success and on every
//! error path alike.
//!
//! ```text
//! Idle ──register──▶ Registered ──forward──▶ (stack grows)
//!                                   │
//!                                backward──▶ (stack shrinks)
//!                                   │
//! Idle ◀──────────── drop(handle) ◀─┘
//! ```
//!
//! The slot lives in a `RefCell`, so a hooked model cannot be shared across
//! threads and two interceptors can never be active on one model at once.

use std::cell::RefCell;
use std::fmt;

use crate::backprop::guided_relu;
use crate::error::{Error, Result};
use crate::tensors::Tensor;

/// Observes ReLU forward outputs and rewrites the gradients flowing back through them.
pub trait ReluHook {
    /// Called with each ReLU's output, in forward order.
    fn on_forward(&mut self, activation: &Tensor<f32>);

    /// Called with the gradient w.r.t. a ReLU's output, in reverse forward order.
    ///
    /// Returns the gradient to propagate to the ReLU's input.
    fn on_backward(&mut self, grad_output: &Tensor<f32>) -> Result<Tensor<f32>>;
}

/// Guided backpropagation interceptor.
///
/// Activations are kept on a stack: the last activation recorded pairs with
/// the next backward call, mirroring the reverse order of the forward pass.
#[derive(Debug, Default)]
pub struct GuidedRelu {
    activations: Vec<Tensor<f32>>,
}

impl GuidedRelu {
    /// Records an activation.
    pub fn push(&mut self, activation: Tensor<f32>) {
        self.activations.push(activation);
    }

    /// Removes and returns the most recently recorded activation.
    pub fn pop(&mut self) -> Option<Tensor<f32>> {
        self.activations.pop()
    }

    /// Number of activations still waiting for their backward call.
    pub fn depth(&self) -> usize {
        self.activations.len()
    }
}

impl ReluHook for GuidedRelu {
    fn on_forward(&mut self, activation: &Tensor<f32>) {
        self.push(activation.clone());
    }

    fn on_backward(&mut self, grad_output: &Tensor<f32>) -> Result<Tensor<f32>> {
        let activation = self.pop().ok_or_else(|| {
            Error::Hook("backward reached a ReLU with no recorded activation".to_string())
        })?;
        guided_relu(&activation, grad_output)
    }
}

/// The place a model keeps its (at most one) registered ReLU interceptor.
#[derive(Default)]
pub struct HookSlot {
    hook: RefCell<Option<Box<dyn ReluHook>>>,
}

impl fmt::Debug for HookSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSlot")
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl HookSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook` until the returned handle is dropped.
    ///
    /// # Errors
    /// Fails with [`Error::Hook`] if another interceptor is already registered.
    pub fn register(&self, hook: Box<dyn ReluHook>) -> Result<HookHandle<'_>> {
        let mut slot = self
            .hook
            .try_borrow_mut()
            .map_err(|_| Error::Hook("hook slot is in use".to_string()))?;
        if slot.is_some() {
            return Err(Error::Hook(
                "an interceptor is already registered on this model".to_string(),
            ));
        }
        *slot = Some(hook);
        tracing::trace!("relu interceptor registered");
        Ok(HookHandle { slot: self })
    }

    /// Whether an interceptor is currently registered.
    pub fn is_registered(&self) -> bool {
        self.hook.try_borrow().map_or(true, |h| h.is_some())
    }

    /// Reports a ReLU output to the registered interceptor, if any.
    pub fn forward(&self, activation: &Tensor<f32>) {
        if let Some(hook) = self.hook.borrow_mut().as_mut() {
            hook.on_forward(activation);
        }
    }

    /// Lets the registered interceptor rewrite a ReLU gradient.
    ///
    /// Returns `None` when no interceptor is registered, in which case the
    /// ordinary ReLU gradient applies.
    pub fn backward(&self, grad_output: &Tensor<f32>) -> Option<Result<Tensor<f32>>> {
        self.hook
            .borrow_mut()
            .as_mut()
            .map(|hook| hook.on_backward(grad_output))
    }

    fn release(&self) {
        if self.hook.borrow_mut().take().is_some() {
            tracing::trace!("relu interceptor released");
        }
    }
}

/// Scoped registration of an interceptor; dropping it empties the slot.
#[must_use = "the interceptor is removed as soon as the handle is dropped"]
pub struct HookHandle<'a> {
    slot: &'a HookSlot,
}

impl fmt::Debug for HookHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookHandle").finish_non_exhaustive()
    }
}

impl HookHandle<'_> {
    /// Removes the interceptor now instead of at end of scope.
    pub fn remove(self) {}
}

impl Drop for HookHandle<'_> {
    fn drop(&mut self) {
        self.slot.release();
    }
}
