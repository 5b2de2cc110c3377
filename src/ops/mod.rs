//! # Numeric Kernels
//!
//! Raw, autograd-free kernels used by [`crate::backprop`].
//!
//! ## Submodules
//!
//! - [`cpu`]: Multi-threaded + SIMD CPU kernels
//!
//! Accelerator kernels are not provided: every model family computes on the
//! host, so gradients are already host-resident when they are accumulated.
//!
//! ## Feature Flags
//!
//! - `simd`: Enables AVX2-accelerated CPU paths

pub mod cpu;
