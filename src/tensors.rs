//! Core tensor data structures and operations.
//!
//! # Core Tensor Utilities
//!
//! This module defines the row-major N-dimensional array every other module
//! computes with, and the `WithGrad` wrapper used to track the gradient of a
//! perturbed input.
//!
//! It supports:
//! - Construction of N-dimensional tensors with shape and row-major data layout
//! - Validated construction through [`briny`] (`Tensor::try_new`)
//! - Axis manipulation: reshape, squeeze, permute
//! - Reductions used by the explainers: min, max, arg-max over the last axis
//! - Elementwise maps and accumulation
//! - Compile-time tensor literals with [`tensor!`](crate::tensor)
//!
//! ## Design Highlights
//! - Tensors are strongly typed: `Tensor<T>` for any element type (usually `f32`)
//! - Shape is stored as a `Vec<usize>` and enforced at runtime
//! - `WithGrad<T>` pairs any value with its gradient
//!
//! ## Limitations
//! - Row-major only
//! - No broadcasting
//!
//! ## Example
//!
//! ```rust
//! use briny_saliency::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! ```

use briny::prelude::*;

use crate::error::{Error, Result};

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - All elements must be the same type (`T`).
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

impl<T> Validate for Tensor<T> {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        if self.shape.iter().product::<usize>() != self.data.len() {
            return Err(ValidationError);
        }
        Ok(())
    }
}

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Creates a new tensor, rejecting data whose length does not match the shape.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] on a shape/data mismatch.
    pub fn try_new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Result<Self> {
        let raw = Self {
            shape: shape.into(),
            data,
        };
        Ok(TrustedData::new(raw)?.into_inner())
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Reinterprets the data under a new shape with the same element count.
    pub fn reshape(self, shape: impl Into<Vec<usize>>) -> Result<Self> {
        let shape = shape.into();
        if shape.iter().product::<usize>() != self.data.len() {
            return Err(Error::Shape(format!(
                "cannot reshape {:?} into {:?}",
                self.shape, shape
            )));
        }
        Ok(Self {
            shape,
            data: self.data,
        })
    }

    /// Drops every axis of length 1.
    pub fn squeeze(self) -> Self {
        let shape = self.shape.iter().copied().filter(|&d| d != 1).collect();
        Self {
            shape,
            data: self.data,
        }
    }

    /// Applies `f` to every element, keeping the shape.
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> Tensor<U> {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl<T: Copy> Tensor<T> {
    /// Creates a tensor of `shape` with every element set to `value`.
    pub fn full(shape: impl Into<Vec<usize>>, value: T) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![value; len],
        }
    }

    /// Reorders axes so that output axis `i` is input axis `axes[i]`.
    ///
    /// `permute(&[0, 2, 3, 1])` turns `N×C×H×W` into `N×H×W×C`.
    ///
    /// # Errors
    /// Fails if `axes` is not a permutation of `0..rank`.
    pub fn permute(&self, axes: &[usize]) -> Result<Self> {
        let rank = self.rank();
        let mut seen = vec![false; rank];
        if axes.len() != rank
            || axes
                .iter()
                .any(|&a| a >= rank || std::mem::replace(&mut seen[a], true))
        {
            return Err(Error::Shape(format!(
                "{axes:?} is not a permutation of the axes of {:?}",
                self.shape
            )));
        }

        let in_strides = strides(&self.shape);
        let out_shape: Vec<usize> = axes.iter().map(|&a| self.shape[a]).collect();
        let src_strides: Vec<usize> = axes.iter().map(|&a| in_strides[a]).collect();

        let mut data = Vec::with_capacity(self.data.len());
        let mut index = vec![0usize; rank];
        for _ in 0..self.data.len() {
            let offset: usize = index.iter().zip(&src_strides).map(|(i, s)| i * s).sum();
            data.push(self.data[offset]);
            for axis in (0..rank).rev() {
                index[axis] += 1;
                if index[axis] < out_shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }

        Ok(Self {
            shape: out_shape,
            data,
        })
    }
}

impl Tensor<f32> {
    /// Creates a zero-filled tensor.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        Self::full(shape, 0.0)
    }

    /// Smallest element, `+inf` for an empty tensor.
    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Largest element, `-inf` for an empty tensor.
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Index of the largest element along the last axis, one per leading row.
    ///
    /// Ties resolve to the first index, like `numpy.argmax`.
    pub fn argmax_last_axis(&self) -> Result<Vec<usize>> {
        let width = match self.shape.last() {
            Some(&w) if w > 0 => w,
            _ => {
                return Err(Error::Shape(format!(
                    "arg-max needs a non-empty last axis, got {:?}",
                    self.shape
                )));
            }
        };

        Ok(self
            .data
            .chunks(width)
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |(best, best_val), (i, &v)| {
                        if v > best_val { (i, v) } else { (best, best_val) }
                    })
                    .0
            })
            .collect())
    }

    /// Elementwise `self += other`.
    pub fn add_assign(&mut self, other: &Tensor<f32>) -> Result<()> {
        if self.shape != other.shape {
            return Err(Error::Shape(format!(
                "cannot add {:?} to {:?}",
                other.shape, self.shape
            )));
        }
        self.data
            .iter_mut()
            .zip(&other.data)
            .for_each(|(a, b)| *a += b);
        Ok(())
    }

    /// Multiplies every element by `factor`.
    pub fn scale(mut self, factor: f32) -> Self {
        self.data.iter_mut().for_each(|x| *x *= factor);
        self
    }
}

impl Tensor<f64> {
    /// Narrows every element to `f32`, the engine's default precision.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_f32(&self) -> Tensor<f32> {
        self.map(|&x| x as f32)
    }
}

/// Row-major strides for `shape`.
pub(crate) fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// A container for tracking gradients of values (used in autograd).
///
/// Typically used as `WithGrad<Tensor<f32>>` for an input whose gradient is requested.
#[derive(Debug, Clone)]
pub struct WithGrad<T> {
    pub value: T,
    pub grad: T,
}

impl WithGrad<Tensor<f32>> {
    /// Starts tracking `value` with a zero gradient.
    pub fn new(value: Tensor<f32>) -> Self {
        let grad = Tensor::zeros(value.shape.clone());
        Self { value, grad }
    }

    /// Drops the gradient, keeping only the value.
    pub fn detach(self) -> Tensor<f32> {
        self.value
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use briny_saliency::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::<f32>::new(Vec::<usize>::new(), vec![$lit])
    };

    ([ $( $lit:literal ),+ $(,)? ]) => {{
        let data: Vec<f32> = vec![ $( $lit ),+ ];
        $crate::tensors::Tensor::<f32>::new(vec![data.len()], data)
    }};

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::<f32>::new(shape, data)
    }};
}
