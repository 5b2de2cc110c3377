//! Differentiable operations and autograd utilities.
//!
//! # Backpropagation Primitives
//!
//! Provides the operations saliency models are built from, each with a
//! backward closure that maps the gradient of the output to the gradient of
//! the input. Parameter gradients are never produced: explanations only need
//! `dL/d(input)`.
//!
//! **Key Features:**
//! - **Elementwise Activation (ReLU):** Zero-out negatives and propagate gradients accordingly.
//! - **Guided ReLU rule:** Clamp the incoming gradient and mask by the forward activation.
//! - **Linear:** `x · W + b` over a batch of row vectors.
//! - **Conv2d:** Stride-1 zero-padded convolution in either activation layout.
//! - **Flatten / Dropout:** Shape plumbing and train-time regularization.
//!
//! ## Autograd Pattern
//!
//! Each operation follows a simple pattern:
//! 1. **Inputs** are borrowed tensors; parameters are borrowed for the closure's lifetime.
//! 2. **Forward Pass** computes an output tensor.
//! 3. **Backward Pass** returns a closure capturing minimal cloned data to compute gradients.
//!
//! ## Usage Guidelines
//!
//! - Shape mismatches surface as [`Error::Shape`], both forward and backward.
//! - The backward closures implement `Fn`, allowing multiple invocations if needed.

use rand::Rng;

use crate::error::{Error, Result};
use crate::ops::cpu::{self, ConvGeometry, Layout};
use crate::tensors::Tensor;

/// Maps `dL/d(output)` to `dL/d(input)`.
pub type BackFn<'a> = Box<dyn Fn(&Tensor<f32>) -> Result<Tensor<f32>> + 'a>;

fn expect_shape(grad: &Tensor<f32>, shape: &[usize]) -> Result<()> {
    if grad.shape != shape {
        return Err(Error::Shape(format!(
            "upstream gradient {:?} does not match output {:?}",
            grad.shape, shape
        )));
    }
    Ok(())
}

/// Applies the ReLU activation (Rectified Linear Unit): `max(0, x)` elementwise.
///
/// # Returns
/// - `out`: Tensor with negatives zeroed.
/// - `back`: Closure passing gradients only where input > 0.
///
/// # Example
/// ```rust
/// use briny_saliency::tensor;
///
/// let input = tensor!([[3.0, -3.0], [9.0, 0.0]]);
/// let (out, back) = briny_saliency::backprop::relu(&input);
/// let grad_in = back(&tensor!([[2.0, 4.0], [6.0, 3.0]])).unwrap();
/// assert_eq!(grad_in.data, vec![2.0, 0.0, 6.0, 0.0]);
/// ```
pub fn relu(input: &Tensor<f32>) -> (Tensor<f32>, BackFn<'static>) {
    let out = Tensor::new(input.shape.clone(), cpu::relu(&input.data));
    let saved = input.clone();

    let back = move |grad: &Tensor<f32>| {
        expect_shape(grad, &saved.shape)?;
        Ok(Tensor::new(
            saved.shape.clone(),
            cpu::relu_backward(&saved.data, &grad.data),
        ))
    };

    (out, Box::new(back))
}

/// Guided backpropagation through a ReLU whose forward output was `activation`.
///
/// Computes `1[activation > 0] * max(grad, 0)`: positions that were inactive
/// in the forward pass and negative gradient contributions are both zeroed.
pub fn guided_relu(activation: &Tensor<f32>, grad: &Tensor<f32>) -> Result<Tensor<f32>> {
    expect_shape(grad, &activation.shape)?;
    Ok(Tensor::new(
        activation.shape.clone(),
        cpu::guided_relu_backward(&activation.data, &grad.data),
    ))
}

/// Affine map `x · W + b` for a batch `x` (n×in), `W` (in×out), `b` (out).
///
/// # Returns
/// - Output tensor (n×out)
/// - Closure computing `dL/dx = dL/dy · Wᵀ`
pub fn linear<'a>(
    input: &Tensor<f32>,
    weight: &'a Tensor<f32>,
    bias: &'a Tensor<f32>,
) -> Result<(Tensor<f32>, BackFn<'a>)> {
    let [features, units] = weight.shape[..] else {
        return Err(Error::Shape(format!("weight must be 2-D, got {:?}", weight.shape)));
    };
    if bias.shape != [units] {
        return Err(Error::Shape(format!(
            "bias {:?} does not match {units} units",
            bias.shape
        )));
    }
    let [rows, cols] = input.shape[..] else {
        return Err(Error::Shape(format!(
            "linear input must be 2-D, got {:?}",
            input.shape
        )));
    };
    if cols != features {
        return Err(Error::Shape(format!(
            "linear input has {cols} features, weight expects {features}"
        )));
    }

    let mut data = cpu::matmul(&input.data, &weight.data, rows, features, units);
    data.chunks_mut(units.max(1))
        .for_each(|row| row.iter_mut().zip(&bias.data).for_each(|(y, b)| *y += b));
    let out = Tensor::new(vec![rows, units], data);

    let back = move |grad: &Tensor<f32>| {
        expect_shape(grad, &[rows, units])?;
        let weight_t = cpu::transpose(&weight.data, features, units);
        Ok(Tensor::new(
            vec![rows, features],
            cpu::matmul(&grad.data, &weight_t, rows, units, features),
        ))
    };

    Ok((out, Box::new(back)))
}

/// Stride-1 2-D convolution with `padding` zeros on every border.
///
/// `weight` is `out×in×kh×kw` and `bias` is `out`; `input` is `N×C×H×W` for
/// [`Layout::Nchw`] and `N×H×W×C` for [`Layout::Nhwc`]. The output keeps the
/// input's layout.
pub fn conv2d<'a>(
    input: &Tensor<f32>,
    weight: &'a Tensor<f32>,
    bias: &'a Tensor<f32>,
    padding: usize,
    layout: Layout,
) -> Result<(Tensor<f32>, BackFn<'a>)> {
    let [out_channels, in_channels, kernel_h, kernel_w] = weight.shape[..] else {
        return Err(Error::Shape(format!("kernel must be 4-D, got {:?}", weight.shape)));
    };
    if bias.shape != [out_channels] {
        return Err(Error::Shape(format!(
            "bias {:?} does not match {out_channels} filters",
            bias.shape
        )));
    }
    let [batch, a, b, c] = input.shape[..] else {
        return Err(Error::Shape(format!(
            "conv2d input must be 4-D, got {:?}",
            input.shape
        )));
    };
    let (channels, height, width) = match layout {
        Layout::Nchw => (a, b, c),
        Layout::Nhwc => (c, a, b),
    };
    if channels != in_channels {
        return Err(Error::Shape(format!(
            "conv2d input has {channels} channels, kernel expects {in_channels}"
        )));
    }

    let geometry = ConvGeometry {
        batch,
        in_channels,
        height,
        width,
        out_channels,
        kernel_h,
        kernel_w,
        padding,
        layout,
    };
    if geometry.out_h() == 0 || geometry.out_w() == 0 {
        return Err(Error::Shape(format!(
            "{kernel_h}x{kernel_w} kernel does not fit a {height}x{width} image with padding {padding}"
        )));
    }

    let out_shape = geometry.out_shape();
    let out = Tensor::new(
        out_shape.clone(),
        cpu::conv2d(&input.data, &weight.data, &bias.data, &geometry),
    );
    let in_shape = input.shape.clone();

    let back = move |grad: &Tensor<f32>| {
        expect_shape(grad, &out_shape)?;
        Ok(Tensor::new(
            in_shape.clone(),
            cpu::conv2d_input_grad(&grad.data, &weight.data, &geometry),
        ))
    };

    Ok((out, Box::new(back)))
}

/// Collapses every axis after the first: `N×…` becomes `N×(∏…)`.
pub fn flatten(input: &Tensor<f32>) -> Result<(Tensor<f32>, BackFn<'static>)> {
    let Some((&batch, rest)) = input.shape.split_first() else {
        return Err(Error::Shape("cannot flatten a scalar".to_string()));
    };
    let features = rest.iter().product::<usize>();
    let in_shape = input.shape.clone();
    let out = input.clone().reshape(vec![batch, features])?;

    let back = move |grad: &Tensor<f32>| {
        expect_shape(grad, &[batch, features])?;
        grad.clone().reshape(in_shape.clone())
    };

    Ok((out, Box::new(back)))
}

/// Inverted dropout: zeroes each element with probability `p` and scales survivors by `1/(1-p)`.
///
/// The same mask is reused by the backward closure.
pub fn dropout<R: Rng>(
    input: &Tensor<f32>,
    p: f32,
    rng: &mut R,
) -> (Tensor<f32>, BackFn<'static>) {
    let keep = 1.0 - p;
    let mask: Vec<f32> = input
        .data
        .iter()
        .map(|_| if keep > 0.0 && rng.random::<f32>() < keep { 1.0 / keep } else { 0.0 })
        .collect();
    let mask = Tensor::new(input.shape.clone(), mask);
    let out = Tensor::new(
        input.shape.clone(),
        input.data.iter().zip(&mask.data).map(|(x, m)| x * m).collect(),
    );

    let back = move |grad: &Tensor<f32>| {
        expect_shape(grad, &mask.shape)?;
        Ok(Tensor::new(
            mask.shape.clone(),
            grad.data.iter().zip(&mask.data).map(|(g, m)| g * m).collect(),
        ))
    };

    (out, Box::new(back))
}
