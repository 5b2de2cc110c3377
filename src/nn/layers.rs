//! Layers a [`Sequential`](super::Sequential) model is built from.

use rand::Rng;
use rand::distr::{Distribution, Uniform};

use crate::error::{Error, Result};
use crate::tensors::Tensor;

/// One step of a sequential model.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    /// `x · W + b` with `W` of shape `in×out`.
    Linear {
        weight: Tensor<f32>,
        bias: Tensor<f32>,
    },
    /// Stride-1 convolution with `weight` of shape `out×in×kh×kw`.
    Conv2d {
        weight: Tensor<f32>,
        bias: Tensor<f32>,
        padding: usize,
    },
    /// Rectified linear activation; the only layer ReLU interceptors see.
    Relu,
    /// Collapses every axis after the batch axis.
    Flatten,
    /// Inverted dropout, active only in training mode.
    Dropout { p: f32 },
}

impl Layer {
    /// A linear layer from explicit parameters.
    ///
    /// # Errors
    /// Fails if `weight` is not 2-D or `bias` does not have one entry per unit.
    pub fn linear(weight: Tensor<f32>, bias: Tensor<f32>) -> Result<Self> {
        match weight.shape[..] {
            [_, units] if bias.shape == [units] => Ok(Self::Linear { weight, bias }),
            _ => Err(Error::Shape(format!(
                "linear layer needs weight in×out and bias out, got {:?} and {:?}",
                weight.shape, bias.shape
            ))),
        }
    }

    /// A linear layer with Glorot-uniform weights and zero bias.
    pub fn linear_init<R: Rng>(inputs: usize, units: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (inputs + units).max(1) as f32).sqrt();
        Self::Linear {
            weight: uniform(vec![inputs, units], limit, rng),
            bias: Tensor::zeros(vec![units]),
        }
    }

    /// A convolution from explicit parameters.
    ///
    /// # Errors
    /// Fails if `weight` is not 4-D or `bias` does not have one entry per filter.
    pub fn conv2d(weight: Tensor<f32>, bias: Tensor<f32>, padding: usize) -> Result<Self> {
        match weight.shape[..] {
            [filters, _, _, _] if bias.shape == [filters] => Ok(Self::Conv2d {
                weight,
                bias,
                padding,
            }),
            _ => Err(Error::Shape(format!(
                "conv2d needs weight out×in×kh×kw and bias out, got {:?} and {:?}",
                weight.shape, bias.shape
            ))),
        }
    }

    /// A square-kernel convolution with Glorot-uniform weights and zero bias.
    pub fn conv2d_init<R: Rng>(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        padding: usize,
        rng: &mut R,
    ) -> Self {
        let fan = (in_channels + out_channels) * kernel * kernel;
        let limit = (6.0 / fan.max(1) as f32).sqrt();
        Self::Conv2d {
            weight: uniform(vec![out_channels, in_channels, kernel, kernel], limit, rng),
            bias: Tensor::zeros(vec![out_channels]),
            padding,
        }
    }

    /// A dropout layer.
    ///
    /// # Errors
    /// Fails unless `0 <= p < 1`.
    pub fn dropout(p: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(Error::InvalidArgument(format!(
                "dropout probability must be in [0, 1), got {p}"
            )));
        }
        Ok(Self::Dropout { p })
    }
}

fn uniform<R: Rng>(shape: Vec<usize>, limit: f32, rng: &mut R) -> Tensor<f32> {
    let len = shape.iter().product();
    let data = match Uniform::new_inclusive(-limit, limit) {
        Ok(dist) => dist.sample_iter(rng).take(len).collect(),
        Err(_) => vec![0.0; len],
    };
    Tensor::new(shape, data)
}
