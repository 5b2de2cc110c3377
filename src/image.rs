//! Raw image container and model-input conversions.
//!
//! # Image Storage
//!
//! An [`Image`] always stores a batched, channel-last array (`N×H×W×C`),
//! whatever layout it was built from:
//!
//! - unbatched data gets a leading batch axis of 1,
//! - grayscale data (`N×H×W`) gets a trailing channel axis of 1,
//! - channel-first data (`N×C×H×W`) is permuted to channel-last.
//!
//! # Model Inputs
//!
//! Preprocessing functions return a [`ModelInput`]: an engine tensor, a
//! gradient-tracked tensor, or a double-precision host array. Converting one
//! to a plain `Tensor<f32>` first tries to detach it (the primary path) and
//! otherwise falls back to a host conversion, which is logged at `trace`.

use briny::prelude::*;

use crate::error::{Error, Result};
use crate::tensors::{Tensor, WithGrad};

/// A caller-supplied transform from a raw image to the model's input.
pub type Preprocess<'a> = dyn Fn(&Image) -> Result<ModelInput> + 'a;

/// A batch of images, stored channel-last.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    data: Tensor<f32>,
}

impl Validate for Image {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        if self.data.rank() != 4 || !self.data.data.iter().all(|v| v.is_finite()) {
            return Err(ValidationError);
        }
        Ok(())
    }
}

impl Image {
    /// Builds an image from `data`.
    ///
    /// - `batched`: whether the leading axis is the batch axis.
    /// - `channel_last`: whether channels come after the spatial axes.
    ///
    /// # Errors
    /// - [`Error::InvalidImage`] if the data does not have 2 to 4 axes once batched.
    /// - [`Error::Validation`] if any pixel is not finite.
    pub fn new(data: Tensor<f32>, batched: bool, channel_last: bool) -> Result<Self> {
        let mut data = data;
        if !batched {
            data.shape.insert(0, 1);
        }

        match data.rank() {
            3 => data.shape.push(1),
            4 if !channel_last => data = data.permute(&[0, 2, 3, 1])?,
            4 => {}
            _ => {
                return Err(Error::InvalidImage(format!(
                    "expected (batch, height, width[, channels]) data, got shape {:?}",
                    data.shape
                )));
            }
        }

        Ok(TrustedData::new(Self { data })?.into_inner())
    }

    /// Builds a batched, channel-last image from 8-bit pixels.
    ///
    /// # Errors
    /// Fails if `pixels` does not fill `shape`, or `shape` is not `N×H×W×C`.
    pub fn from_u8(shape: impl Into<Vec<usize>>, pixels: &[u8]) -> Result<Self> {
        let data = Tensor::try_new(shape, pixels.iter().map(|&p| f32::from(p)).collect())?;
        if data.rank() != 4 {
            return Err(Error::InvalidImage(format!(
                "8-bit images must be (batch, height, width, channels), got {:?}",
                data.shape
            )));
        }
        Self::new(data, true, true)
    }

    /// Number of images in the batch.
    pub fn len(&self) -> usize {
        self.data.shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `[batch, height, width, channels]`.
    pub fn shape(&self) -> &[usize] {
        &self.data.shape
    }

    /// The channel-last pixel array.
    pub fn as_array(&self) -> &Tensor<f32> {
        &self.data
    }

    /// A copy of the channel-last pixel array.
    pub fn to_array(&self) -> Tensor<f32> {
        self.data.clone()
    }
}

/// Whatever a preprocessing function hands to the model.
#[derive(Debug, Clone)]
pub enum ModelInput {
    /// An engine tensor.
    Tensor(Tensor<f32>),
    /// A tensor that was tracking its gradient.
    Tracked(WithGrad<Tensor<f32>>),
    /// A double-precision host array.
    Array(Tensor<f64>),
}

impl ModelInput {
    /// Primary conversion: detach an engine tensor from any gradient it tracks.
    ///
    /// Gives the input back unchanged when it is not an engine tensor.
    pub fn try_detach(self) -> core::result::Result<Tensor<f32>, Self> {
        match self {
            Self::Tensor(t) => Ok(t),
            Self::Tracked(t) => Ok(t.detach()),
            other => Err(other),
        }
    }

    /// Secondary conversion: copy a host array into the engine's precision.
    pub fn to_host(&self) -> Tensor<f32> {
        match self {
            Self::Tensor(t) => t.clone(),
            Self::Tracked(t) => t.value.clone(),
            Self::Array(a) => a.to_f32(),
        }
    }

    /// Converts to a plain `Tensor<f32>`, detaching first and falling back to a host copy.
    pub fn into_array(self) -> Tensor<f32> {
        match self.try_detach() {
            Ok(tensor) => tensor,
            Err(other) => {
                tracing::trace!("model input cannot be detached, converting through host array");
                other.to_host()
            }
        }
    }
}

impl From<Tensor<f32>> for ModelInput {
    fn from(t: Tensor<f32>) -> Self {
        Self::Tensor(t)
    }
}

impl From<WithGrad<Tensor<f32>>> for ModelInput {
    fn from(t: WithGrad<Tensor<f32>>) -> Self {
        Self::Tracked(t)
    }
}

impl From<Tensor<f64>> for ModelInput {
    fn from(a: Tensor<f64>) -> Self {
        Self::Array(a)
    }
}
