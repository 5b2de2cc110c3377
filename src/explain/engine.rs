//! Per-framework gradient backends and the shared sampling loop.

use crate::backend::{Framework, Frameworks};
use crate::error::{Error, Result};
use crate::hooks::{GuidedRelu, HookHandle};
use crate::image::{Image, Preprocess};
use crate::model::Model;
use crate::tensors::{Tensor, WithGrad};

use super::labels::{self, Target};
use super::noise::NoiseSampler;
use super::{ExplainConfig, Explanation};

/// What differs between the two model families when explaining them.
pub trait GradientBackend: Sync {
    /// The family served.
    fn framework(&self) -> Framework;

    /// Puts the model into the state gradients are taken in.
    fn prepare(&self, model: &mut dyn Model);

    /// The array fed to the model when no preprocessing function is supplied.
    fn raw_input(&self, image: &Image) -> Result<Tensor<f32>>;

    /// Reorders model-native gradients to `N×H×W×C`.
    fn to_channels_last(&self, gradients: Tensor<f32>) -> Result<Tensor<f32>>;
}

struct ChannelsFirstBackend;

impl GradientBackend for ChannelsFirstBackend {
    fn framework(&self) -> Framework {
        Framework::ChannelsFirst
    }

    fn prepare(&self, model: &mut dyn Model) {
        model.eval();
    }

    fn raw_input(&self, image: &Image) -> Result<Tensor<f32>> {
        image.as_array().permute(&[0, 3, 1, 2])
    }

    fn to_channels_last(&self, gradients: Tensor<f32>) -> Result<Tensor<f32>> {
        if gradients.rank() != 4 {
            return Err(Error::Shape(format!(
                "channels-first gradients must be (batch, channels, height, width), got {:?}",
                gradients.shape
            )));
        }
        gradients.permute(&[0, 2, 3, 1])
    }
}

struct ChannelsLastBackend;

impl GradientBackend for ChannelsLastBackend {
    fn framework(&self) -> Framework {
        Framework::ChannelsLast
    }

    fn prepare(&self, _model: &mut dyn Model) {}

    fn raw_input(&self, image: &Image) -> Result<Tensor<f32>> {
        Ok(image.to_array())
    }

    fn to_channels_last(&self, gradients: Tensor<f32>) -> Result<Tensor<f32>> {
        Ok(gradients)
    }
}

static CHANNELS_FIRST: ChannelsFirstBackend = ChannelsFirstBackend;
static CHANNELS_LAST: ChannelsLastBackend = ChannelsLastBackend;

/// The backend serving `framework`.
pub fn backend_for(framework: Framework) -> &'static dyn GradientBackend {
    match framework {
        Framework::ChannelsFirst => &CHANNELS_FIRST,
        Framework::ChannelsLast => &CHANNELS_LAST,
    }
}

/// Picks the backend for `model`: the first enabled framework the model belongs to.
///
/// # Errors
/// [`Error::UnsupportedModel`] naming the model's type when no enabled framework claims it.
pub fn dispatch(frameworks: &Frameworks, model: &dyn Model) -> Result<&'static dyn GradientBackend> {
    let claimed = model.framework();
    frameworks
        .iter()
        .find(|&fw| claimed == Some(fw))
        .map(|fw| {
            tracing::debug!(framework = ?fw, model = model.type_name(), "dispatching model");
            backend_for(fw)
        })
        .ok_or_else(|| Error::UnsupportedModel {
            type_name: model.type_name(),
        })
}

/// Gradient of the selected outputs w.r.t. `input`, in the model's native layout.
///
/// With `labels`, image `i` contributes `d output[i, labels[i]] / d input`;
/// without, the gradient of the summed output is returned.
pub fn input_gradient(
    model: &dyn Model,
    input: &Tensor<f32>,
    labels: Option<&[usize]>,
) -> Result<Tensor<f32>> {
    let mut x = WithGrad::new(input.clone());
    let trace = model.trace(&x.value)?;
    let seed = labels::selection_seed(&trace.output, labels)?;
    x.grad = trace.backward(&seed)?;
    Ok(x.grad)
}

fn working_input(
    backend: &dyn GradientBackend,
    image: &Image,
    preprocess: Option<&Preprocess<'_>>,
) -> Result<Tensor<f32>> {
    match preprocess {
        Some(preprocess) => Ok(preprocess(image)?.into_array()),
        None => backend.raw_input(image),
    }
}

/// Whether backward passes go through guided ReLU interceptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pass {
    Plain,
    Guided,
}

pub(crate) fn run(
    frameworks: &Frameworks,
    pass: Pass,
    model: &mut dyn Model,
    image: &Image,
    preprocess: Option<&Preprocess<'_>>,
    target: Option<Target>,
    config: &ExplainConfig,
) -> Result<Explanation> {
    config.validate()?;
    let backend = dispatch(frameworks, model)?;
    backend.prepare(model);
    let model: &dyn Model = model;

    let input = working_input(backend, image, preprocess)?;
    if input.numel() == 0 {
        return Err(Error::InvalidImage("model input is empty".to_string()));
    }
    let baseline = model.forward(&input)?;
    let labels = labels::resolve(config.mode, target, &baseline, image.len())?;

    let range = input.max() - input.min();
    let sigma = config.sigma * range;
    if sigma == 0.0 && config.sigma > 0.0 {
        tracing::warn!("input is constant, noise collapses to zero");
    }
    tracing::debug!(
        framework = ?backend.framework(),
        ?pass,
        mode = %config.mode,
        num_samples = config.num_samples,
        sigma,
        "computing gradients"
    );

    let _interceptor: Option<HookHandle<'_>> = match pass {
        Pass::Plain => None,
        Pass::Guided => {
            let slot = model.relu_hooks().ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "{} does not expose ReLU hooks, guided backpropagation needs them",
                    model.type_name()
                ))
            })?;
            Some(slot.register(Box::new(GuidedRelu::default()))?)
        }
    };

    let mut sampler = NoiseSampler::new(config.seed);
    let mut total = Tensor::zeros(input.shape.clone());
    for sample in 0..config.num_samples {
        let noisy = sampler.perturb(&input, sigma);
        let grad = input_gradient(model, &noisy, labels.as_deref())?;
        total.add_assign(&grad)?;
        tracing::trace!(sample, "accumulated gradient");
    }

    #[allow(clippy::cast_precision_loss)]
    let mean = total.scale(1.0 / config.num_samples as f32);
    let gradients = backend.to_channels_last(mean)?;

    Ok(Explanation { gradients, labels })
}
