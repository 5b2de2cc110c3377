use crate::backend::Framework;
use crate::backprop::{self, BackFn};
use crate::error::Result;
use crate::hooks::HookSlot;
use crate::model::{Model, Trace};
use crate::tensors::Tensor;

use super::Layer;

enum Node<'a> {
    Op(BackFn<'a>),
    Relu(BackFn<'a>),
}

/// A feed-forward stack of [`Layer`]s belonging to one [`Framework`].
///
/// Starts in training mode; [`Model::eval`] switches dropout off. Training-mode
/// dropout draws from the thread-local generator, so outputs only repeat across
/// runs in eval mode. ReLU layers report to the model's [`HookSlot`], so guided
/// backpropagation works out of the box.
///
/// # Example
/// ```rust
/// use briny_saliency::backend::Framework;
/// use briny_saliency::model::Model;
/// use briny_saliency::nn::{Layer, Sequential};
/// use briny_saliency::tensor;
///
/// let model = Sequential::new(
///     Framework::ChannelsLast,
///     vec![
///         Layer::Flatten,
///         Layer::linear(tensor!([[1.0], [-1.0]]), tensor!([0.5])).unwrap(),
///     ],
/// );
/// let out = model.forward(&tensor!([[[[2.0], [1.0]]]])).unwrap();
/// assert_eq!(out.data, vec![1.5]);
/// ```
#[derive(Debug)]
pub struct Sequential {
    framework: Framework,
    layers: Vec<Layer>,
    training: bool,
    hooks: HookSlot,
}

impl Sequential {
    pub fn new(framework: Framework, layers: Vec<Layer>) -> Self {
        Self {
            framework,
            layers,
            training: true,
            hooks: HookSlot::new(),
        }
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Switches back to training behaviour.
    pub fn train(&mut self) {
        self.training = true;
    }
}

impl Model for Sequential {
    fn framework(&self) -> Option<Framework> {
        Some(self.framework)
    }

    fn eval(&mut self) {
        self.training = false;
    }

    fn trace(&self, input: &Tensor<f32>) -> Result<Trace<'_>> {
        let layout = self.framework.layout();
        let mut nodes: Vec<Node<'_>> = Vec::with_capacity(self.layers.len());
        let mut x = input.clone();

        for layer in &self.layers {
            let (out, node) = match layer {
                Layer::Linear { weight, bias } => {
                    let (out, back) = backprop::linear(&x, weight, bias)?;
                    (out, Node::Op(back))
                }
                Layer::Conv2d {
                    weight,
                    bias,
                    padding,
                } => {
                    let (out, back) = backprop::conv2d(&x, weight, bias, *padding, layout)?;
                    (out, Node::Op(back))
                }
                Layer::Relu => {
                    let (out, back) = backprop::relu(&x);
                    self.hooks.forward(&out);
                    (out, Node::Relu(back))
                }
                Layer::Flatten => {
                    let (out, back) = backprop::flatten(&x)?;
                    (out, Node::Op(back))
                }
                Layer::Dropout { p } if self.training => {
                    let (out, back) = backprop::dropout(&x, *p, &mut rand::rng());
                    (out, Node::Op(back))
                }
                Layer::Dropout { .. } => continue,
            };
            nodes.push(node);
            x = out;
        }

        let hooks = &self.hooks;
        Ok(Trace::new(x, move |grad_output| {
            let mut grad = grad_output.clone();
            for node in nodes.iter().rev() {
                grad = match node {
                    Node::Op(back) => back(&grad)?,
                    Node::Relu(back) => match hooks.backward(&grad) {
                        Some(guided) => guided?,
                        None => back(&grad)?,
                    },
                };
            }
            Ok(grad)
        }))
    }

    fn relu_hooks(&self) -> Option<&HookSlot> {
        Some(&self.hooks)
    }
}
