use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::tensors::Tensor;

/// Gaussian noise source for input perturbation.
///
/// Two samplers built from the same seed produce the same draws, so the input
/// perturbations of an explanation can be replayed. The seed does not reach
/// the model: a channels-last model left in training mode still draws its own
/// dropout masks.
#[derive(Debug, Clone)]
pub struct NoiseSampler {
    rng: StdRng,
}

impl NoiseSampler {
    /// Seeded when `seed` is given, otherwise seeded from the OS.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    /// Standard-normal noise of `shape`, multiplied by `scale`.
    pub fn noise(&mut self, shape: &[usize], scale: f32) -> Tensor<f32> {
        let len = shape.iter().product::<usize>();
        let data = (0..len)
            .map(|_| self.rng.sample::<f32, _>(StandardNormal) * scale)
            .collect();
        Tensor::new(shape.to_vec(), data)
    }

    /// `input + noise(input.shape, scale)`.
    pub fn perturb(&mut self, input: &Tensor<f32>, scale: f32) -> Tensor<f32> {
        let mut noisy = self.noise(&input.shape, scale);
        noisy
            .data
            .iter_mut()
            .zip(&input.data)
            .for_each(|(n, x)| *n += x);
        noisy
    }
}
