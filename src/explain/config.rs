use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What the model output represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One score per class; gradients target a single class per image.
    #[default]
    Classification,
    /// Any other output; gradients are taken w.r.t. the whole output.
    Regression,
}

impl From<&str> for Mode {
    /// `"classification"` selects classification, anything else regression.
    fn from(s: &str) -> Self {
        if s == "classification" {
            Self::Classification
        } else {
            Self::Regression
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classification => write!(f, "classification"),
            Self::Regression => write!(f, "regression"),
        }
    }
}

/// Parameters shared by SmoothGrad and guided backpropagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    pub mode: Mode,
    /// Noisy forward/backward passes to average over.
    pub num_samples: usize,
    /// Noise standard deviation as a fraction of the input's value range.
    pub sigma: f32,
    /// Seed for the input noise; `None` draws one from the OS. Randomness
    /// inside the model, such as training-mode dropout, is not covered.
    pub seed: Option<u64>,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Classification,
            num_samples: 50,
            sigma: 0.1,
            seed: None,
        }
    }
}

impl ExplainConfig {
    /// Sets the output interpretation; accepts a [`Mode`] or its name.
    pub fn with_mode(mut self, mode: impl Into<Mode>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Sets how many noisy passes are averaged.
    pub fn with_num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples;
        self
    }

    /// Sets the relative noise level; `0.0` turns the noise off.
    pub fn with_sigma(mut self, sigma: f32) -> Self {
        self.sigma = sigma;
        self
    }

    /// Fixes the noise seed so repeated explanations match.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Rejects a zero sample count and negative or non-finite noise levels.
    pub fn validate(&self) -> Result<()> {
        if self.num_samples == 0 {
            return Err(Error::InvalidArgument(
                "`num_samples` must be at least 1".to_string(),
            ));
        }
        if !self.sigma.is_finite() || self.sigma < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "`sigma` must be a finite non-negative number, got {}",
                self.sigma
            )));
        }
        Ok(())
    }
}
