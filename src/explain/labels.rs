use crate::error::{Error, Result};
use crate::tensors::Tensor;

use super::Mode;

/// Class(es) to explain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// One class, used for every image in the batch.
    Single(usize),
    /// One class per image.
    Many(Vec<usize>),
}

impl From<usize> for Target {
    fn from(label: usize) -> Self {
        Self::Single(label)
    }
}

impl From<Vec<usize>> for Target {
    fn from(labels: Vec<usize>) -> Self {
        Self::Many(labels)
    }
}

impl From<&[usize]> for Target {
    fn from(labels: &[usize]) -> Self {
        Self::Many(labels.to_vec())
    }
}

/// Settles the labels whose scores get differentiated.
///
/// Regression clears them; classification broadcasts a single label, checks a
/// label sequence against the batch size, or falls back to the arg-max of the
/// baseline output.
pub(crate) fn resolve(
    mode: Mode,
    target: Option<Target>,
    baseline: &Tensor<f32>,
    batch: usize,
) -> Result<Option<Vec<usize>>> {
    if mode != Mode::Classification {
        return Ok(None);
    }

    let labels = match target {
        Some(Target::Single(label)) => vec![label; batch],
        Some(Target::Many(labels)) => {
            if labels.len() != batch {
                return Err(Error::LabelMismatch {
                    expected: batch,
                    got: labels.len(),
                });
            }
            labels
        }
        None => {
            let inferred = baseline.argmax_last_axis()?;
            tracing::debug!(labels = ?inferred, "labels inferred from baseline output");
            inferred
        }
    };

    let classes = baseline.shape.last().copied().unwrap_or(0);
    if let Some(&label) = labels.iter().find(|&&l| l >= classes) {
        return Err(Error::LabelOutOfRange { label, classes });
    }
    Ok(Some(labels))
}

/// Upstream gradient selecting `output[i, labels[i]]` per image, or the whole output.
pub(crate) fn selection_seed(output: &Tensor<f32>, labels: Option<&[usize]>) -> Result<Tensor<f32>> {
    let Some(labels) = labels else {
        return Ok(Tensor::full(output.shape.clone(), 1.0));
    };

    let [rows, classes] = output.shape[..] else {
        return Err(Error::Shape(format!(
            "label selection needs a (batch, classes) output, got {:?}",
            output.shape
        )));
    };
    if rows != labels.len() {
        return Err(Error::LabelMismatch {
            expected: rows,
            got: labels.len(),
        });
    }

    let mut seed = Tensor::zeros(output.shape.clone());
    for (row, &label) in labels.iter().enumerate() {
        if label >= classes {
            return Err(Error::LabelOutOfRange { label, classes });
        }
        seed.data[row * classes + label] = 1.0;
    }
    Ok(seed)
}
