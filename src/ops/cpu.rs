//! Parallel CPU kernels
//!
//! # CPU Backend
//!
//! This module provides the raw numeric kernels behind the differentiable
//! operations in [`crate::backprop`]. Kernels work on flat row-major slices and
//! know nothing about autograd; the backward closures live one level up.
//!
//! ## Features
//!
//! - Parallel execution using [`rayon`](https://docs.rs/rayon)
//! - Optional SIMD acceleration using AVX2 (enabled via `simd` feature flag)
//! - Pure Rust fallback path when SIMD is disabled or unavailable
//!
//! ## Implemented Kernels
//!
//! - `matmul` / `transpose`: dense layers
//! - `relu` / `relu_backward`: rectified linear activation
//! - `guided_relu_backward`: gradient rule used by guided backpropagation
//! - `conv2d` / `conv2d_input_grad`: stride-1 zero-padded convolution, in either layout
//!
//! ## Design Goals
//!
//! - Deterministic results (given deterministic input and scheduling)
//! - Modular: kernels are separate from the autograd plumbing
//!
//! ## Safety
//!
//! - SIMD paths use `unsafe` blocks and assume AVX2-capable CPUs

#[cfg(all(feature = "simd", target_arch = "x86_64", target_feature = "avx2"))]
use core::arch::x86_64::*;

use rayon::prelude::*;

/// Memory order of an image batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `N×C×H×W`
    Nchw,
    /// `N×H×W×C`
    Nhwc,
}

/// Multiplies `a` (m×k) by `b` (k×n), both row-major.
///
/// # Optimizations
/// - Uses `rayon` for parallel row computation
pub fn matmul(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), k * n);

    let mut out = vec![0.0f32; m * n];
    if n == 0 {
        return out;
    }

    out.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        let a_row = &a[i * k..(i + 1) * k];
        for (l, &a_il) in a_row.iter().enumerate() {
            if a_il == 0.0 {
                continue;
            }
            let b_row = &b[l * n..(l + 1) * n];
            row.iter_mut().zip(b_row).for_each(|(o, &b_lj)| *o += a_il * b_lj);
        }
    });

    out
}

/// Transposes a row-major `rows×cols` matrix.
pub fn transpose(a: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            out[j * rows + i] = a[i * cols + j];
        }
    }
    out
}

/// `max(0, x)` elementwise.
pub fn relu(input: &[f32]) -> Vec<f32> {
    let mut data = vec![0.0f32; input.len()];

    #[cfg(all(feature = "simd", target_arch = "x86_64", target_feature = "avx2"))]
    {
        const LANES: usize = 8;
        data.par_chunks_mut(LANES)
            .zip(input.par_chunks(LANES))
            .for_each(|(out_chunk, in_chunk)| unsafe {
                let mut in_buf = [0.0f32; LANES];
                in_buf[..in_chunk.len()].copy_from_slice(in_chunk);

                let x = _mm256_loadu_ps(in_buf.as_ptr());
                let y = _mm256_max_ps(x, _mm256_setzero_ps());

                let mut out_buf = [0.0f32; LANES];
                _mm256_storeu_ps(out_buf.as_mut_ptr(), y);

                out_chunk.copy_from_slice(&out_buf[..in_chunk.len()]);
            });
    }

    #[cfg(not(all(feature = "simd", target_arch = "x86_64", target_feature = "avx2")))]
    {
        data.par_iter_mut()
            .zip(input.par_iter())
            .for_each(|(y, &x)| {
                *y = if x > 0.0 { x } else { 0.0 };
            });
    }

    data
}

/// Passes `grad` through where `input > 0`, zero elsewhere.
pub fn relu_backward(input: &[f32], grad: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0f32; grad.len()];

    #[cfg(all(feature = "simd", target_arch = "x86_64", target_feature = "avx2"))]
    {
        const LANES: usize = 8;
        out.par_chunks_mut(LANES)
            .zip(input.par_chunks(LANES))
            .zip(grad.par_chunks(LANES))
            .for_each(|((g_out, in_chunk), grad_chunk)| unsafe {
                let mut in_buf = [0.0f32; LANES];
                let mut grad_buf = [0.0f32; LANES];
                in_buf[..in_chunk.len()].copy_from_slice(in_chunk);
                grad_buf[..grad_chunk.len()].copy_from_slice(grad_chunk);

                let x = _mm256_loadu_ps(in_buf.as_ptr());
                let dy = _mm256_loadu_ps(grad_buf.as_ptr());
                let mask = _mm256_cmp_ps(x, _mm256_setzero_ps(), _CMP_GT_OQ);
                let dx = _mm256_and_ps(dy, mask);

                let mut out_buf = [0.0f32; LANES];
                _mm256_storeu_ps(out_buf.as_mut_ptr(), dx);
                g_out.copy_from_slice(&out_buf[..in_chunk.len()]);
            });
    }

    #[cfg(not(all(feature = "simd", target_arch = "x86_64", target_feature = "avx2")))]
    {
        out.par_iter_mut()
            .zip(input.par_iter())
            .zip(grad.par_iter())
            .for_each(|((g, &x), &dy)| {
                *g = if x > 0.0 { dy } else { 0.0 };
            });
    }

    out
}

/// Guided backpropagation rule: `1[activation > 0] * max(grad, 0)`.
pub fn guided_relu_backward(activation: &[f32], grad: &[f32]) -> Vec<f32> {
    activation
        .par_iter()
        .zip(grad.par_iter())
        .map(|(&a, &dy)| if a > 0.0 { dy.max(0.0) } else { 0.0 })
        .collect()
}

/// Shape bookkeeping for a stride-1, zero-padded 2-D convolution.
///
/// Weights are always laid out `out_channels×in_channels×kernel_h×kernel_w`;
/// only activations follow [`Layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    pub batch: usize,
    pub in_channels: usize,
    pub height: usize,
    pub width: usize,
    pub out_channels: usize,
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub padding: usize,
    pub layout: Layout,
}

impl ConvGeometry {
    /// Output height; zero when the kernel does not fit.
    pub fn out_h(&self) -> usize {
        (self.height + 2 * self.padding + 1).saturating_sub(self.kernel_h)
    }

    /// Output width; zero when the kernel does not fit.
    pub fn out_w(&self) -> usize {
        (self.width + 2 * self.padding + 1).saturating_sub(self.kernel_w)
    }

    /// Output shape in the activation layout.
    pub fn out_shape(&self) -> Vec<usize> {
        match self.layout {
            Layout::Nchw => vec![self.batch, self.out_channels, self.out_h(), self.out_w()],
            Layout::Nhwc => vec![self.batch, self.out_h(), self.out_w(), self.out_channels],
        }
    }

    fn input_offset(&self, c: usize, y: usize, x: usize) -> usize {
        match self.layout {
            Layout::Nchw => (c * self.height + y) * self.width + x,
            Layout::Nhwc => (y * self.width + x) * self.in_channels + c,
        }
    }

    fn output_offset(&self, c: usize, y: usize, x: usize) -> usize {
        match self.layout {
            Layout::Nchw => (c * self.out_h() + y) * self.out_w() + x,
            Layout::Nhwc => (y * self.out_w() + x) * self.out_channels + c,
        }
    }

    fn weight_offset(&self, oc: usize, ic: usize, ky: usize, kx: usize) -> usize {
        ((oc * self.in_channels + ic) * self.kernel_h + ky) * self.kernel_w + kx
    }

    /// Maps a padded coordinate back into the image, `None` when it lands in the padding.
    fn unpad(&self, padded: usize, extent: usize) -> Option<usize> {
        padded
            .checked_sub(self.padding)
            .filter(|&v| v < extent)
    }
}

/// Forward convolution, parallel over the batch.
pub fn conv2d(input: &[f32], weight: &[f32], bias: &[f32], g: &ConvGeometry) -> Vec<f32> {
    let (oh, ow) = (g.out_h(), g.out_w());
    let in_per_batch = g.in_channels * g.height * g.width;
    let out_per_batch = g.out_channels * oh * ow;

    let mut out = vec![0.0f32; g.batch * out_per_batch];
    if out_per_batch == 0 {
        return out;
    }

    out.par_chunks_mut(out_per_batch)
        .enumerate()
        .for_each(|(n, chunk)| {
            let image = &input[n * in_per_batch..(n + 1) * in_per_batch];
            for oc in 0..g.out_channels {
                for oy in 0..oh {
                    for ox in 0..ow {
                        let mut acc = bias[oc];
                        for ic in 0..g.in_channels {
                            for ky in 0..g.kernel_h {
                                let Some(iy) = g.unpad(oy + ky, g.height) else {
                                    continue;
                                };
                                for kx in 0..g.kernel_w {
                                    let Some(ix) = g.unpad(ox + kx, g.width) else {
                                        continue;
                                    };
                                    acc += image[g.input_offset(ic, iy, ix)]
                                        * weight[g.weight_offset(oc, ic, ky, kx)];
                                }
                            }
                        }
                        chunk[g.output_offset(oc, oy, ox)] = acc;
                    }
                }
            }
        });

    out
}

/// Gradient of a convolution with respect to its input, parallel over the batch.
pub fn conv2d_input_grad(grad_out: &[f32], weight: &[f32], g: &ConvGeometry) -> Vec<f32> {
    let (oh, ow) = (g.out_h(), g.out_w());
    let in_per_batch = g.in_channels * g.height * g.width;
    let out_per_batch = g.out_channels * oh * ow;

    let mut grad_in = vec![0.0f32; g.batch * in_per_batch];
    if in_per_batch == 0 {
        return grad_in;
    }

    grad_in
        .par_chunks_mut(in_per_batch)
        .enumerate()
        .for_each(|(n, chunk)| {
            let upstream = &grad_out[n * out_per_batch..(n + 1) * out_per_batch];
            for ic in 0..g.in_channels {
                for iy in 0..g.height {
                    for ix in 0..g.width {
                        let mut acc = 0.0f32;
                        for ky in 0..g.kernel_h {
                            // oy + ky == iy + padding
                            let Some(oy) = (iy + g.padding).checked_sub(ky).filter(|&v| v < oh)
                            else {
                                continue;
                            };
                            for kx in 0..g.kernel_w {
                                let Some(ox) =
                                    (ix + g.padding).checked_sub(kx).filter(|&v| v < ow)
                                else {
                                    continue;
                                };
                                for oc in 0..g.out_channels {
                                    acc += upstream[g.output_offset(oc, oy, ox)]
                                        * weight[g.weight_offset(oc, ic, ky, kx)];
                                }
                            }
                        }
                        chunk[g.input_offset(ic, iy, ix)] = acc;
                    }
                }
            }
        });

    grad_in
}
