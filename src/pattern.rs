//! Smooth random complex fields for exercising the transforms.

use crate::field::meshgrid;
use ndarray::parallel::prelude::{IntoParallelIterator, ParallelIterator};
use ndarray::{Array2, ArrayViewMut1, Axis, Zip};
use num_complex::Complex;
use rand::Rng;
use std::f64::consts::PI;

/// A synthesised field together with the normalised coordinate grids it was enveloped on.
#[derive(Clone, Debug)]
pub struct Pattern {
    pub values: Array2<Complex<f64>>,
    pub x: Array2<f64>,
    pub y: Array2<f64>,
}

/// Generates an `n` x `n` random complex field, smoothed and windowed, with a peak magnitude of 1.
///
/// * `sigma` - standard deviation of the smoothing kernel as a fraction of `n`
/// * `sigma_env` - standard deviation of the Gaussian envelope, in the `[-1, 1]` grid coordinates
pub fn generate_complex_pattern<R: Rng + ?Sized>(rng: &mut R, n: usize, sigma: f64, sigma_env: f64) -> Pattern {
    let mut values = Array2::from_shape_simple_fn([n, n], || {
        let amplitude: f64 = rng.gen();
        let phase: f64 = rng.gen();
        Complex::from_polar(amplitude, 2.0 * PI * phase)
    });

    gaussian_filter(&mut values, sigma * n as f64);

    let (x, y) = meshgrid(n);
    let two_var = 2.0 * sigma_env * sigma_env;
    Zip::from(&mut values)
        .and(&x)
        .and(&y)
        .par_for_each(|e, &x, &y| *e *= (-(x * x + y * y) / two_var).exp());

    let max = values.iter().fold(0.0f64, |max, e| e.norm().max(max));
    if max > 0.0 {
        values.par_mapv_inplace(|e| e / max);
    }

    Pattern { values, x, y }
}

/// Normalised Gaussian weights for offsets `-radius..=radius`, truncated at four standard deviations.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|d| (-0.5 * (d * d) as f64 / (sigma * sigma)).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Maps an index outside `0..len` back inside by mirroring about the array edges (d c b a | a b c d | d c b a).
fn reflect_index(i: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let i = i.rem_euclid(period);
    if i >= len as isize {
        (period - 1 - i) as usize
    } else {
        i as usize
    }
}

fn convolve_lane(mut lane: ArrayViewMut1<Complex<f64>>, kernel: &[f64], buffer: &mut Vec<Complex<f64>>) {
    let len = lane.len();
    let radius = (kernel.len() / 2) as isize;
    buffer.clear();
    buffer.extend(lane.iter().cloned());
    for (i, e) in lane.iter_mut().enumerate() {
        *e = kernel
            .iter()
            .enumerate()
            .map(|(k, &w)| buffer[reflect_index(i as isize + k as isize - radius, len)] * w)
            .sum();
    }
}

/// Separable Gaussian smoothing with reflecting boundaries. A `sigma` of zero leaves `values` unchanged.
fn gaussian_filter(values: &mut Array2<Complex<f64>>, sigma: f64) {
    if !(sigma > 0.0) {
        return;
    }
    let kernel = gaussian_kernel(sigma);
    for &axis in &[Axis(0), Axis(1)] {
        let len = values.len_of(axis);
        Zip::from(values.lanes_mut(axis))
            .into_par_iter()
            .for_each_init(
                || Vec::with_capacity(len),
                |buffer, lane| convolve_lane(lane.0, &kernel, buffer),
            );
    }
}
