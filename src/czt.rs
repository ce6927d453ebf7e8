//! Band limited 1D transforms.
//!
//! [`ZoomFft`] evaluates the DTFT of each lane of a 2D array at `m` evenly spaced frequencies
//! inside an arbitrary interval, using Bluestein's chirp-z decomposition so that the cost is
//! a pair of FFTs of length roughly `n + m` regardless of how narrow the interval is.

use crate::error::{Result, ZoomError};
use crate::find_fast_number::fastish_fft_len;
use ndarray::parallel::prelude::{IntoParallelIterator, ParallelIterator};
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use num_complex::Complex;
use rustfft::num_traits::Zero;
use rustfft::{Fft, FftDirection, FftPlanner};
use std::cmp::max;
use std::f64::consts::PI;
use std::sync::Arc;
use unchecked_index::get_unchecked_mut;

/// Sample rate that frequency intervals are expressed against unless stated otherwise.
///
/// At this rate the Nyquist frequency is 1.0, so a frequency `f` corresponds to `f / 2` cycles per sample.
pub const DEFAULT_SAMPLE_RATE: f64 = 2.0;

/// A transform producing `output_len` samples of the spectrum of each lane, restricted to a frequency interval.
///
/// Implementations are planned once for a fixed geometry and then applied to many arrays.
pub trait BandTransform: Send + Sync {
    /// Plan a transform from `n` input samples to `m` output samples spread linearly across `interval`,
    /// both endpoints included. `interval` is in units of [`DEFAULT_SAMPLE_RATE`].
    fn plan(n: usize, m: usize, interval: [f64; 2]) -> Result<Self>
    where
        Self: Sized;

    fn input_len(&self) -> usize;

    fn output_len(&self) -> usize;

    /// Transform every lane along `axis`, the other axis is treated as a batch.
    ///
    /// `input.len_of(axis)` must equal `input_len()`, the output has `output_len()` along `axis`.
    fn transform(&self, input: ArrayView2<Complex<f64>>, axis: Axis) -> Array2<Complex<f64>>;
}

/// Chirp-z implementation of a zoom FFT.
///
/// Output sample `k` is `sum_j x[j] * exp(-2πi * j * f_k / fs)`, with `f_k` stepping linearly from the
/// start of the interval.
#[derive(Clone)]
pub struct ZoomFft {
    n: usize,
    m: usize,
    interval: [f64; 2],
    fs: f64,
    endpoint: bool,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
    scratch_len: usize,
    // a^-j * w^(j^2/2)
    start_phases: Vec<Complex<f64>>,
    // FFT of the conjugate chirp, scaled to undo the unnormalised inverse
    kernel: Vec<Complex<f64>>,
    // w^(k^2/2)
    end_phases: Vec<Complex<f64>>,
}

impl ZoomFft {
    /// * `n` - input lane length
    /// * `m` - number of output samples
    /// * `interval` - `[f1, f2]` frequency interval, in units of `fs`
    /// * `fs` - sample rate the interval is expressed against
    /// * `endpoint` - if true `f2` is the last output sample, otherwise the step is `(f2 - f1) / m`
    pub fn new(n: usize, m: usize, interval: [f64; 2], fs: f64, endpoint: bool) -> Result<Self> {
        if n == 0 {
            return Err(ZoomError::invalid("n", "input length must be positive"));
        }
        if m == 0 {
            return Err(ZoomError::invalid("m", "output length must be positive"));
        }
        if !(fs.is_finite() && fs > 0.0) {
            return Err(ZoomError::invalid("fs", format!("sample rate must be positive, got {}", fs)));
        }
        let [f1, f2] = interval;
        if !(f1.is_finite() && f2.is_finite()) {
            return Err(ZoomError::invalid("interval", format!("bounds must be finite, got {:?}", interval)));
        }
        if f2 <= f1 {
            return Err(ZoomError::invalid("interval", format!("interval is empty: {:?}", interval)));
        }

        let steps = if endpoint { m - 1 } else { m };
        let f_step = if steps == 0 { 0.0 } else { (f2 - f1) / steps as f64 };

        // w = exp(-2πi * f_step / fs), a = exp(2πi * f1 / fs)
        let w_rate = f_step / fs;
        let a_rate = f1 / fs;
        let chirp = |k: usize| {
            let k = k as f64;
            Complex::new(0.0, -PI * w_rate * k * k).exp()
        };

        let conv_len = fastish_fft_len(n + m - 1);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft(conv_len, FftDirection::Forward);
        let ifft = planner.plan_fft(conv_len, FftDirection::Inverse);
        let scratch_len = max(fft.get_inplace_scratch_len(), ifft.get_inplace_scratch_len());

        let start_phases: Vec<_> = (0..n)
            .map(|j| Complex::new(0.0, -2.0 * PI * a_rate * j as f64).exp() * chirp(j))
            .collect();
        let end_phases: Vec<_> = (0..m).map(chirp).collect();

        // w^(-d^2/2) for d in -(n-1)..m, laid out so the valid convolution starts at n-1
        let normalisation = 1.0 / conv_len as f64;
        let mut kernel = vec![Zero::zero(); conv_len];
        for (i, e) in kernel.iter_mut().take(n + m - 1).enumerate() {
            let d = if i < n - 1 { n - 1 - i } else { i - (n - 1) };
            *e = chirp(d).conj() * normalisation;
        }
        let mut fft_scratch = vec![Zero::zero(); fft.get_inplace_scratch_len()];
        fft.process_with_scratch(&mut kernel, &mut fft_scratch);

        Ok(ZoomFft {
            n,
            m,
            interval,
            fs,
            endpoint,
            fft,
            ifft,
            scratch_len,
            start_phases,
            kernel,
            end_phases,
        })
    }

    /// The frequency interval, in units of `sample_rate()`.
    pub fn interval(&self) -> [f64; 2] {
        self.interval
    }

    pub fn sample_rate(&self) -> f64 {
        self.fs
    }

    pub fn endpoint(&self) -> bool {
        self.endpoint
    }

    /// Frequencies of each output sample, in units of `sample_rate()`.
    pub fn frequencies(&self) -> Array1<f64> {
        let [f1, f2] = self.interval;
        let steps = if self.endpoint { self.m - 1 } else { self.m };
        let f_step = if steps == 0 { 0.0 } else { (f2 - f1) / steps as f64 };
        Array1::from_shape_fn(self.m, |k| f1 + k as f64 * f_step)
    }
}

impl BandTransform for ZoomFft {
    fn plan(n: usize, m: usize, interval: [f64; 2]) -> Result<Self> {
        ZoomFft::new(n, m, interval, DEFAULT_SAMPLE_RATE, true)
    }

    fn input_len(&self) -> usize {
        self.n
    }

    fn output_len(&self) -> usize {
        self.m
    }

    fn transform(&self, input: ArrayView2<Complex<f64>>, axis: Axis) -> Array2<Complex<f64>> {
        assert_eq!(
            input.len_of(axis),
            self.n,
            "input length along {:?} does not match the planned transform",
            axis
        );
        let n = self.n;
        let m = self.m;
        let conv_len = self.kernel.len();

        let mut out_shape = input.raw_dim();
        out_shape[axis.index()] = m;
        let mut output = Array2::zeros(out_shape);

        // CZT along axis, iteration over the other axis
        Zip::from(output.lanes_mut(axis))
            .and(input.lanes(axis))
            .into_par_iter()
            .for_each_init(
                || {
                    (
                        vec![Zero::zero(); conv_len],
                        vec![Zero::zero(); self.scratch_len],
                    )
                },
                |(fft_buffer, scratch), (mut out_lane, in_lane)| {
                    // chirp the input and zero pad to the convolution length
                    unsafe {
                        for (j, &e) in in_lane.iter().enumerate() {
                            *get_unchecked_mut(fft_buffer.as_mut_slice(), j) =
                                e * self.start_phases.get_unchecked(j);
                        }
                        for k in n..conv_len {
                            *get_unchecked_mut(fft_buffer.as_mut_slice(), k) = Zero::zero();
                        }
                    }

                    self.fft.process_with_scratch(fft_buffer, scratch);

                    unsafe {
                        for (k, e) in fft_buffer.iter_mut().enumerate() {
                            *e *= self.kernel.get_unchecked(k);
                        }
                    }

                    self.ifft.process_with_scratch(fft_buffer, scratch);

                    // valid part of the convolution starts at n - 1
                    for (k, e) in out_lane.iter_mut().enumerate() {
                        *e = fft_buffer[k + n - 1] * self.end_phases[k];
                    }
                },
            );

        output
    }
}

#[cfg(test)]
mod tests {
    use super::{BandTransform, ZoomFft, DEFAULT_SAMPLE_RATE};
    use crate::error::ZoomError;
    use ndarray::{Array2, Axis};
    use num_complex::Complex;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rustfft::{FftDirection, FftPlanner};
    use std::f64::consts::PI;

    fn random_array(rng: &mut StdRng, shape: (usize, usize)) -> Array2<Complex<f64>> {
        Array2::from_shape_simple_fn(shape, || Complex::new(rng.gen::<f64>() - 0.5, rng.gen::<f64>() - 0.5))
    }

    fn direct_dtft(x: &[Complex<f64>], freqs: &[f64], fs: f64) -> Vec<Complex<f64>> {
        freqs
            .iter()
            .map(|f| {
                x.iter()
                    .enumerate()
                    .map(|(j, &e)| e * Complex::new(0.0, -2.0 * PI * j as f64 * f / fs).exp())
                    .sum()
            })
            .collect()
    }

    fn assert_close(a: &[Complex<f64>], b: &[Complex<f64>], tol: f64) {
        assert_eq!(a.len(), b.len());
        for (a, b) in a.iter().zip(b) {
            assert!((a - b).norm() < tol, "{} vs {} ({})", a, b, (a - b).norm());
        }
    }

    #[test]
    fn matches_direct_dtft_along_both_axes() {
        let mut rng = StdRng::seed_from_u64(7);
        let input = random_array(&mut rng, (13, 6));

        let zfft = ZoomFft::plan(13, 21, [-0.3, 0.45]).unwrap();
        let freqs = zfft.frequencies().to_vec();
        let out = zfft.transform(input.view(), Axis(0));
        assert_eq!(out.shape(), &[21, 6]);
        for c in 0..6 {
            let col: Vec<_> = input.column(c).to_vec();
            let expected = direct_dtft(&col, &freqs, DEFAULT_SAMPLE_RATE);
            assert_close(&out.column(c).to_vec(), &expected, 1e-9);
        }

        let zfft = ZoomFft::plan(6, 4, [0.1, 1.7]).unwrap();
        let freqs = zfft.frequencies().to_vec();
        let out = zfft.transform(input.view(), Axis(1));
        assert_eq!(out.shape(), &[13, 4]);
        for r in 0..13 {
            let row: Vec<_> = input.row(r).to_vec();
            let expected = direct_dtft(&row, &freqs, DEFAULT_SAMPLE_RATE);
            assert_close(&out.row(r).to_vec(), &expected, 1e-9);
        }
    }

    #[test]
    fn full_band_matches_fft() {
        let n = 10;
        let mut rng = StdRng::seed_from_u64(3);
        let input = random_array(&mut rng, (n, 1));

        // n samples from 0 up to (n-1)/n cycles per sample are the DFT bins
        let top = DEFAULT_SAMPLE_RATE * (n - 1) as f64 / n as f64;
        let zfft = ZoomFft::plan(n, n, [0.0, top]).unwrap();
        let out = zfft.transform(input.view(), Axis(0));

        let mut expected = input.column(0).to_vec();
        FftPlanner::<f64>::new().plan_fft(n, FftDirection::Forward).process(&mut expected);
        assert_close(&out.column(0).to_vec(), &expected, 1e-9);
    }

    #[test]
    fn without_endpoint_step_divides_by_m() {
        let zfft = ZoomFft::new(8, 4, [0.0, 1.0], 1.0, false).unwrap();
        assert_eq!(zfft.frequencies().to_vec(), vec![0.0, 0.25, 0.5, 0.75]);
        let zfft = ZoomFft::new(8, 5, [0.0, 1.0], 1.0, true).unwrap();
        assert_eq!(zfft.frequencies().to_vec(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn single_output_sample_sits_at_interval_start() {
        let zfft = ZoomFft::plan(5, 1, [0.2, 0.6]).unwrap();
        assert_eq!(zfft.frequencies().to_vec(), vec![0.2]);

        let input = Array2::from_elem((5, 2), Complex::new(1.0, 0.0));
        let out = zfft.transform(input.view(), Axis(0));
        let expected = direct_dtft(&[Complex::new(1.0, 0.0); 5], &[0.2], DEFAULT_SAMPLE_RATE);
        assert_close(&[out[[0, 0]], out[[0, 1]]], &[expected[0], expected[0]], 1e-9);
    }

    #[test]
    fn rejects_degenerate_plans() {
        assert!(matches!(ZoomFft::plan(0, 4, [0.0, 1.0]), Err(ZoomError::InvalidArgument { name: "n", .. })));
        assert!(matches!(ZoomFft::plan(4, 0, [0.0, 1.0]), Err(ZoomError::InvalidArgument { name: "m", .. })));
        assert!(matches!(ZoomFft::plan(4, 4, [1.0, 1.0]), Err(ZoomError::InvalidArgument { name: "interval", .. })));
        assert!(matches!(
            ZoomFft::plan(4, 4, [0.0, f64::NAN]),
            Err(ZoomError::InvalidArgument { name: "interval", .. })
        ));
        assert!(matches!(ZoomFft::new(4, 4, [0.0, 1.0], 0.0, true), Err(ZoomError::InvalidArgument { name: "fs", .. })));
    }

    #[test]
    #[should_panic]
    fn wrong_lane_length_panics() {
        let zfft = ZoomFft::plan(4, 4, [0.0, 1.0]).unwrap();
        let input = Array2::zeros((5, 4));
        zfft.transform(input.view(), Axis(0));
    }
}
