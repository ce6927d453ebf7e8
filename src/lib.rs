//! Arbitrarily centered 2D zoom FFT for complex fields.
//!
//! [`ZoomFft2`] evaluates a window of the 2D spectrum of a field, with any output resolution,
//! by composing a band limited transform along each axis. A phase reference computed at
//! construction pins the phase origin of the spectrum to a chosen, possibly sub-pixel, position
//! in the input, so that a source centered there produces zero phase everywhere in the output.
//!
//! The supporting modules synthesise smooth random fields ([`pattern`]), build plane-wave
//! references and crops ([`field`]), and render complex fields as images ([`colorize`]).

use log::{debug, trace, warn};
use ndarray::{s, Array1, Array2, ArrayBase, Axis, Data, Ix2, Zip};
use num_complex::Complex;
use std::ops::Range;
use std::str::FromStr;

pub mod colorize;
pub mod czt;
mod error;
pub mod field;
mod find_fast_number;
pub mod pattern;

pub use crate::czt::{BandTransform, ZoomFft, DEFAULT_SAMPLE_RATE};
pub use crate::error::{Result, ZoomError};

/// Orientation convention of the output.
///
/// `Backward` reverses both output axes of the forward result, for consumers that treat the
/// spectrum as an inverse-direction transform. It is not an inverse transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Forward
    }
}

impl FromStr for Direction {
    type Err = ZoomError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "forward" => Ok(Direction::Forward),
            "backward" => Ok(Direction::Backward),
            other => Err(ZoomError::invalid(
                "direction",
                format!("must be 'forward' or 'backward', got '{}'", other),
            )),
        }
    }
}

/// A per-axis parameter given either once for both axes or explicitly per axis.
#[derive(Clone, Debug, PartialEq)]
pub enum AxisPair {
    /// Broadcast to both axes
    Scalar(f64),
    Pair([f64; 2]),
    /// Must hold exactly two values
    Slice(Vec<f64>),
}

impl AxisPair {
    /// Resolve to one value per axis, broadcasting a scalar.
    pub fn resolve(&self, name: &'static str) -> Result<[f64; 2]> {
        let pair = match self {
            AxisPair::Scalar(v) => [*v, *v],
            AxisPair::Pair(p) => *p,
            AxisPair::Slice(v) => Self::slice_pair(name, v)?,
        };
        check_finite(name, pair)
    }

    /// Resolve to one value per axis, refusing the scalar form.
    pub fn resolve_pair(&self, name: &'static str) -> Result<[f64; 2]> {
        let pair = match self {
            AxisPair::Scalar(v) => {
                return Err(ZoomError::invalid(
                    name,
                    format!("expected a pair of values, got scalar {}", v),
                ))
            }
            AxisPair::Pair(p) => *p,
            AxisPair::Slice(v) => Self::slice_pair(name, v)?,
        };
        check_finite(name, pair)
    }

    fn slice_pair(name: &'static str, v: &[f64]) -> Result<[f64; 2]> {
        match *v {
            [a, b] => Ok([a, b]),
            _ => Err(ZoomError::invalid(
                name,
                format!("expected a scalar or a pair, got {} values", v.len()),
            )),
        }
    }
}

fn check_finite(name: &'static str, pair: [f64; 2]) -> Result<[f64; 2]> {
    if pair.iter().all(|v| v.is_finite()) {
        Ok(pair)
    } else {
        Err(ZoomError::invalid(name, format!("values must be finite, got {:?}", pair)))
    }
}

impl From<f64> for AxisPair {
    fn from(v: f64) -> Self {
        AxisPair::Scalar(v)
    }
}

impl From<(f64, f64)> for AxisPair {
    fn from((a, b): (f64, f64)) -> Self {
        AxisPair::Pair([a, b])
    }
}

impl From<[f64; 2]> for AxisPair {
    fn from(p: [f64; 2]) -> Self {
        AxisPair::Pair(p)
    }
}

impl From<Vec<f64>> for AxisPair {
    fn from(v: Vec<f64>) -> Self {
        AxisPair::Slice(v)
    }
}

impl From<&[f64]> for AxisPair {
    fn from(v: &[f64]) -> Self {
        AxisPair::Slice(v.to_vec())
    }
}

/// 2D zoom FFT with a phase origin pinned to `pos_center`.
///
/// The geometry is fixed at construction. Construction also calibrates the phase reference, which
/// is never recomputed, so a `ZoomFft2` can be shared between threads and applied concurrently.
#[derive(Clone)]
pub struct ZoomFft2<T: BandTransform = ZoomFft> {
    n: [usize; 2],
    m: [usize; 2],
    // stored doubled, see `with_transform`
    f_center: [f64; 2],
    f_range: [f64; 2],
    pos_center: [f64; 2],
    direction: Direction,
    norm: f64,
    transforms: [T; 2],
    reference: Array2<Complex<f64>>,
}

impl ZoomFft2 {
    /// Plan a 2D zoom FFT using the chirp-z transform along each axis.
    ///
    /// * `n` - input shape
    /// * `m` - output shape
    /// * `f_center` - center frequency of the output window in cycles per sample, scalar or per axis
    /// * `f_range` - width of the output window, in units of [`DEFAULT_SAMPLE_RATE`], scalar or per axis
    /// * `pos_center` - position in the input that maps to zero phase, defaults to the center of the input array
    /// * `direction` - output orientation
    pub fn new(
        n: [usize; 2],
        m: [usize; 2],
        f_center: impl Into<AxisPair>,
        f_range: impl Into<AxisPair>,
        pos_center: Option<AxisPair>,
        direction: Direction,
    ) -> Result<Self> {
        Self::with_transform(n, m, f_center, f_range, pos_center, direction)
    }
}

impl<T: BandTransform> ZoomFft2<T> {
    /// As [`ZoomFft2::new`], planning each axis with the band transform `T`.
    pub fn with_transform(
        n: [usize; 2],
        m: [usize; 2],
        f_center: impl Into<AxisPair>,
        f_range: impl Into<AxisPair>,
        pos_center: Option<AxisPair>,
        direction: Direction,
    ) -> Result<Self> {
        if n.contains(&0) {
            return Err(ZoomError::invalid("n", format!("input shape must be non-empty, got {:?}", n)));
        }
        if m.contains(&0) {
            return Err(ZoomError::invalid("m", format!("output shape must be non-empty, got {:?}", m)));
        }

        // Intervals are in units of a sample rate of 2, doubling the center makes it cycles per sample.
        let f_center = f_center.into().resolve("f_center")?;
        let f_center = [2.0 * f_center[0], 2.0 * f_center[1]];

        let f_range = f_range.into().resolve("f_range")?;
        if f_range.iter().any(|&r| r <= 0.0) {
            return Err(ZoomError::invalid(
                "f_range",
                format!("frequency span must be positive, got {:?}", f_range),
            ));
        }

        let pos_center = match pos_center {
            Some(p) => p.resolve_pair("pos_center")?,
            None => [(n[0] as f64 - 1.0) / 2.0, (n[1] as f64 - 1.0) / 2.0],
        };

        let interval0 = [f_center[0] - f_range[0] / 2.0, f_center[0] + f_range[0] / 2.0];
        let interval1 = [f_center[1] - f_range[1] / 2.0, f_center[1] + f_range[1] / 2.0];

        debug!(
            "planning zoom fft2: n {:?} m {:?} f_center {:?} f_range {:?} intervals {:?} {:?} pos_center {:?} {:?}",
            n, m, f_center, f_range, interval0, interval1, pos_center, direction
        );

        let transforms = [
            T::plan(n[0], m[0], interval0)?,
            T::plan(n[1], m[1], interval1)?,
        ];

        let mut zfft = ZoomFft2 {
            n,
            m,
            f_center,
            f_range,
            pos_center,
            direction,
            norm: ((n[0] * n[1]) as f64).sqrt(),
            transforms,
            reference: Array2::zeros([0, 0]),
        };
        zfft.reference = zfft.calibrate();
        Ok(zfft)
    }

    /// Computes the phase reference from the spectrum of the calibration impulse.
    fn calibrate(&self) -> Array2<Complex<f64>> {
        for (axis, (&p, &len)) in self.pos_center.iter().zip(&self.n).enumerate() {
            if !(0.0..=(len - 1) as f64).contains(&p) {
                warn!(
                    "pos_center {} on axis {} is outside the input (length {}), the phase reference is not meaningful",
                    p, axis, len
                );
            }
        }

        let ref0 = self.spectrum(&self.calibration_impulse());
        ref0.mapv(|e| Complex::from_polar(1.0, -e.arg()))
    }

    /// The synthetic input used to calibrate the phase reference.
    ///
    /// This is a 2x2 block of ones straddling `pos_center`, clipped to the array bounds.
    pub fn calibration_impulse(&self) -> Array2<f64> {
        let w0 = calibration_window(self.pos_center[0], self.n[0]);
        let w1 = calibration_window(self.pos_center[1], self.n[1]);
        trace!("calibration window rows {:?} cols {:?}", w0, w1);

        let mut impulse = Array2::zeros(self.n);
        impulse.slice_mut(s![w0, w1]).fill(1.0);
        impulse
    }

    /// Transform `input` without the phase reference: both axis transforms, normalisation and reorientation.
    ///
    /// `input` must have the planned input shape.
    pub fn spectrum<S, A>(&self, input: &ArrayBase<S, Ix2>) -> Array2<Complex<f64>>
    where
        S: Data<Elem = A>,
        A: Clone + Into<Complex<f64>>,
    {
        assert_eq!(
            input.shape(),
            &self.n[..],
            "input shape does not match the planned zoom fft"
        );
        let input: Array2<Complex<f64>> = input.mapv(Into::into);

        let partial = self.transforms[0].transform(input.view(), Axis(0));
        let mut out = self.transforms[1].transform(partial.view(), Axis(1));

        let normalisation = 1.0 / self.norm;
        out.par_mapv_inplace(|e| e * normalisation);

        match self.direction {
            Direction::Forward => out,
            Direction::Backward => out.slice(s![..;-1, ..;-1]).to_owned(),
        }
    }

    /// Transform `input`, returning the phase referenced spectrum window of the output shape.
    ///
    /// `input` may be real or complex and must have the planned input shape.
    pub fn apply<S, A>(&self, input: &ArrayBase<S, Ix2>) -> Array2<Complex<f64>>
    where
        S: Data<Elem = A>,
        A: Clone + Into<Complex<f64>>,
    {
        let mut out = self.spectrum(input);
        Zip::from(&mut out)
            .and(&self.reference)
            .par_for_each(|e, &r| *e *= r);
        out
    }

    pub fn input_shape(&self) -> [usize; 2] {
        self.n
    }

    pub fn output_shape(&self) -> [usize; 2] {
        self.m
    }

    /// Center frequency of each axis as stored, that is doubled, in units of [`DEFAULT_SAMPLE_RATE`].
    pub fn f_center(&self) -> [f64; 2] {
        self.f_center
    }

    pub fn f_range(&self) -> [f64; 2] {
        self.f_range
    }

    pub fn pos_center(&self) -> [f64; 2] {
        self.pos_center
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// `sqrt(n0 * n1)`, the divisor applied to every output.
    pub fn norm(&self) -> f64 {
        self.norm
    }

    /// The unit magnitude phase reference multiplied into every output.
    pub fn reference(&self) -> &Array2<Complex<f64>> {
        &self.reference
    }

    /// Frequency in cycles per sample of each output index along `axis`, in output order.
    pub fn frequencies(&self, axis: Axis) -> Array1<f64> {
        let i = axis.index();
        assert!(i < 2, "zoom fft2 has two axes, got {:?}", axis);
        let len = self.m[i];
        let half_range = self.f_range[i] / 2.0;
        let start = self.f_center[i] - half_range;
        let step = if len > 1 { 2.0 * half_range / (len - 1) as f64 } else { 0.0 };
        let freqs = Array1::from_shape_fn(len, |k| (start + k as f64 * step) / DEFAULT_SAMPLE_RATE);
        match self.direction {
            Direction::Forward => freqs,
            Direction::Backward => freqs.slice(s![..;-1]).to_owned(),
        }
    }
}

/// Two sample window straddling `pos` on an axis of length `len`, clipped to the axis.
///
/// Integral positions use the window one past the center, other positions the window starting at `floor(pos)`.
fn calibration_window(pos: f64, len: usize) -> Range<usize> {
    let base = pos.floor();
    let start = if (2.0 * pos) % 2.0 == 0.0 { base + 1.0 } else { base };
    let end = start + 2.0;
    let clip = |v: f64| v.max(0.0).min(len as f64) as usize;
    clip(start)..clip(end)
}
