//! False colour rendering of complex fields: phase as hue, magnitude as lightness.

use ndarray::{Array3, ArrayView2, Axis, Zip};
use num_complex::Complex;
use palette::{encoding, FromColor, Hsl, Srgb};
use std::f64::consts::PI;

/// Background the magnitude fades into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Theme {
    /// Zero magnitude is black, large magnitudes tend to white
    Dark,
    /// Zero magnitude is white, large magnitudes tend to black
    White,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColorizeOptions {
    pub theme: Theme,
    pub saturation: f64,
    /// Exponent controlling how quickly lightness saturates with magnitude
    pub beta: f64,
    /// Append an alpha channel that fades the background out
    pub transparent: bool,
    /// Exponent applied to the alpha channel
    pub alpha: f64,
    /// Fraction of the peak magnitude that maps to the middle lightness
    pub max_threshold: f64,
}

impl Default for ColorizeOptions {
    fn default() -> Self {
        ColorizeOptions {
            theme: Theme::Dark,
            saturation: 1.0,
            beta: 1.4,
            transparent: false,
            alpha: 1.0,
            max_threshold: 1.0,
        }
    }
}

/// Hue of a phase angle in `[-π, π]`, as a fraction of a turn.
///
/// A phase of `-π` maps to half a turn, so zero phase lands on hue 0 (red).
pub fn phase_hue(theta: f64) -> f64 {
    ((theta + PI) / (2.0 * PI) + 0.5).rem_euclid(1.0)
}

/// Renders `z` as an image of shape `(rows, cols, 3)`, or `(rows, cols, 4)` with an alpha channel when
/// `options.transparent` is set. Channels are in `[0, 1]`.
pub fn colorize(z: ArrayView2<Complex<f64>>, options: &ColorizeOptions) -> Array3<f64> {
    let max = z.iter().fold(0.0f64, |max, e| e.norm().max(max));
    let scale = if max > 0.0 { 1.0 / (options.max_threshold * max) } else { 0.0 };

    let (rows, cols) = z.dim();
    let channels = if options.transparent { 4 } else { 3 };
    let mut img = Array3::zeros([rows, cols, channels]);

    Zip::from(img.lanes_mut(Axis(2)))
        .and(&z)
        .par_for_each(|mut pixel, e| {
            let (r, theta) = e.to_polar();
            let r = r * scale;
            let fade = 1.0 / (1.0 + r.powf(options.beta));
            let lightness = match options.theme {
                Theme::White => fade,
                Theme::Dark => 1.0 - fade,
            };

            let hsl = Hsl::<encoding::Srgb, f64>::new(360.0 * phase_hue(theta), options.saturation, lightness);
            let colour = Srgb::<f64>::from_color(hsl);
            pixel[0] = colour.red;
            pixel[1] = colour.green;
            pixel[2] = colour.blue;

            if options.transparent {
                let a = 1.0 - (colour.red.powi(2) + colour.green.powi(2) + colour.blue.powi(2)) / 3.0;
                pixel[3] = a.powf(options.alpha);
            }
        });

    img
}
