//! Coordinate grids, plane-wave references and cropping for sampled fields.

use ndarray::{Array1, Array2, ArrayBase, ArrayView, ArrayView2, Axis, Data, Dimension, Slice, Zip};
use num_complex::Complex;
use std::f64::consts::PI;

/// `num` evenly spaced values from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, num: usize) -> Array1<f64> {
    if num == 1 {
        return Array1::from_elem(1, start);
    }
    Array1::linspace(start, stop, num)
}

/// Normalised coordinates of an `n` x `n` grid spanning `[-1, 1]` on each axis.
///
/// Returns `(x, y)` where `x[[i, j]]` varies along columns and `y[[i, j]]` along rows.
pub fn meshgrid(n: usize) -> (Array2<f64>, Array2<f64>) {
    let coords = linspace(-1.0, 1.0, n);
    let x = Array2::from_shape_fn([n, n], |(_, j)| coords[j]);
    let y = Array2::from_shape_fn([n, n], |(i, _)| coords[i]);
    (x, y)
}

/// Plane wave `exp(2πi (x fx' + y fy'))` sampled on the coordinate grids `x` and `y`.
///
/// `fx` and `fy` are scaled by half the number of columns and rows respectively, so on a
/// [`meshgrid`] spanning `[-1, 1]` they are in cycles per sample relative to a sample rate of 2.
pub fn generate_reference(x: ArrayView2<f64>, y: ArrayView2<f64>, fx: f64, fy: f64) -> Array2<Complex<f64>> {
    assert_eq!(x.shape(), y.shape(), "coordinate grids must have the same shape");
    let fx = fx * x.shape()[1] as f64 / 2.0;
    let fy = fy * x.shape()[0] as f64 / 2.0;

    Zip::from(&x)
        .and(&y)
        .par_map_collect(|&x, &y| Complex::new(0.0, 2.0 * PI * (x * fx + y * fy)).exp())
}

/// A view of the centered `crop_height` x `crop_width` region of the first two axes of `img`.
///
/// Crop sizes larger than the array are clamped, so an oversized crop returns the whole array.
/// Any trailing axes, such as colour channels, are kept whole.
pub fn crop_center<A, S, D>(img: &ArrayBase<S, D>, crop_width: usize, crop_height: usize) -> ArrayView<'_, A, D>
where
    S: Data<Elem = A>,
    D: Dimension,
{
    assert!(img.ndim() >= 2, "crop_center needs at least two axes, got {}", img.ndim());
    let img_height = img.shape()[0];
    let img_width = img.shape()[1];
    let crop_width = crop_width.min(img_width);
    let crop_height = crop_height.min(img_height);

    let mut view = img.view();
    view.slice_axis_inplace(
        Axis(0),
        Slice::from((img_height - crop_height) / 2..(img_height + crop_height) / 2),
    );
    view.slice_axis_inplace(
        Axis(1),
        Slice::from((img_width - crop_width) / 2..(img_width + crop_width) / 2),
    );
    view
}

#[cfg(test)]
mod tests {
    use super::{crop_center, generate_reference, linspace, meshgrid};
    use ndarray::{s, Array2, Array3};
    use num_complex::Complex;
    use std::f64::consts::PI;

    #[test]
    fn linspace_endpoints() {
        assert_eq!(linspace(-1.0, 1.0, 5).to_vec(), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(linspace(-1.0, 1.0, 1).to_vec(), vec![-1.0]);
        assert_eq!(linspace(-1.0, 1.0, 0).len(), 0);
    }

    #[test]
    fn meshgrid_orientation() {
        let (x, y) = meshgrid(3);
        assert_eq!(x.row(0).to_vec(), vec![-1.0, 0.0, 1.0]);
        assert_eq!(x.column(2).to_vec(), vec![1.0, 1.0, 1.0]);
        assert_eq!(y.column(0).to_vec(), vec![-1.0, 0.0, 1.0]);
        assert_eq!(y.row(1).to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn reference_is_unit_plane_wave() {
        let (x, y) = meshgrid(8);
        let flat = generate_reference(x.view(), y.view(), 0.0, 0.0);
        assert!(flat.iter().all(|e| (e.re - 1.0).abs() < 1e-12 && e.im.abs() < 1e-12));

        let (fx, fy) = (0.3, -0.1);
        let wave = generate_reference(x.view(), y.view(), fx, fy);
        for ((i, j), e) in wave.indexed_iter() {
            assert!((e.norm() - 1.0).abs() < 1e-12);
            let theta = 2.0 * PI * (x[[i, j]] * fx * 4.0 + y[[i, j]] * fy * 4.0);
            assert!((e - Complex::new(0.0, theta).exp()).norm() < 1e-9);
        }
    }

    #[test]
    fn crop_clamps_to_array() {
        let img = Array2::from_shape_fn([6, 9], |(i, j)| (i * 9 + j) as f64);
        let full = crop_center(&img, 20, 100);
        assert_eq!(full, img.view());
    }

    #[test]
    fn crop_is_idempotent_at_exact_size() {
        let img = Array2::from_shape_fn([7, 10], |(i, j)| (i * 10 + j) as u32);
        let once = crop_center(&img, 4, 3);
        assert_eq!(once.shape(), &[3, 4]);
        assert_eq!(once, img.slice(s![2..5, 3..7]));
        let twice = crop_center(&once, 4, 3);
        assert_eq!(twice, once);
    }

    #[test]
    fn crop_keeps_channels() {
        let img = Array3::<f64>::zeros([10, 12, 4]);
        let cropped = crop_center(&img, 5, 6);
        assert_eq!(cropped.shape(), &[6, 5, 4]);
    }
}
