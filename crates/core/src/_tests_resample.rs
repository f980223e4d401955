#![cfg(test)]

use std::f64::consts::TAU;

use num_complex::Complex64;

use super::error::CoreError;
use super::field::Field2D;
use super::grid::Grid2D;
use super::resample::resample_spectrum;

fn spectrum_with_marker(grid: Grid2D) -> Field2D {
    let mut field = Field2D::zeros(grid);
    for iy in 0..grid.ny {
        for ix in 0..grid.nx {
            field.set(
                ix,
                iy,
                Complex64::new((ix * grid.ny + iy) as f64, -(ix as f64)),
            );
        }
    }
    field
}

#[test]
fn same_shape_resample_is_a_copy() {
    let grid = Grid2D::new(8, 8, TAU, TAU);
    let src = spectrum_with_marker(grid);
    let mut dst = Field2D::zeros(grid);
    resample_spectrum(&src, &mut dst).unwrap();
    assert_eq!(src.as_slice(), dst.as_slice());
}

#[test]
fn modes_keep_their_signed_frequencies() {
    let src_grid = Grid2D::new(8, 8, TAU, TAU);
    let dst_grid = Grid2D::new(16, 16, TAU, TAU);
    let mut src = Field2D::zeros(src_grid);
    // mode (+2, -3) and the x Nyquist
    src.set(2, 8 - 3, Complex64::new(1.0, 0.5));
    src.set(4, 0, Complex64::new(-2.0, 0.0));

    let mut dst = Field2D::zeros(dst_grid);
    resample_spectrum(&src, &mut dst).unwrap();

    let scale = (dst_grid.len() / src_grid.len()) as f64;
    assert_eq!(dst.get(2, 16 - 3), Complex64::new(scale, 0.5 * scale));
    // the source Nyquist (index n/2) lands on the negative side of dst
    assert_eq!(dst.get(16 - 4, 0), Complex64::new(-2.0 * scale, 0.0));

    let populated = dst.as_slice().iter().filter(|v| **v != Complex64::default()).count();
    assert_eq!(populated, 2);
}

#[test]
fn downscale_is_rejected() {
    let src = Field2D::zeros(Grid2D::new(16, 16, TAU, TAU));
    let mut dst = Field2D::zeros(Grid2D::new(8, 8, TAU, TAU));
    assert!(matches!(
        resample_spectrum(&src, &mut dst),
        Err(CoreError::InvalidShape(_))
    ));
}

#[test]
fn odd_axis_is_rejected() {
    let src = Field2D::zeros(Grid2D::new(6, 7, TAU, TAU));
    let mut dst = Field2D::zeros(Grid2D::new(12, 14, TAU, TAU));
    assert!(matches!(
        resample_spectrum(&src, &mut dst),
        Err(CoreError::InvalidShape(_))
    ));
}

#[test]
fn non_integer_factor_is_rejected() {
    let src = Field2D::zeros(Grid2D::new(8, 8, TAU, TAU));
    let mut dst = Field2D::zeros(Grid2D::new(12, 8, TAU, TAU));
    assert!(matches!(
        resample_spectrum(&src, &mut dst),
        Err(CoreError::InvalidShape(_))
    ));
}

#[test]
fn non_power_of_two_integer_factor_is_accepted() {
    let src = Field2D::zeros(Grid2D::new(8, 8, TAU, TAU));
    let mut dst = Field2D::zeros(Grid2D::new(24, 8, TAU, TAU));
    resample_spectrum(&src, &mut dst).unwrap();
}
