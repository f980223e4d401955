#![cfg(test)]

use std::f64::consts::TAU;

use num_complex::Complex64;

use super::grid::Grid2D;
use super::kernels::{corner_offset, j1norm, sinc, LoopKernel};

const CENTRED: (f64, f64) = (0.0, 0.0);

#[test]
fn sinc_and_j1norm_are_one_at_zero() {
    assert_eq!(sinc(0.0), 1.0);
    assert_eq!(j1norm(0.0), 1.0);
}

#[test]
fn sinc_matches_reference_values() {
    // sinc(1/2) = sin(pi/2)/(pi/2) = 2/pi
    assert!((sinc(0.5) - 2.0 / std::f64::consts::PI).abs() < 1e-15);
    // integer arguments are zeros
    for n in 1..5 {
        assert!(sinc(n as f64).abs() < 1e-15);
    }
}

#[test]
fn degenerate_rectangle_is_identically_zero() {
    let grid = Grid2D::new(16, 16, TAU, TAU);
    let g = LoopKernel::Rectangle { rx: 0.0, ry: 0.0 }.materialise(grid, CENTRED);
    assert!(g.as_slice().iter().all(|v| v.norm() == 0.0));
}

#[test]
fn full_period_rectangle_keeps_only_the_mean_mode() {
    let grid = Grid2D::new(16, 16, TAU, TAU);
    let kernel = LoopKernel::Rectangle { rx: TAU, ry: TAU };
    let g = kernel.materialise(grid, CENTRED);
    assert!((g.get(0, 0).re - kernel.area()).abs() < 1e-12);
    assert_eq!(g.get(0, 0).im, 0.0);
    for iy in 0..16 {
        for ix in 0..16 {
            if ix == 0 && iy == 0 {
                continue;
            }
            // sinc hits an integer argument at every non-zero mode
            assert!(g.get(ix, iy).norm() < 1e-12 * kernel.area());
        }
    }
}

#[test]
fn ellipse_kernel_carries_its_area_at_dc() {
    let grid = Grid2D::new(16, 16, TAU, TAU);
    let kernel = LoopKernel::Ellipse { dx: 1.0, dy: 0.5 };
    let g = kernel.materialise(grid, CENTRED);
    assert!((g.get(0, 0).re - kernel.area()).abs() < 1e-14);
    assert!((kernel.area() - 0.25 * std::f64::consts::PI * 0.5).abs() < 1e-15);
}

#[test]
fn centred_rectangle_kernel_is_real_and_even_in_k() {
    let grid = Grid2D::new(16, 16, TAU, TAU);
    let g = LoopKernel::Rectangle { rx: 0.7, ry: 0.4 }.materialise(grid, CENTRED);
    for iy in 0..16 {
        for ix in 0..16 {
            assert_eq!(g.get(ix, iy).im, 0.0);
        }
    }
    for iy in 1..16 {
        for ix in 1..16 {
            let mirrored = g.get(16 - ix, 16 - iy);
            assert!((g.get(ix, iy) - mirrored).norm() < 1e-13);
        }
    }
}

#[test]
fn corner_offset_is_half_a_cell_on_odd_axes() {
    let grid = Grid2D::new(16, 8, TAU, TAU);
    assert_eq!(corner_offset((2, 4), grid), (0.0, 0.0));
    let (off_x, off_y) = corner_offset((3, 4), grid);
    assert!((off_x - 0.5 * grid.dx()).abs() < 1e-15);
    assert_eq!(off_y, 0.0);
    let (off_x, off_y) = corner_offset((5, 7), grid);
    assert!((off_x - 0.5 * grid.dx()).abs() < 1e-15);
    assert!((off_y - 0.5 * grid.dy()).abs() < 1e-15);
}

#[test]
fn offset_kernel_is_the_centred_kernel_times_a_pure_phase() {
    let grid = Grid2D::new(16, 16, TAU, TAU);
    let kernel = LoopKernel::Rectangle {
        rx: 3.0 * grid.dx(),
        ry: 3.0 * grid.dy(),
    };
    let offset = corner_offset((3, 3), grid);
    let centred = kernel.materialise(grid, CENTRED);
    let shifted = kernel.materialise(grid, offset);

    let kx = super::wavenumbers::wavenumbers(grid.nx, grid.lx);
    let ky = super::wavenumbers::wavenumbers(grid.ny, grid.ly);
    for iy in 0..16 {
        for ix in 0..16 {
            let arg = kx[ix] * offset.0 + ky[iy] * offset.1;
            let phase = Complex64::new(arg.cos(), arg.sin());
            let expected = centred.get(ix, iy) * phase;
            assert!((shifted.get(ix, iy) - expected).norm() < 1e-13);
            // magnitudes are untouched by the shift
            assert!((shifted.get(ix, iy).norm() - centred.get(ix, iy).norm()).abs() < 1e-13);
        }
    }
}
