#![cfg(test)]

use std::f64::consts::{PI, TAU};

use circ2d_core::backend::{FftAxis, SpectralBackend};
use circ2d_core::circulation::ConvolutionPlan;
use circ2d_core::derive::{density, velocity, MomentumWorkspace};
use circ2d_core::field::{Field2D, RealField2D, VectorField2D};
use circ2d_core::grid::Grid2D;
use circ2d_core::integral::IntegralField;
use circ2d_core::kernels::{corner_offset, LoopKernel};
use circ2d_core::params::GpParams;
use circ2d_core::resample::resample_spectrum;
use num_complex::Complex64;

use crate::CpuBackend;

fn plane_wave(grid: Grid2D, mx: i32, my: i32) -> Field2D {
    let mut field = Field2D::zeros(grid);
    for iy in 0..grid.ny {
        let y = iy as f64 * grid.dy();
        for ix in 0..grid.nx {
            let x = ix as f64 * grid.dx();
            let phase = TAU * (mx as f64 * x / grid.lx + my as f64 * y / grid.ly);
            field.set(ix, iy, Complex64::new(phase.cos(), phase.sin()));
        }
    }
    field
}

/// A few low modes in both components; periodic and band-limited.
fn smooth_shear_field(grid: Grid2D) -> VectorField2D {
    let mut v = VectorField2D::zeros(grid);
    for iy in 0..grid.ny {
        let y = iy as f64 * grid.dy();
        for ix in 0..grid.nx {
            let x = ix as f64 * grid.dx();
            v.x.set(ix, iy, x.sin() * (2.0 * y).cos() + 0.3 * y.cos());
            v.y.set(ix, iy, x.cos() * y.sin() - 0.5 * (2.0 * x).sin());
        }
    }
    v
}

/// Evaluate one loop size through both circulation paths and return the
/// largest pointwise difference.
fn max_path_difference(v: &VectorField2D, grid: Grid2D, r: usize) -> f64 {
    let kernel = LoopKernel::Rectangle {
        rx: r as f64 * grid.dx(),
        ry: r as f64 * grid.dy(),
    };
    let kernel_hat = kernel.materialise(grid, corner_offset((r, r), grid));
    let mut plan = ConvolutionPlan::new(CpuBackend::new(), grid);
    plan.load_velocity(v).unwrap();
    let mut gamma_conv = RealField2D::zeros(grid);
    plan.circulation(&kernel_hat, &mut gamma_conv).unwrap();

    let mut integral = IntegralField::new(grid);
    integral.assemble(v).unwrap();
    let mut gamma_int = RealField2D::zeros(grid);
    integral.circulation_field((r, r), &mut gamma_int).unwrap();

    gamma_conv
        .as_slice()
        .iter()
        .zip(gamma_int.as_slice())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

#[test]
fn fft_roundtrip_restores_the_field() {
    let backend = CpuBackend::new();
    let grid = Grid2D::new(16, 12, TAU, TAU);
    let mut field = Field2D::zeros(grid);
    for (idx, value) in field.as_mut_slice().iter_mut().enumerate() {
        *value = Complex64::new((idx as f64 * 0.37).sin(), (idx as f64 * 0.11).cos());
    }
    let original = field.clone();

    backend.forward_fft_2d(&mut field);
    backend.inverse_fft_2d(&mut field);
    for (a, b) in field.as_slice().iter().zip(original.as_slice()) {
        assert!((a - b).norm() < 1e-12);
    }

    backend.forward_fft_axis(&mut field, FftAxis::Y);
    backend.inverse_fft_axis(&mut field, FftAxis::Y);
    for (a, b) in field.as_slice().iter().zip(original.as_slice()) {
        assert!((a - b).norm() < 1e-12);
    }
}

#[test]
fn forward_fft_places_a_plane_wave_at_its_mode() {
    let backend = CpuBackend::new();
    let grid = Grid2D::new(8, 8, 1.0, 1.0);
    let mut field = plane_wave(grid, 1, 0);
    backend.forward_fft_2d(&mut field);

    let peak = field.get(1, 0);
    assert!((peak.re - 64.0).abs() < 1e-9, "peak = {peak}");
    let off = field.get(2, 3);
    assert!(off.norm() < 1e-9);
}

#[test]
fn momentum_of_a_plane_wave_is_uniform() {
    let backend = CpuBackend::new();
    let grid = Grid2D::new(32, 32, TAU, TAU);
    let params = GpParams::new(vec![32, 32], vec![TAU, TAU], 1.0, 0.05).unwrap();
    // psi = exp(i (3x - 2y)): p = alpha * (3, -2) everywhere
    let psi = plane_wave(grid, 3, -2);

    let mut workspace = MomentumWorkspace::new(backend, grid, &params);
    let mut p = VectorField2D::zeros(grid);
    workspace.momentum(&psi, &mut p).unwrap();

    let alpha = params.momentum_prefactor();
    for idx in 0..grid.len() {
        assert!((p.x.as_slice()[idx] - 3.0 * alpha).abs() < 1e-10);
        assert!((p.y.as_slice()[idx] + 2.0 * alpha).abs() < 1e-10);
    }
}

#[test]
fn resampler_preserves_a_pure_mode() {
    let backend = CpuBackend::new();
    let coarse = Grid2D::new(16, 16, TAU, TAU);
    let fine = Grid2D::new(32, 32, TAU, TAU);

    let mut field = plane_wave(coarse, 3, -2);
    backend.forward_fft_2d(&mut field);

    let mut resampled = Field2D::zeros(fine);
    resample_spectrum(&field, &mut resampled).unwrap();
    backend.inverse_fft_2d(&mut resampled);

    let expected = plane_wave(fine, 3, -2);
    for (a, b) in resampled.as_slice().iter().zip(expected.as_slice()) {
        assert!((a - b).norm() < 1e-12);
    }
}

#[test]
fn convolution_circulation_matches_the_analytic_single_mode() {
    let backend = CpuBackend::new();
    let n = 64;
    let grid = Grid2D::new(n, n, TAU, TAU);

    // v = (0, sin x): omega = cos x
    let mut v = VectorField2D::zeros(grid);
    for iy in 0..n {
        for ix in 0..n {
            let x = ix as f64 * grid.dx();
            v.y.set(ix, iy, x.sin());
        }
    }

    let rx = 10.0 * grid.dx();
    let ry = 6.0 * grid.dy();
    let kernel = LoopKernel::Rectangle { rx, ry };
    let kernel_hat = kernel.materialise(grid, corner_offset((10, 6), grid));

    let mut plan = ConvolutionPlan::new(backend, grid);
    plan.load_velocity(&v).unwrap();
    let mut gamma = RealField2D::zeros(grid);
    plan.circulation(&kernel_hat, &mut gamma).unwrap();

    for iy in 0..n {
        for ix in 0..n {
            let x = ix as f64 * grid.dx();
            let expected = ry * 2.0 * x.cos() * (0.5 * rx).sin();
            assert!(
                (gamma.get(ix, iy) - expected).abs() < 1e-10,
                "gamma {} vs {} at ({ix},{iy})",
                gamma.get(ix, iy),
                expected
            );
        }
    }
}

#[test]
fn integral_and_convolution_paths_agree_on_a_smooth_field() {
    let n = 64;
    let grid = Grid2D::new(n, n, TAU, TAU);
    let v = smooth_shear_field(grid);

    // the spectral path integrates the trigonometric interpolant exactly;
    // the integral field uses trapezoids, so they agree to quadrature error
    let diff = max_path_difference(&v, grid, 8);
    assert!(diff < 2e-2, "paths differ by {diff} for r = 8");
}

#[test]
fn integral_and_convolution_paths_agree_for_odd_loop_sizes() {
    let n = 64;
    let grid = Grid2D::new(n, n, TAU, TAU);
    let v = smooth_shear_field(grid);

    // odd sizes put the loop centre half a cell past the node; the kernel
    // phase offset must land both paths on the same rectangle, leaving
    // only quadrature error (a half-cell mismatch would be several times
    // this bound at r = 3 and 5)
    for r in [1usize, 3, 5] {
        let diff = max_path_difference(&v, grid, r);
        assert!(diff < 5e-3, "paths differ by {diff} for r = {r}");
    }
}

#[test]
fn lattice_vortices_carry_quantised_circulation() {
    let backend = CpuBackend::new();
    let n = 64;
    let grid = Grid2D::new(n, n, TAU, TAU);
    let params = GpParams::new(vec![n, n], vec![TAU, TAU], 1.0, 0.05).unwrap();

    // A periodic phase field with two +1 vortices at (pi, pi), (0, 0) and
    // two -1 vortices at (0, pi), (pi, 0); |psi| = 1 away from the cores.
    let mut psi = Field2D::zeros(grid);
    for iy in 0..n {
        let y = iy as f64 * grid.dy();
        for ix in 0..n {
            let x = ix as f64 * grid.dx();
            let theta = (y - PI).sin().atan2((x - PI).sin());
            psi.set(ix, iy, Complex64::new(theta.cos(), theta.sin()));
        }
    }

    let mut workspace = MomentumWorkspace::new(backend.clone(), grid, &params);
    let mut p = VectorField2D::zeros(grid);
    workspace.momentum(&psi, &mut p).unwrap();
    let mut rho = RealField2D::zeros(grid);
    density(&psi, &mut rho).unwrap();
    let mut v = VectorField2D::zeros(grid);
    velocity(&p, &rho, 0.0, &mut v).unwrap();

    let side = 10.0 * grid.dx();
    let kernel_hat = LoopKernel::Rectangle { rx: side, ry: side }
        .materialise(grid, corner_offset((10, 10), grid));
    let mut plan = ConvolutionPlan::new(backend, grid);
    plan.load_velocity(&v).unwrap();
    let mut gamma = RealField2D::zeros(grid);
    plan.circulation(&kernel_hat, &mut gamma).unwrap();

    let kappa = params.kappa();
    let winding = |ix: usize, iy: usize| (gamma.get(ix, iy) / kappa).round() as i64;
    assert_eq!(winding(n / 2, n / 2), 1, "positive core at (pi, pi)");
    assert_eq!(winding(0, 0), 1, "positive core at (0, 0)");
    assert_eq!(winding(n / 2, 0), -1, "negative core at (pi, 0)");
    assert_eq!(winding(0, n / 2), -1, "negative core at (0, pi)");
    // far from every core the loop encloses no charge
    assert_eq!(winding(n / 4, n / 4), 0);
    assert!((gamma.get(n / 2, n / 2) - kappa).abs() < 0.3 * kappa);
}
