#![cfg(test)]

use std::f64::consts::TAU;

use super::grid::{Grid2D, PeriodicAxis};
use super::params::GpParams;

#[test]
fn idx_is_row_major_with_x_fastest() {
    let grid = Grid2D::new(4, 3, 1.0, 1.0);
    assert_eq!(grid.idx(0, 0), 0);
    assert_eq!(grid.idx(3, 0), 3);
    assert_eq!(grid.idx(0, 1), 4);
    assert_eq!(grid.idx(3, 2), 11);
}

#[test]
fn axis_nodes_span_the_period() {
    let axis = PeriodicAxis::new(8, TAU);
    assert_eq!(axis.node(0), 0.0);
    assert_eq!(axis.node(8), TAU);
    assert!((axis.step() - TAU / 8.0).abs() < 1e-15);
}

#[test]
fn wrap_is_identity_in_range() {
    let axis = PeriodicAxis::new(8, TAU);
    for i in 0..8 {
        let (j, x) = axis.wrap(i as isize);
        assert_eq!(j, i);
        assert_eq!(x, axis.node(i));
    }
}

#[test]
fn wrap_carries_the_period_offset() {
    let axis = PeriodicAxis::new(8, 4.0);
    let (j, x) = axis.wrap(8 + 3);
    assert_eq!(j, 3);
    assert!((x - (4.0 + axis.node(3))).abs() < 1e-15);

    let (j, x) = axis.wrap(-2);
    assert_eq!(j, 6);
    assert!((x - (axis.node(6) - 4.0)).abs() < 1e-15);

    let (j, x) = axis.wrap(3 - 2 * 8);
    assert_eq!(j, 3);
    assert!((x - (axis.node(3) - 8.0)).abs() < 1e-15);
}

#[test]
fn params_derive_kappa_and_steps() {
    let params = GpParams::new(vec![64, 64], vec![TAU, TAU], 1.0, 0.05).unwrap();
    assert_eq!(params.dim(), 2);
    assert_eq!(params.points(), 64 * 64);
    assert!((params.step(0) - TAU / 64.0).abs() < 1e-15);
    let expected = TAU * 0.05 * std::f64::consts::SQRT_2;
    assert!((params.kappa() - expected).abs() < 1e-15);
    // kappa is exactly one winding of the momentum prefactor
    assert!((params.kappa() - TAU * params.momentum_prefactor()).abs() < 1e-15);
}

#[test]
fn params_reject_odd_resolution() {
    assert!(GpParams::new(vec![63, 64], vec![TAU, TAU], 1.0, 0.05).is_err());
    assert!(GpParams::new(vec![64], vec![TAU], 1.0, 0.05).is_err());
    assert!(GpParams::new(vec![64, 64], vec![TAU], 1.0, 0.05).is_err());
}
