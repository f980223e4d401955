#![cfg(test)]

use std::f64::consts::TAU;

use num_complex::Complex64;

use super::derive::{density, regularised_velocity, velocity};
use super::error::CoreError;
use super::field::{Field2D, RealField2D, VectorField2D};
use super::grid::Grid2D;

#[test]
fn density_is_the_squared_modulus() {
    let grid = Grid2D::new(4, 4, TAU, TAU);
    let mut psi = Field2D::zeros(grid);
    psi.set(1, 2, Complex64::new(3.0, 4.0));
    let mut rho = RealField2D::zeros(grid);
    density(&psi, &mut rho).unwrap();
    assert_eq!(rho.get(1, 2), 25.0);
    assert_eq!(rho.get(0, 0), 0.0);
}

#[test]
fn density_rejects_mismatched_grids() {
    let psi = Field2D::zeros(Grid2D::new(4, 4, TAU, TAU));
    let mut rho = RealField2D::zeros(Grid2D::new(8, 4, TAU, TAU));
    assert!(matches!(
        density(&psi, &mut rho),
        Err(CoreError::DimensionMismatch(_))
    ));
}

#[test]
fn velocity_divides_by_regularised_density() {
    let grid = Grid2D::new(2, 2, TAU, TAU);
    let mut p = VectorField2D::zeros(grid);
    p.x.fill(2.0);
    p.y.fill(-4.0);
    let mut rho = RealField2D::zeros(grid);
    rho.fill(1.0);
    let mut v = VectorField2D::zeros(grid);
    velocity(&p, &rho, 1.0, &mut v).unwrap();
    assert_eq!(v.x.get(0, 0), 1.0);
    assert_eq!(v.y.get(1, 1), -2.0);
}

#[test]
fn velocity_rejects_zero_density_without_epsilon() {
    let grid = Grid2D::new(2, 2, TAU, TAU);
    let p = VectorField2D::zeros(grid);
    let rho = RealField2D::zeros(grid);
    let mut v = VectorField2D::zeros(grid);
    assert!(matches!(
        velocity(&p, &rho, 0.0, &mut v),
        Err(CoreError::NumericDomain(_))
    ));
}

#[test]
fn regularised_velocity_scales_by_inverse_sqrt_density() {
    let grid = Grid2D::new(2, 2, TAU, TAU);
    let mut p = VectorField2D::zeros(grid);
    p.x.fill(3.0);
    let mut rho = RealField2D::zeros(grid);
    rho.fill(9.0);
    let mut v = VectorField2D::zeros(grid);
    regularised_velocity(&p, &rho, &mut v).unwrap();
    assert_eq!(v.x.get(0, 0), 1.0);
    assert_eq!(v.y.get(0, 0), 0.0);
}
