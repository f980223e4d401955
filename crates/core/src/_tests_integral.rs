#![cfg(test)]

use std::f64::consts::TAU;

use super::field::{RealField2D, VectorField2D};
use super::grid::Grid2D;
use super::integral::IntegralField;

fn assemble(grid: Grid2D, v: &VectorField2D) -> IntegralField {
    let mut field = IntegralField::new(grid);
    field.assemble(v).unwrap();
    field
}

/// Segment-by-segment trapezoidal line integral along +x, with periodic
/// index wrap. Reference implementation for the O(1) formula.
fn trapz_x(u: &RealField2D, j: isize, i0: isize, i1: isize) -> f64 {
    let grid = u.grid();
    let n = grid.nx as isize;
    let jw = j.rem_euclid(grid.ny as isize) as usize;
    let h = grid.dx();
    let mut acc = 0.0;
    for i in i0..i1 {
        let a = u.get(i.rem_euclid(n) as usize, jw);
        let b = u.get((i + 1).rem_euclid(n) as usize, jw);
        acc += 0.5 * h * (a + b);
    }
    acc
}

fn trapz_y(v: &RealField2D, i: isize, j0: isize, j1: isize) -> f64 {
    let grid = v.grid();
    let n = grid.ny as isize;
    let iw = i.rem_euclid(grid.nx as isize) as usize;
    let h = grid.dy();
    let mut acc = 0.0;
    for j in j0..j1 {
        let a = v.get(iw, j.rem_euclid(n) as usize);
        let b = v.get(iw, (j + 1).rem_euclid(n) as usize);
        acc += 0.5 * h * (a + b);
    }
    acc
}

fn brute_circulation(v: &VectorField2D, origin: (isize, isize), size: (usize, usize)) -> f64 {
    let (ia, ja) = origin;
    let ib = ia + size.0 as isize;
    let jb = ja + size.1 as isize;
    trapz_x(&v.x, ja, ia, ib) + trapz_y(&v.y, ib, ja, jb)
        - trapz_x(&v.x, jb, ia, ib)
        - trapz_y(&v.y, ia, ja, jb)
}

fn smooth_test_field(grid: Grid2D) -> VectorField2D {
    let mut v = VectorField2D::zeros(grid);
    for iy in 0..grid.ny {
        let y = iy as f64 * grid.dy();
        for ix in 0..grid.nx {
            let x = ix as f64 * grid.dx();
            v.x.set(ix, iy, (x).sin() * (2.0 * y).cos() + 0.3 * y.cos());
            v.y.set(ix, iy, (x).cos() * (y).sin() - 0.5 * (2.0 * x).sin());
        }
    }
    v
}

#[test]
fn constant_flow_has_zero_circulation() {
    let grid = Grid2D::new(8, 8, TAU, TAU);
    let mut v = VectorField2D::zeros(grid);
    v.x.fill(1.0);
    let field = assemble(grid, &v);
    for iy in 0..8 {
        for ix in 0..8 {
            for r in [1usize, 3, 5, 8] {
                let gamma = field.circulation((ix as isize, iy as isize), (r, r));
                assert!(gamma.abs() < 1e-12, "gamma = {gamma} at ({ix},{iy}) r={r}");
            }
        }
    }
}

#[test]
fn solid_body_rotation_is_twice_the_loop_area() {
    let n = 32;
    let grid = Grid2D::new(n, n, TAU, TAU);
    let mut v = VectorField2D::zeros(grid);
    for iy in 0..n {
        let y = iy as f64 * grid.dy();
        for ix in 0..n {
            let x = ix as f64 * grid.dx();
            v.x.set(ix, iy, -y + std::f64::consts::PI);
            v.y.set(ix, iy, x - std::f64::consts::PI);
        }
    }
    let field = assemble(grid, &v);

    for r in [2usize, 4, 8] {
        let expected = 2.0 * (r as f64 * grid.dx()) * (r as f64 * grid.dy());
        // centred loops that stay inside the period; the sampled field is
        // a sawtooth across the seam, so wrapped loops see the seam sheet
        let c = r / 2 + 1;
        for iy in c..n - c {
            for ix in c..n - c {
                let gamma = field.circulation(
                    (ix as isize - (r / 2) as isize, iy as isize - (r / 2) as isize),
                    (r, r),
                );
                assert!(
                    (gamma - expected).abs() < 1e-10,
                    "gamma = {gamma}, expected {expected} at ({ix},{iy}) r={r}"
                );
            }
        }
    }
}

#[test]
fn matches_brute_force_line_integrals_including_wraps() {
    let grid = Grid2D::new(16, 12, TAU, 1.5 * TAU);
    let v = smooth_test_field(grid);
    let field = assemble(grid, &v);

    let cases: &[((isize, isize), (usize, usize))] = &[
        ((0, 0), (4, 4)),
        ((3, 5), (7, 2)),
        ((-3, -2), (5, 6)),       // wraps below on both axes
        ((14, 10), (6, 7)),       // wraps above on both axes
        ((-20, 25), (4, 4)),      // more than one period away
        ((2, 3), (16, 5)),        // spans the full x period
        ((5, 1), (3, 12)),        // spans the full y period
        ((0, 0), (32, 24)),       // two full periods on both axes
    ];
    for &(origin, size) in cases {
        let fast = field.circulation(origin, size);
        let brute = brute_circulation(&v, origin, size);
        assert!(
            (fast - brute).abs() < 1e-10,
            "origin {origin:?} size {size:?}: fast {fast} vs brute {brute}"
        );
    }
}

#[test]
fn full_period_loops_sum_to_zero_around_the_torus() {
    let grid = Grid2D::new(16, 16, TAU, TAU);
    let v = smooth_test_field(grid);
    let field = assemble(grid, &v);

    for r in [1usize, 3, 5] {
        let mut sum = 0.0;
        for j in 0..16 {
            sum += field.circulation((0, j as isize), (16, r));
        }
        assert!(sum.abs() < 1e-10, "x-spanning sum = {sum} for ry = {r}");

        let mut sum = 0.0;
        for i in 0..16 {
            sum += field.circulation((i as isize, 0), (r, 16));
        }
        assert!(sum.abs() < 1e-10, "y-spanning sum = {sum} for rx = {r}");
    }
}

#[test]
fn grid_sized_loop_has_zero_circulation() {
    let grid = Grid2D::new(16, 16, TAU, TAU);
    let v = smooth_test_field(grid);
    let field = assemble(grid, &v);
    for origin in [(0, 0), (5, 9), (-3, 20)] {
        let gamma = field.circulation(origin, (16, 16));
        assert!(gamma.abs() < 1e-12, "gamma = {gamma} at {origin:?}");
    }
}

#[test]
fn circulation_field_matches_pointwise_evaluation() {
    let grid = Grid2D::new(16, 12, TAU, TAU);
    let v = smooth_test_field(grid);
    let field = assemble(grid, &v);

    let size = (5usize, 3usize);
    let mut out = RealField2D::zeros(grid);
    field.circulation_field(size, &mut out).unwrap();

    for iy in 0..grid.ny {
        for ix in 0..grid.nx {
            let expected = field.circulation(
                (ix as isize - (size.0 / 2) as isize, iy as isize - (size.1 / 2) as isize),
                size,
            );
            assert_eq!(out.get(ix, iy), expected);
        }
    }
}
