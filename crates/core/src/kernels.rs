//! Fourier-space loop kernels (rectangle and ellipse indicators).
//!
//! Pointwise multiplication by a materialised kernel in spectral space
//! equals physical-space convolution with the loop indicator, which is how
//! the convolution circulation path turns the slice-wide vorticity into a
//! circulation matrix.
//!
//! Rectangle loops are anchored on integer grid nodes: the loop evaluated
//! at a point has its corner `floor(r/2)` steps below-left, so on odd-sized
//! axes its continuous centre sits half a cell past the point. The
//! materialised kernel carries the matching `exp(i k . offset)` phase, so
//! the convolution path integrates exactly the rectangle the integral
//! field evaluates at every loop size. Ellipse kernels have no integer
//! corners and stay truly centred (zero offset).

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::field::Field2D;
use crate::grid::Grid2D;
use crate::wavenumbers::wavenumbers;

/// Closed-loop shape over which circulation is evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopKernel {
    /// Axis-aligned rectangle with physical side lengths (rx, ry).
    Rectangle { rx: f64, ry: f64 },
    /// Ellipse with physical diameters (dx, dy); a disk when equal.
    Ellipse { dx: f64, dy: f64 },
}

impl LoopKernel {
    pub fn area(&self) -> f64 {
        match *self {
            LoopKernel::Rectangle { rx, ry } => rx * ry,
            LoopKernel::Ellipse { dx, dy } => 0.25 * PI * dx * dy,
        }
    }

    /// Materialise the kernel over the two-sided Fourier grid, with its
    /// physical-space centre displaced by `offset` from the evaluation
    /// point. A zero offset yields a real, k-even matrix; pass
    /// `corner_offset` for rectangle loops anchored on integer nodes.
    pub fn materialise(&self, grid: Grid2D, offset: (f64, f64)) -> Field2D {
        let kx = wavenumbers(grid.nx, grid.lx);
        let ky = wavenumbers(grid.ny, grid.ly);
        let area = self.area();
        let mut out = Field2D::zeros(grid);
        let tau = std::f64::consts::TAU;
        match *self {
            LoopKernel::Rectangle { rx, ry } => {
                for iy in 0..grid.ny {
                    let sy = sinc(ky[iy] * ry / tau);
                    for ix in 0..grid.nx {
                        let mag = area * sinc(kx[ix] * rx / tau) * sy;
                        out.set(ix, iy, mag * phase(kx[ix], ky[iy], offset));
                    }
                }
            }
            LoopKernel::Ellipse { dx, dy } => {
                for iy in 0..grid.ny {
                    let qy = ky[iy] * dy;
                    for ix in 0..grid.nx {
                        let qx = kx[ix] * dx;
                        let kr = (qx * qx + qy * qy).sqrt() / tau;
                        out.set(ix, iy, area * j1norm(kr) * phase(kx[ix], ky[iy], offset));
                    }
                }
            }
        }
        out
    }
}

/// Centre offset of a loop of `size` grid steps whose corners sit on
/// integer nodes: half a cell on each odd-sized axis, zero on even ones.
pub fn corner_offset(size: (usize, usize), grid: Grid2D) -> (f64, f64) {
    let off_x = if size.0 % 2 == 1 { 0.5 * grid.dx() } else { 0.0 };
    let off_y = if size.1 % 2 == 1 { 0.5 * grid.dy() } else { 0.0 };
    (off_x, off_y)
}

/// exp(i k . offset); exactly one when the offset vanishes.
fn phase(kx: f64, ky: f64, offset: (f64, f64)) -> Complex64 {
    let arg = kx * offset.0 + ky * offset.1;
    Complex64::new(arg.cos(), arg.sin())
}

/// sin(pi x) / (pi x), with sinc(0) = 1 exactly.
pub fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let t = PI * x;
        t.sin() / t
    }
}

/// 2 J1(pi x) / (pi x), with j1norm(0) = 1 exactly.
pub fn j1norm(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let t = PI * x;
        2.0 * libm::j1(t) / t
    }
}
