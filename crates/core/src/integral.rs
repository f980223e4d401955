//! Cumulative line integrals enabling O(1) rectangle circulation.

use crate::error::CoreError;
use crate::field::{RealField2D, VectorField2D};
use crate::grid::{Grid2D, PeriodicAxis};

/// Precomputed per-row/column integral data for one 2D vector field.
///
/// `mean_x[j]` is the mean of u along x at row j; `wx[(i, j)]` is the
/// cumulative trapezoidal integral from 0 to x_i of (u - mean_x[j]).
/// The y direction is analogous with v. Because the row mean is
/// subtracted, the cumulative integral over a full period is identically
/// zero, so wrapped loop segments are carried by the mean terms alone.
pub struct IntegralField {
    grid: Grid2D,
    axis_x: PeriodicAxis,
    axis_y: PeriodicAxis,
    mean_x: Vec<f64>,
    mean_y: Vec<f64>,
    wx: RealField2D,
    wy: RealField2D,
}

impl IntegralField {
    /// Allocate zeroed integral data for one slice shape. The buffers are
    /// reused across slices via `assemble`.
    pub fn new(grid: Grid2D) -> Self {
        Self {
            grid,
            axis_x: grid.axis_x(),
            axis_y: grid.axis_y(),
            mean_x: vec![0.0; grid.ny],
            mean_y: vec![0.0; grid.nx],
            wx: RealField2D::zeros(grid),
            wy: RealField2D::zeros(grid),
        }
    }

    pub fn grid(&self) -> Grid2D {
        self.grid
    }

    /// Rebuild the means and cumulative deviations from a vector field.
    pub fn assemble(&mut self, v: &VectorField2D) -> Result<(), CoreError> {
        if v.grid() != self.grid {
            return Err(CoreError::DimensionMismatch(
                "integral field grid does not match the vector field".into(),
            ));
        }
        let nx = self.grid.nx;
        let ny = self.grid.ny;
        let hx = self.grid.dx();
        let hy = self.grid.dy();

        let u = v.x.as_slice();
        for j in 0..ny {
            let row = &u[j * nx..(j + 1) * nx];
            let mean = row.iter().sum::<f64>() / nx as f64;
            self.mean_x[j] = mean;
            let w = self.wx.as_mut_slice();
            w[j * nx] = 0.0;
            for i in 1..nx {
                let seg = 0.5 * hx * ((row[i - 1] - mean) + (row[i] - mean));
                w[j * nx + i] = w[j * nx + i - 1] + seg;
            }
        }

        let vv = v.y.as_slice();
        for i in 0..nx {
            let mut mean = 0.0;
            for j in 0..ny {
                mean += vv[j * nx + i];
            }
            mean /= ny as f64;
            self.mean_y[i] = mean;
            let w = self.wy.as_mut_slice();
            w[i] = 0.0;
            for j in 1..ny {
                let seg = 0.5 * hy * ((vv[(j - 1) * nx + i] - mean) + (vv[j * nx + i] - mean));
                w[j * nx + i] = w[(j - 1) * nx + i] + seg;
            }
        }
        Ok(())
    }

    /// Circulation around the rectangle whose origin corner sits at grid
    /// indices `(i, j)` (unbounded; folded periodically) with integer size
    /// `(rx, ry)` in grid steps. Counterclockwise orientation.
    pub fn circulation(&self, origin: (isize, isize), size: (usize, usize)) -> f64 {
        let (ia, xa) = self.axis_x.wrap(origin.0);
        let (ib, xb) = self.axis_x.wrap(origin.0 + size.0 as isize);
        let (ja, ya) = self.axis_y.wrap(origin.1);
        let (jb, yb) = self.axis_y.wrap(origin.1 + size.1 as isize);

        let wx = self.wx.as_slice();
        let wy = self.wy.as_slice();
        let nx = self.grid.nx;

        let ix_ya = self.mean_x[ja] * (xb - xa) + wx[ja * nx + ib] - wx[ja * nx + ia];
        let ix_yb = self.mean_x[jb] * (xb - xa) + wx[jb * nx + ib] - wx[jb * nx + ia];
        let iy_xa = self.mean_y[ia] * (yb - ya) + wy[jb * nx + ia] - wy[ja * nx + ia];
        let iy_xb = self.mean_y[ib] * (yb - ya) + wy[jb * nx + ib] - wy[ja * nx + ib];

        ix_ya + iy_xb - ix_yb - iy_xa
    }

    /// One output row of the loop sweep. The loop evaluated at a point
    /// has its corner `floor(r/2)` steps below-left, so on odd-sized axes
    /// the loop centre sits half a cell past the point; the convolution
    /// kernels carry the matching phase offset. Rows are independent so
    /// callers may hand disjoint rows to different worker threads.
    pub fn circulation_row(&self, iy: usize, size: (usize, usize), out_row: &mut [f64]) {
        debug_assert_eq!(out_row.len(), self.grid.nx);
        let cx = (size.0 / 2) as isize;
        let cy = (size.1 / 2) as isize;
        let jy = iy as isize - cy;
        for (ix, out) in out_row.iter_mut().enumerate() {
            *out = self.circulation((ix as isize - cx, jy), size);
        }
    }

    /// Gamma at every grid point for loops of size `(rx, ry)` anchored
    /// with the `circulation_row` corner convention.
    pub fn circulation_field(
        &self,
        size: (usize, usize),
        out: &mut RealField2D,
    ) -> Result<(), CoreError> {
        if out.grid() != self.grid {
            return Err(CoreError::DimensionMismatch(
                "circulation output grid does not match the integral field".into(),
            ));
        }
        let nx = self.grid.nx;
        for (iy, row) in out.as_mut_slice().chunks_mut(nx).enumerate() {
            self.circulation_row(iy, size, row);
        }
        Ok(())
    }
}
