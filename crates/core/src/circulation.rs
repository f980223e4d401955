//! Circulation of a velocity field by spectral convolution with a loop
//! kernel.
//!
//! By Stokes on the periodic torus, the line integral around a loop equals
//! the integral of the 2D curl over the enclosed area, so convolving the
//! vorticity with a loop indicator yields the circulation of the matching
//! loop centred at every grid point in one inverse transform.

use num_complex::Complex64;

use crate::backend::{SpectralBackend, SpectralBuffer};
use crate::error::CoreError;
use crate::field::{Field2D, RealField2D, VectorField2D};
use crate::grid::Grid2D;
use crate::wavenumbers::wavenumbers;

/// Reusable spectral buffers for convolution circulation on one slice
/// shape. Kernel matrices are materialised by the caller (once per loop
/// size) and passed in per evaluation.
pub struct ConvolutionPlan<B: SpectralBackend> {
    backend: B,
    grid: Grid2D,
    kx: Vec<f64>,
    ky: Vec<f64>,
    vort_hat: B::Buffer,
    work: B::Buffer,
}

impl<B: SpectralBackend> ConvolutionPlan<B> {
    pub fn new(backend: B, grid: Grid2D) -> Self {
        let kx = wavenumbers(grid.nx, grid.lx);
        let ky = wavenumbers(grid.ny, grid.ly);
        let vort_hat = backend.alloc_field(grid);
        let work = backend.alloc_field(grid);
        Self {
            backend,
            grid,
            kx,
            ky,
            vort_hat,
            work,
        }
    }

    pub fn grid(&self) -> Grid2D {
        self.grid
    }

    /// Transform (v_x, v_y) and form the spectral vorticity
    /// omega_hat = i (k_x v_y_hat - k_y v_x_hat). Call once per slice and
    /// vector field; subsequent `circulation` calls reuse the result.
    pub fn load_velocity(&mut self, v: &VectorField2D) -> Result<(), CoreError> {
        if v.grid() != self.grid {
            return Err(CoreError::DimensionMismatch(
                "convolution plan grid does not match the vector field".into(),
            ));
        }

        for (dst, &src) in self.work.as_mut_slice().iter_mut().zip(v.x.as_slice()) {
            *dst = Complex64::new(src, 0.0);
        }
        self.backend.forward_fft_2d(&mut self.work);

        for (dst, &src) in self.vort_hat.as_mut_slice().iter_mut().zip(v.y.as_slice()) {
            *dst = Complex64::new(src, 0.0);
        }
        self.backend.forward_fft_2d(&mut self.vort_hat);

        let nx = self.grid.nx;
        let vx_hat = self.work.as_slice();
        for (idx, value) in self.vort_hat.as_mut_slice().iter_mut().enumerate() {
            let kx = self.kx[idx % nx];
            let ky = self.ky[idx / nx];
            *value = Complex64::new(0.0, 1.0) * (kx * *value - ky * vx_hat[idx]);
        }
        Ok(())
    }

    /// Gamma at every grid point for the given materialised kernel.
    pub fn circulation(
        &mut self,
        kernel_hat: &Field2D,
        out: &mut RealField2D,
    ) -> Result<(), CoreError> {
        if kernel_hat.grid() != self.grid || out.grid() != self.grid {
            return Err(CoreError::DimensionMismatch(
                "circulation buffers do not match the convolution plan".into(),
            ));
        }
        for ((dst, &src), &g) in self
            .work
            .as_mut_slice()
            .iter_mut()
            .zip(self.vort_hat.as_slice())
            .zip(kernel_hat.as_slice())
        {
            *dst = src * g;
        }
        self.backend.inverse_fft_2d(&mut self.work);
        for (dst, &src) in out.as_mut_slice().iter_mut().zip(self.work.as_slice()) {
            *dst = src.re;
        }
        Ok(())
    }

    /// Loop-averaged coarse-graining of a scalar already in spectral
    /// space: inverse transform of scalar_hat * g_hat / area. Used to
    /// condition circulation histograms on locally averaged dissipation.
    pub fn coarse_grain(
        &mut self,
        scalar_hat: &B::Buffer,
        kernel_hat: &Field2D,
        area: f64,
        out: &mut RealField2D,
    ) -> Result<(), CoreError> {
        if scalar_hat.grid() != self.grid || kernel_hat.grid() != self.grid
            || out.grid() != self.grid
        {
            return Err(CoreError::DimensionMismatch(
                "coarse-grain buffers do not match the convolution plan".into(),
            ));
        }
        if area == 0.0 {
            return Err(CoreError::NumericDomain(
                "coarse-graining over a zero-area loop".into(),
            ));
        }
        let inv_area = 1.0 / area;
        for ((dst, &src), &g) in self
            .work
            .as_mut_slice()
            .iter_mut()
            .zip(scalar_hat.as_slice())
            .zip(kernel_hat.as_slice())
        {
            *dst = src * (g * inv_area);
        }
        self.backend.inverse_fft_2d(&mut self.work);
        for (dst, &src) in out.as_mut_slice().iter_mut().zip(self.work.as_slice()) {
            *dst = src.re;
        }
        Ok(())
    }
}
