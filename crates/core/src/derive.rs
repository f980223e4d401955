//! Physical fields derived from the complex wave function.

use num_complex::Complex64;

use crate::backend::{FftAxis, SpectralBackend, SpectralBuffer};
use crate::error::CoreError;
use crate::field::{Field2D, RealField2D, VectorField2D};
use crate::grid::Grid2D;
use crate::params::GpParams;
use crate::wavenumbers::wavenumbers;

/// rho = |psi|^2, elementwise.
pub fn density(psi: &Field2D, rho: &mut RealField2D) -> Result<(), CoreError> {
    if psi.grid() != rho.grid() {
        return Err(CoreError::DimensionMismatch(
            "density output grid does not match psi".into(),
        ));
    }
    for (dst, src) in rho.as_mut_slice().iter_mut().zip(psi.as_slice()) {
        *dst = src.norm_sqr();
    }
    Ok(())
}

/// Spectral differentiation workspace for the momentum derivation.
///
/// The per-axis FFT plans live in the backend's planner cache and are
/// reused across slices; the complex scratch buffer is owned here and
/// reused per call.
pub struct MomentumWorkspace<B: SpectralBackend> {
    backend: B,
    grid: Grid2D,
    kx: Vec<f64>,
    ky: Vec<f64>,
    buf: B::Buffer,
    alpha: f64,
}

impl<B: SpectralBackend> MomentumWorkspace<B> {
    pub fn new(backend: B, grid: Grid2D, params: &GpParams) -> Self {
        let kx = wavenumbers(grid.nx, grid.lx);
        let ky = wavenumbers(grid.ny, grid.ly);
        let buf = backend.alloc_field(grid);
        let alpha = params.momentum_prefactor();
        Self {
            backend,
            grid,
            kx,
            ky,
            buf,
            alpha,
        }
    }

    pub fn grid(&self) -> Grid2D {
        self.grid
    }

    /// p_n = alpha * Im(conj(psi) * d psi / d x_n), one axis at a time
    /// through the shared FFT plans.
    pub fn momentum(&mut self, psi: &Field2D, out: &mut VectorField2D) -> Result<(), CoreError> {
        if psi.grid() != self.grid || out.grid() != self.grid {
            return Err(CoreError::DimensionMismatch(
                "momentum buffers do not match the workspace grid".into(),
            ));
        }
        self.derivative_component(psi, FftAxis::X)?;
        self.project(psi, &mut out.x);
        self.derivative_component(psi, FftAxis::Y)?;
        self.project(psi, &mut out.y);
        Ok(())
    }

    /// Leaves d psi / d x_axis in `self.buf`.
    fn derivative_component(&mut self, psi: &Field2D, axis: FftAxis) -> Result<(), CoreError> {
        self.buf.as_mut_slice().copy_from_slice(psi.as_slice());
        self.backend.forward_fft_axis(&mut self.buf, axis);

        let nx = self.grid.nx;
        let data = self.buf.as_mut_slice();
        match axis {
            FftAxis::X => {
                for row in data.chunks_mut(nx) {
                    for (value, &k) in row.iter_mut().zip(&self.kx) {
                        *value *= Complex64::new(0.0, k);
                    }
                }
            }
            FftAxis::Y => {
                for (iy, row) in data.chunks_mut(nx).enumerate() {
                    let factor = Complex64::new(0.0, self.ky[iy]);
                    for value in row.iter_mut() {
                        *value *= factor;
                    }
                }
            }
        }

        self.backend.inverse_fft_axis(&mut self.buf, axis);
        Ok(())
    }

    fn project(&self, psi: &Field2D, out: &mut RealField2D) {
        let alpha = self.alpha;
        for ((dst, &p), &d) in out
            .as_mut_slice()
            .iter_mut()
            .zip(psi.as_slice())
            .zip(self.buf.as_slice())
        {
            *dst = alpha * (p.conj() * d).im;
        }
    }
}

/// v_n = p_n / (rho + epsilon). With epsilon = 0 a zero-density cell is a
/// hard error rather than a NaN source.
pub fn velocity(
    p: &VectorField2D,
    rho: &RealField2D,
    epsilon: f64,
    out: &mut VectorField2D,
) -> Result<(), CoreError> {
    check_vector_grids(p, rho, out)?;
    let n = rho.len();
    for idx in 0..n {
        let denom = rho.as_slice()[idx] + epsilon;
        if denom == 0.0 {
            return Err(CoreError::NumericDomain(
                "zero density cell with epsilon = 0 in velocity".into(),
            ));
        }
        out.x.as_mut_slice()[idx] = p.x.as_slice()[idx] / denom;
        out.y.as_mut_slice()[idx] = p.y.as_slice()[idx] / denom;
    }
    Ok(())
}

/// v_n = p_n / sqrt(rho), with a single reciprocal square root per cell.
pub fn regularised_velocity(
    p: &VectorField2D,
    rho: &RealField2D,
    out: &mut VectorField2D,
) -> Result<(), CoreError> {
    check_vector_grids(p, rho, out)?;
    let n = rho.len();
    for idx in 0..n {
        let inv_sqrt = 1.0 / rho.as_slice()[idx].sqrt();
        out.x.as_mut_slice()[idx] = p.x.as_slice()[idx] * inv_sqrt;
        out.y.as_mut_slice()[idx] = p.y.as_slice()[idx] * inv_sqrt;
    }
    Ok(())
}

fn check_vector_grids(
    p: &VectorField2D,
    rho: &RealField2D,
    out: &VectorField2D,
) -> Result<(), CoreError> {
    if p.grid() != rho.grid() || out.grid() != rho.grid() {
        return Err(CoreError::DimensionMismatch(
            "velocity buffers do not share one grid".into(),
        ));
    }
    Ok(())
}
