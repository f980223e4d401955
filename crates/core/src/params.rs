//! Physical parameters of the Gross-Pitaevskii domain.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const SQRT_2: f64 = std::f64::consts::SQRT_2;

/// Immutable description of the simulation domain: per-axis resolution and
/// physical extent, plus the two GP scalars (sound speed `c` and healing
/// length `xi`). All boundaries are periodic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpParams {
    /// Per-axis grid resolution N. Two or three axes; every entry even.
    pub resolution: Vec<usize>,
    /// Per-axis physical length L, same arity as `resolution`.
    pub box_size: Vec<f64>,
    /// Sound speed.
    pub c: f64,
    /// Healing length.
    pub xi: f64,
}

impl GpParams {
    pub fn new(
        resolution: Vec<usize>,
        box_size: Vec<f64>,
        c: f64,
        xi: f64,
    ) -> Result<Self, CoreError> {
        let params = Self {
            resolution,
            box_size,
            c,
            xi,
        };
        params.validate()?;
        Ok(params)
    }

    /// Shape checks shared with deserialised instances.
    pub fn validate(&self) -> Result<(), CoreError> {
        let dim = self.resolution.len();
        if !(2..=3).contains(&dim) {
            return Err(CoreError::InvalidShape(format!(
                "domain must have 2 or 3 axes, got {dim}"
            )));
        }
        if self.box_size.len() != dim {
            return Err(CoreError::DimensionMismatch(format!(
                "resolution has {dim} axes but box_size has {}",
                self.box_size.len()
            )));
        }
        for (axis, &n) in self.resolution.iter().enumerate() {
            if n == 0 || n % 2 != 0 {
                return Err(CoreError::InvalidShape(format!(
                    "axis {axis} resolution {n} must be even and non-zero"
                )));
            }
        }
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.resolution.len()
    }

    /// Grid step L_i / N_i along one axis.
    pub fn step(&self, axis: usize) -> f64 {
        self.box_size[axis] / self.resolution[axis] as f64
    }

    /// Total number of grid points.
    pub fn points(&self) -> usize {
        self.resolution.iter().product()
    }

    /// Quantum of circulation, kappa = 2 pi xi c sqrt(2).
    pub fn kappa(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.xi * self.c * SQRT_2
    }

    /// Prefactor of the momentum density, alpha = c xi sqrt(2). Chosen so
    /// that the circulation of p around a unit-charge vortex on |psi| = 1
    /// equals kappa.
    pub fn momentum_prefactor(&self) -> f64 {
        self.c * self.xi * SQRT_2
    }
}
