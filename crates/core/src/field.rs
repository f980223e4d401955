//! Contiguous field storage on a uniform 2D grid.
//!
//! Complex fields hold the wave function and spectral work buffers; real
//! fields hold densities, velocity components and circulation matrices.
//! All storage is row-major with x fastest, matching `Grid2D::idx`.

use num_complex::Complex64;

use crate::grid::Grid2D;

#[derive(Debug, Clone)]
pub struct Field2D {
    grid: Grid2D,
    data: Vec<Complex64>,
}

impl Field2D {
    pub fn zeros(grid: Grid2D) -> Self {
        Self {
            data: vec![Complex64::default(); grid.len()],
            grid,
        }
    }

    pub fn from_vec(grid: Grid2D, data: Vec<Complex64>) -> Self {
        assert_eq!(data.len(), grid.len(), "data length must match grid size");
        Self { grid, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn grid(&self) -> Grid2D {
        self.grid
    }

    pub fn idx(&self, ix: usize, iy: usize) -> usize {
        self.grid.idx(ix, iy)
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex64] {
        &mut self.data
    }

    pub fn get(&self, ix: usize, iy: usize) -> Complex64 {
        self.data[self.grid.idx(ix, iy)]
    }

    pub fn set(&mut self, ix: usize, iy: usize, value: Complex64) {
        let idx = self.grid.idx(ix, iy);
        self.data[idx] = value;
    }

    pub fn fill(&mut self, value: Complex64) {
        self.data.fill(value);
    }

    pub fn copy_from(&mut self, other: &Field2D) {
        assert_eq!(self.grid, other.grid, "grids must match");
        self.data.copy_from_slice(&other.data);
    }
}

impl From<Field2D> for Vec<Complex64> {
    fn from(field: Field2D) -> Self {
        field.data
    }
}

#[derive(Debug, Clone)]
pub struct RealField2D {
    grid: Grid2D,
    data: Vec<f64>,
}

impl RealField2D {
    pub fn zeros(grid: Grid2D) -> Self {
        Self {
            data: vec![0.0; grid.len()],
            grid,
        }
    }

    pub fn from_vec(grid: Grid2D, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), grid.len(), "data length must match grid size");
        Self { grid, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn grid(&self) -> Grid2D {
        self.grid
    }

    pub fn idx(&self, ix: usize, iy: usize) -> usize {
        self.grid.idx(ix, iy)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn get(&self, ix: usize, iy: usize) -> f64 {
        self.data[self.grid.idx(ix, iy)]
    }

    pub fn set(&mut self, ix: usize, iy: usize, value: f64) {
        let idx = self.grid.idx(ix, iy);
        self.data[idx] = value;
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }
}

/// The two in-plane components of a vector field on a common grid.
#[derive(Debug, Clone)]
pub struct VectorField2D {
    pub x: RealField2D,
    pub y: RealField2D,
}

impl VectorField2D {
    pub fn zeros(grid: Grid2D) -> Self {
        Self {
            x: RealField2D::zeros(grid),
            y: RealField2D::zeros(grid),
        }
    }

    pub fn grid(&self) -> Grid2D {
        self.x.grid()
    }
}
