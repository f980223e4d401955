//! Backend traits for spectral operations.

use num_complex::Complex64;

use crate::{field::Field2D, grid::Grid2D};

/// Axis selector for the per-axis 1D transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftAxis {
    X,
    Y,
}

pub trait SpectralBuffer {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn grid(&self) -> Grid2D;
    fn as_slice(&self) -> &[Complex64];
    fn as_mut_slice(&mut self) -> &mut [Complex64];
}

impl SpectralBuffer for Field2D {
    fn len(&self) -> usize {
        self.len()
    }

    fn grid(&self) -> Grid2D {
        self.grid()
    }

    fn as_slice(&self) -> &[Complex64] {
        self.as_slice()
    }

    fn as_mut_slice(&mut self) -> &mut [Complex64] {
        self.as_mut_slice()
    }
}

/// A provider of in-place complex FFTs over `Field2D`-shaped buffers.
///
/// Forward transforms are unnormalised; inverse transforms divide by the
/// number of transformed samples (the full grid for the 2D transforms, the
/// axis length for the per-axis ones). Implementations cache their plans
/// internally; plans are read-shared across threads while every caller
/// owns its buffers.
pub trait SpectralBackend: Clone + Send + Sync {
    type Buffer: SpectralBuffer + Clone + Send;

    fn alloc_field(&self, grid: Grid2D) -> Self::Buffer;
    fn forward_fft_2d(&self, buffer: &mut Self::Buffer);
    fn inverse_fft_2d(&self, buffer: &mut Self::Buffer);

    /// 1D transform along a single axis, applied to every line of the grid.
    fn forward_fft_axis(&self, buffer: &mut Self::Buffer, axis: FftAxis);
    fn inverse_fft_axis(&self, buffer: &mut Self::Buffer, axis: FftAxis);
}
