//! CPU spectral backend built on rustfft.
//!
//! Plans are created once per transform length through a shared planner
//! cache and are read-only afterwards, so a cloned backend may be carried
//! into worker threads while every caller owns its buffers. With the
//! `parallel` feature the row passes of the 2D transforms can run on a
//! rayon pool once the grid is large enough to amortise the fan-out.

use std::sync::Arc;

use circ2d_core::backend::{FftAxis, SpectralBackend};
use circ2d_core::field::Field2D;
use circ2d_core::grid::Grid2D;
use num_complex::Complex64;
use parking_lot::Mutex;
use rustfft::{Fft, FftPlanner};

#[cfg(feature = "parallel")]
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};

#[cfg(feature = "parallel")]
const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

#[derive(Clone)]
pub struct CpuBackend {
    #[cfg(feature = "parallel")]
    parallel_fft: bool,
    #[cfg(feature = "parallel")]
    parallel_min_points: usize,
    #[cfg(feature = "parallel")]
    parallel_pool: Option<Arc<ThreadPool>>,
    plan_cache: Arc<Mutex<FftPlanner<f64>>>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "parallel")]
            parallel_fft: false,
            #[cfg(feature = "parallel")]
            parallel_min_points: DEFAULT_PARALLEL_THRESHOLD,
            #[cfg(feature = "parallel")]
            parallel_pool: None,
            plan_cache: Arc::new(Mutex::new(FftPlanner::new())),
        }
    }

    #[cfg(feature = "parallel")]
    pub fn new_parallel() -> Self {
        Self::new()
            .with_parallel_fft(true)
            .with_parallel_threads(num_cpus::get())
            .with_parallel_threshold(DEFAULT_PARALLEL_THRESHOLD)
    }

    #[cfg(feature = "parallel")]
    pub fn with_parallel_fft(mut self, enabled: bool) -> Self {
        self.parallel_fft = enabled;
        self
    }

    #[cfg(feature = "parallel")]
    pub fn with_parallel_threshold(mut self, min_points: usize) -> Self {
        self.parallel_min_points = min_points.max(1);
        self
    }

    #[cfg(feature = "parallel")]
    pub fn with_parallel_threads(mut self, threads: usize) -> Self {
        if threads == 0 {
            self.parallel_pool = None;
            return self;
        }
        self.parallel_pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .ok()
            .map(Arc::new);
        self
    }

    fn plan(&self, n: usize, direction: FftDirection) -> Arc<dyn Fft<f64>> {
        let mut planner = self.plan_cache.lock();
        match direction {
            FftDirection::Forward => planner.plan_fft_forward(n),
            FftDirection::Inverse => planner.plan_fft_inverse(n),
        }
    }

    fn fft_2d(&self, buffer: &mut Field2D, direction: FftDirection) {
        let grid = buffer.grid();
        let nx = grid.nx;
        let ny = grid.ny;
        assert!(nx > 0 && ny > 0, "grid must be non-zero length");

        let row_fft = self.plan(nx, direction);
        let col_fft = self.plan(ny, direction);
        let data = buffer.as_mut_slice();

        #[cfg(feature = "parallel")]
        let use_parallel = self.parallel_fft && grid.len() >= self.parallel_min_points;
        #[cfg(not(feature = "parallel"))]
        let use_parallel = false;

        if use_parallel {
            #[cfg(feature = "parallel")]
            self.install(|| {
                let buf: &mut [Complex64] = &mut *data;
                process_rows_parallel(buf, nx, row_fft.clone());
                let mut transposed = vec![Complex64::default(); buf.len()];
                transpose_into(buf, &mut transposed, nx, ny);
                process_rows_parallel(&mut transposed, ny, col_fft.clone());
                transpose_into(&transposed, buf, ny, nx);
            });
        } else {
            process_rows_serial(data, nx, &row_fft);
            process_columns_serial(data, nx, ny, &col_fft);
        }

        if matches!(direction, FftDirection::Inverse) {
            let scale = 1.0 / (nx * ny) as f64;
            for value in data.iter_mut() {
                *value *= scale;
            }
        }
    }

    fn fft_axis(&self, buffer: &mut Field2D, axis: FftAxis, direction: FftDirection) {
        let grid = buffer.grid();
        let nx = grid.nx;
        let ny = grid.ny;
        assert!(nx > 0 && ny > 0, "grid must be non-zero length");

        let data = buffer.as_mut_slice();
        let n = match axis {
            FftAxis::X => {
                let fft = self.plan(nx, direction);
                process_rows_serial(data, nx, &fft);
                nx
            }
            FftAxis::Y => {
                let fft = self.plan(ny, direction);
                process_columns_serial(data, nx, ny, &fft);
                ny
            }
        };

        if matches!(direction, FftDirection::Inverse) {
            let scale = 1.0 / n as f64;
            for value in data.iter_mut() {
                *value *= scale;
            }
        }
    }

    #[cfg(feature = "parallel")]
    fn install(&self, job: impl FnOnce() + Send) {
        if let Some(pool) = self.parallel_pool.as_deref() {
            pool.install(job);
        } else {
            job();
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
enum FftDirection {
    Forward,
    Inverse,
}

fn process_rows_serial(data: &mut [Complex64], nx: usize, fft: &Arc<dyn Fft<f64>>) {
    for row in data.chunks_mut(nx) {
        fft.process(row);
    }
}

/// Column transforms through a per-column transpose buffer; the FFT
/// manages its own internal scratch.
fn process_columns_serial(data: &mut [Complex64], nx: usize, ny: usize, fft: &Arc<dyn Fft<f64>>) {
    let mut column = vec![Complex64::default(); ny];
    for ix in 0..nx {
        for iy in 0..ny {
            column[iy] = data[iy * nx + ix];
        }
        fft.process(&mut column);
        for iy in 0..ny {
            data[iy * nx + ix] = column[iy];
        }
    }
}

#[cfg(feature = "parallel")]
fn process_rows_parallel(data: &mut [Complex64], nx: usize, fft: Arc<dyn Fft<f64>>) {
    data.par_chunks_mut(nx).for_each(|row| {
        fft.process(row);
    });
}

#[cfg(feature = "parallel")]
fn transpose_into(src: &[Complex64], dst: &mut [Complex64], nx: usize, ny: usize) {
    assert_eq!(src.len(), dst.len());
    for iy in 0..ny {
        for ix in 0..nx {
            dst[ix * ny + iy] = src[iy * nx + ix];
        }
    }
}

impl SpectralBackend for CpuBackend {
    type Buffer = Field2D;

    fn alloc_field(&self, grid: Grid2D) -> Self::Buffer {
        Field2D::zeros(grid)
    }

    fn forward_fft_2d(&self, buffer: &mut Self::Buffer) {
        self.fft_2d(buffer, FftDirection::Forward);
    }

    fn inverse_fft_2d(&self, buffer: &mut Self::Buffer) {
        self.fft_2d(buffer, FftDirection::Inverse);
    }

    fn forward_fft_axis(&self, buffer: &mut Self::Buffer, axis: FftAxis) {
        self.fft_axis(buffer, axis, FftDirection::Forward);
    }

    fn inverse_fft_axis(&self, buffer: &mut Self::Buffer, axis: FftAxis) {
        self.fft_axis(buffer, axis, FftDirection::Inverse);
    }
}

#[cfg(test)]
mod _tests_lib;
