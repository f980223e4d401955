//! Slice-by-slice orchestration of the analysis.
//!
//! For every configured timestep and slice orientation the driver loads
//! one 2D cut, derives the requested physical fields, evaluates the
//! circulation matrix per loop size (or the longitudinal increments), and
//! dispatches sharded statistics updates onto a fixed rayon pool. Shards
//! are reduced and finalised once after the last slice, then the result
//! container is written.

use std::path::PathBuf;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use rayon::prelude::*;
use rayon::ThreadPool;

use circ2d_backend_cpu::CpuBackend;
use circ2d_core::backend::SpectralBackend;
use circ2d_core::circulation::ConvolutionPlan;
use circ2d_core::derive::{density, regularised_velocity, velocity, MomentumWorkspace};
use circ2d_core::error::CoreError;
use circ2d_core::field::{Field2D, RealField2D, VectorField2D};
use circ2d_core::grid::Grid2D;
use circ2d_core::integral::IntegralField;
use circ2d_core::kernels::{corner_offset, LoopKernel};
use circ2d_core::params::GpParams;
use circ2d_core::resample::resample_spectrum;
use circ2d_core::stats::{chunk_len, Quantity, StatsAccumulator};

use crate::config::{
    CirculationConfig, CirculationMethod, IncrementsConfig, KernelShape, PipelineConfig,
};
use crate::error::PipelineError;
use crate::loader::{FieldLoader, SlicePlane, DISSIPATION_STEM};
use crate::output;

pub struct AnalysisReport {
    pub slices: usize,
    pub output_path: PathBuf,
}

/// Master accumulator plus its per-thread shards for one quantity.
pub(crate) struct QuantityStats {
    pub(crate) quantity: Quantity,
    pub(crate) master: StatsAccumulator,
    shards: Vec<StatsAccumulator>,
}

impl QuantityStats {
    fn reduce_and_finalise(&mut self) -> Result<(), CoreError> {
        for shard in &self.shards {
            self.master.reduce(shard);
        }
        self.master.finalise()
    }
}

// ============================================================================
// Entry point
// ============================================================================

pub fn run(config: &PipelineConfig) -> Result<AnalysisReport, PipelineError> {
    config.validate()?;
    let params = config.params()?;
    let threads = config.effective_threads();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|err| PipelineError::ThreadPool(err.to_string()))?;

    let loader = FieldLoader::new(
        config.fields.directory.clone(),
        params.resolution.clone(),
        params.box_size.clone(),
        config.fields.precision,
    );

    let orientations: Vec<Option<usize>> = if params.dim() == 2 {
        vec![None]
    } else {
        config
            .pipeline
            .orientations
            .iter()
            .map(|o| Some(o.axis()))
            .collect()
    };

    let slices_for = |axis: Option<usize>| {
        let available = loader.slices_along(axis);
        if config.pipeline.max_slices > 0 {
            available.min(config.pipeline.max_slices)
        } else {
            available
        }
    };
    let total: usize = orientations
        .iter()
        .map(|&axis| slices_for(axis))
        .sum::<usize>()
        * config.fields.timesteps.len();

    info!(
        "analysing {} slices across {} timesteps with {} worker threads",
        total,
        config.fields.timesteps.len(),
        threads
    );

    let mut stats = build_stats(config, threads)?;
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} slices")
            .map_err(|err| PipelineError::Output(err.to_string()))?,
    );

    let start = Instant::now();
    let mut processed = 0usize;
    for &axis in &orientations {
        let plane0 = SlicePlane {
            fixed_axis: axis,
            index: 0,
        };
        let n_loops = match (&config.circulation, &config.increments) {
            (Some(circ), _) => circ.loop_sizes.len(),
            (_, Some(inc)) => inc.increments.len(),
            _ => 0,
        };
        let mut workspace = SliceWorkspace::new(
            CpuBackend::new(),
            loader.slice_grid(plane0),
            config.pipeline.resampling_factor,
            &params,
            n_loops,
        );
        debug!(
            "orientation {:?}: slice grid {}x{}",
            axis,
            workspace.grid.nx,
            workspace.grid.ny
        );

        for &timestep in &config.fields.timesteps {
            for index in 0..slices_for(axis) {
                let plane = SlicePlane {
                    fixed_axis: axis,
                    index,
                };
                if let Some(circ) = &config.circulation {
                    process_circulation_slice(
                        circ,
                        config,
                        &loader,
                        timestep,
                        plane,
                        &mut workspace,
                        &mut stats,
                        &pool,
                    )?;
                } else if let Some(inc) = &config.increments {
                    process_increments_slice(
                        inc,
                        config,
                        &loader,
                        timestep,
                        plane,
                        &mut workspace,
                        &mut stats,
                        &pool,
                    )?;
                }
                processed += 1;
                bar.inc(1);
            }
        }
    }
    bar.finish_and_clear();

    for quantity_stats in &mut stats {
        quantity_stats.reduce_and_finalise()?;
    }

    output::write_results(&config.output.path, &params, &config.group_name(), &stats)?;
    info!(
        "wrote {} after {:.1} s",
        config.output.path.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(AnalysisReport {
        slices: processed,
        output_path: config.output.path.clone(),
    })
}

// ============================================================================
// Stats construction
// ============================================================================

fn build_stats(config: &PipelineConfig, threads: usize) -> Result<Vec<QuantityStats>, PipelineError> {
    let (loop_sizes, quantities, moments, histogram, histogram2d) =
        match (&config.circulation, &config.increments) {
            (Some(circ), _) => (
                circ.loop_sizes.clone(),
                circ.quantities.clone(),
                circ.moments.clone(),
                circ.histogram.clone(),
                circ.histogram2d.clone(),
            ),
            (_, Some(inc)) => (
                inc.increments.clone(),
                inc.quantities.clone(),
                inc.moments.clone(),
                inc.histogram.clone(),
                None,
            ),
            _ => {
                return Err(PipelineError::InvalidConfig(
                    "no analysis section present".into(),
                ));
            }
        };

    let histogram_edges = histogram.map(|spec| spec.build_edges()).transpose()?;
    let histogram2d_edges = histogram2d
        .map(|spec| {
            Ok::<_, PipelineError>((spec.gamma.build_edges()?, spec.cond.build_edges()?))
        })
        .transpose()?;

    let mut stats = Vec::new();
    for quantity in quantities {
        if stats.iter().any(|qs: &QuantityStats| qs.quantity == quantity) {
            continue;
        }
        let template = StatsAccumulator::new(
            loop_sizes.clone(),
            moments.clone(),
            histogram_edges.clone(),
            histogram2d_edges.clone(),
        );
        stats.push(QuantityStats {
            quantity,
            shards: vec![template.clone(); threads],
            master: template,
        });
    }
    Ok(stats)
}

// ============================================================================
// Per-slice processing
// ============================================================================

/// Preallocated buffers for one slice shape; reused across all slices of
/// an orientation.
struct SliceWorkspace {
    backend: CpuBackend,
    grid: Grid2D,
    factor: usize,
    psi_raw: Field2D,
    psi: Field2D,
    rho: RealField2D,
    momentum: VectorField2D,
    vfield: VectorField2D,
    gamma: RealField2D,
    cond: RealField2D,
    diss: RealField2D,
    diss_hat_raw: Field2D,
    diss_hat: Field2D,
    momentum_ws: MomentumWorkspace<CpuBackend>,
    integral: IntegralField,
    conv: ConvolutionPlan<CpuBackend>,
    kernels: KernelCache,
}

impl SliceWorkspace {
    fn new(
        backend: CpuBackend,
        src_grid: Grid2D,
        factor: usize,
        params: &GpParams,
        n_loops: usize,
    ) -> Self {
        let grid = Grid2D::new(
            src_grid.nx * factor,
            src_grid.ny * factor,
            src_grid.lx,
            src_grid.ly,
        );
        Self {
            psi_raw: Field2D::zeros(src_grid),
            psi: Field2D::zeros(grid),
            rho: RealField2D::zeros(grid),
            momentum: VectorField2D::zeros(grid),
            vfield: VectorField2D::zeros(grid),
            gamma: RealField2D::zeros(grid),
            cond: RealField2D::zeros(grid),
            diss: RealField2D::zeros(src_grid),
            diss_hat_raw: Field2D::zeros(src_grid),
            diss_hat: Field2D::zeros(grid),
            momentum_ws: MomentumWorkspace::new(backend.clone(), grid, params),
            integral: IntegralField::new(grid),
            conv: ConvolutionPlan::new(backend.clone(), grid),
            kernels: KernelCache::new(grid, n_loops),
            backend,
            grid,
            factor,
        }
    }

    fn load_psi(
        &mut self,
        loader: &FieldLoader,
        timestep: usize,
        plane: SlicePlane,
    ) -> Result<(), PipelineError> {
        if self.factor == 1 {
            loader.psi_slice(timestep, plane, &mut self.psi)
        } else {
            loader.psi_slice(timestep, plane, &mut self.psi_raw)?;
            self.backend.forward_fft_2d(&mut self.psi_raw);
            resample_spectrum(&self.psi_raw, &mut self.psi)?;
            self.backend.inverse_fft_2d(&mut self.psi);
            Ok(())
        }
    }

    /// Load the dissipation slice and leave its (possibly resampled)
    /// spectrum in `diss_hat`.
    fn load_dissipation_spectrum(
        &mut self,
        loader: &FieldLoader,
        timestep: usize,
        plane: SlicePlane,
    ) -> Result<(), PipelineError> {
        loader.scalar_slice(DISSIPATION_STEM, timestep, plane, &mut self.diss)?;
        for (dst, &src) in self
            .diss_hat_raw
            .as_mut_slice()
            .iter_mut()
            .zip(self.diss.as_slice())
        {
            *dst = num_complex::Complex64::new(src, 0.0);
        }
        self.backend.forward_fft_2d(&mut self.diss_hat_raw);
        if self.factor == 1 {
            self.diss_hat.copy_from(&self.diss_hat_raw);
        } else {
            resample_spectrum(&self.diss_hat_raw, &mut self.diss_hat)?;
        }
        Ok(())
    }
}

/// Lazily materialised Fourier kernel matrices, one per loop size.
struct KernelCache {
    grid: Grid2D,
    entries: Vec<Option<Field2D>>,
}

impl KernelCache {
    fn new(grid: Grid2D, n_loops: usize) -> Self {
        Self {
            grid,
            entries: vec![None; n_loops],
        }
    }

    fn get(&mut self, idx: usize, kernel: LoopKernel, offset: (f64, f64)) -> &Field2D {
        let grid = self.grid;
        self.entries[idx].get_or_insert_with(|| {
            debug!("materialising {kernel:?}");
            kernel.materialise(grid, offset)
        })
    }
}

fn loop_kernel(shape: KernelShape, r: usize, grid: Grid2D) -> LoopKernel {
    let rx = r as f64 * grid.dx();
    let ry = r as f64 * grid.dy();
    match shape {
        KernelShape::Rectangle => LoopKernel::Rectangle { rx, ry },
        KernelShape::Ellipse => LoopKernel::Ellipse { dx: rx, dy: ry },
    }
}

/// Rectangle kernels are phase-shifted onto the integral path's
/// integer-corner rectangles; ellipses stay truly centred.
fn kernel_offset(shape: KernelShape, r: usize, grid: Grid2D) -> (f64, f64) {
    match shape {
        KernelShape::Rectangle => corner_offset((r, r), grid),
        KernelShape::Ellipse => (0.0, 0.0),
    }
}

/// Build the analysed vector field for one quantity from rho and p.
fn derive_quantity(
    workspace: &mut SliceWorkspace,
    quantity: Quantity,
    epsilon: f64,
) -> Result<(), CoreError> {
    match quantity {
        Quantity::Momentum => {
            workspace
                .vfield
                .x
                .as_mut_slice()
                .copy_from_slice(workspace.momentum.x.as_slice());
            workspace
                .vfield
                .y
                .as_mut_slice()
                .copy_from_slice(workspace.momentum.y.as_slice());
            Ok(())
        }
        Quantity::Velocity => velocity(
            &workspace.momentum,
            &workspace.rho,
            epsilon,
            &mut workspace.vfield,
        ),
        Quantity::RegVelocity => {
            regularised_velocity(&workspace.momentum, &workspace.rho, &mut workspace.vfield)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn process_circulation_slice(
    circ: &CirculationConfig,
    config: &PipelineConfig,
    loader: &FieldLoader,
    timestep: usize,
    plane: SlicePlane,
    workspace: &mut SliceWorkspace,
    stats: &mut [QuantityStats],
    pool: &ThreadPool,
) -> Result<(), PipelineError> {
    let input = config.fields.input;
    if input.is_velocity() {
        loader.velocity_slice(input, timestep, plane, &mut workspace.vfield)?;
    } else {
        workspace.load_psi(loader, timestep, plane)?;
        density(&workspace.psi, &mut workspace.rho)?;
        workspace
            .momentum_ws
            .momentum(&workspace.psi, &mut workspace.momentum)?;
    }

    let conditioned = config.fields.dissipation && circ.histogram2d.is_some();
    if conditioned {
        workspace.load_dissipation_spectrum(loader, timestep, plane)?;
    }

    for quantity_stats in stats.iter_mut() {
        if !input.is_velocity() {
            derive_quantity(workspace, quantity_stats.quantity, config.pipeline.epsilon)?;
        }

        match circ.method {
            CirculationMethod::Integral => workspace.integral.assemble(&workspace.vfield)?,
            CirculationMethod::Convolution => workspace.conv.load_velocity(&workspace.vfield)?,
        }

        for (r_idx, &r) in circ.loop_sizes.iter().enumerate() {
            match circ.method {
                CirculationMethod::Integral => {
                    let integral = &workspace.integral;
                    let nx = workspace.grid.nx;
                    let gamma = &mut workspace.gamma;
                    pool.install(|| {
                        gamma
                            .as_mut_slice()
                            .par_chunks_mut(nx)
                            .enumerate()
                            .for_each(|(iy, row)| integral.circulation_row(iy, (r, r), row));
                    });
                }
                CirculationMethod::Convolution => {
                    let kernel = loop_kernel(circ.kernel, r, workspace.grid);
                    let offset = kernel_offset(circ.kernel, r, workspace.grid);
                    let kernel_hat = workspace.kernels.get(r_idx, kernel, offset);
                    workspace.conv.circulation(kernel_hat, &mut workspace.gamma)?;
                }
            }

            update_sharded(
                pool,
                &mut quantity_stats.shards,
                workspace.gamma.as_slice(),
                r_idx,
            )?;

            if conditioned {
                let kernel = loop_kernel(circ.kernel, r, workspace.grid);
                let offset = kernel_offset(circ.kernel, r, workspace.grid);
                let kernel_hat = workspace.kernels.get(r_idx, kernel, offset);
                workspace.conv.coarse_grain(
                    &workspace.diss_hat,
                    kernel_hat,
                    kernel.area(),
                    &mut workspace.cond,
                )?;
                update_joint_sharded(
                    pool,
                    &mut quantity_stats.shards,
                    workspace.gamma.as_slice(),
                    workspace.cond.as_slice(),
                    r_idx,
                )?;
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn process_increments_slice(
    inc: &IncrementsConfig,
    config: &PipelineConfig,
    loader: &FieldLoader,
    timestep: usize,
    plane: SlicePlane,
    workspace: &mut SliceWorkspace,
    stats: &mut [QuantityStats],
    pool: &ThreadPool,
) -> Result<(), PipelineError> {
    let input = config.fields.input;
    if input.is_velocity() {
        loader.velocity_slice(input, timestep, plane, &mut workspace.vfield)?;
    } else {
        workspace.load_psi(loader, timestep, plane)?;
        density(&workspace.psi, &mut workspace.rho)?;
        workspace
            .momentum_ws
            .momentum(&workspace.psi, &mut workspace.momentum)?;
    }

    for quantity_stats in stats.iter_mut() {
        if !input.is_velocity() {
            derive_quantity(workspace, quantity_stats.quantity, config.pipeline.epsilon)?;
        }

        for (r_idx, &r) in inc.increments.iter().enumerate() {
            longitudinal_increment_x(&workspace.vfield.x, r, &mut workspace.gamma);
            update_sharded(
                pool,
                &mut quantity_stats.shards,
                workspace.gamma.as_slice(),
                r_idx,
            )?;

            longitudinal_increment_y(&workspace.vfield.y, r, &mut workspace.gamma);
            update_sharded(
                pool,
                &mut quantity_stats.shards,
                workspace.gamma.as_slice(),
                r_idx,
            )?;
        }
    }
    Ok(())
}

/// delta v_x(r) = v_x(x + r e_x) - v_x(x), periodic in x.
fn longitudinal_increment_x(v: &RealField2D, r: usize, out: &mut RealField2D) {
    let grid = v.grid();
    for iy in 0..grid.ny {
        for ix in 0..grid.nx {
            let shifted = v.get((ix + r) % grid.nx, iy);
            out.set(ix, iy, shifted - v.get(ix, iy));
        }
    }
}

fn longitudinal_increment_y(v: &RealField2D, r: usize, out: &mut RealField2D) {
    let grid = v.grid();
    for iy in 0..grid.ny {
        let shifted_row = (iy + r) % grid.ny;
        for ix in 0..grid.nx {
            out.set(ix, iy, v.get(ix, shifted_row) - v.get(ix, iy));
        }
    }
}

// ============================================================================
// Sharded statistics updates
// ============================================================================

/// Partition the flattened samples into contiguous near-equal ranges and
/// update one shard per range; shards own disjoint samples so no locking
/// is involved.
fn update_sharded(
    pool: &ThreadPool,
    shards: &mut [StatsAccumulator],
    samples: &[f64],
    r_idx: usize,
) -> Result<(), CoreError> {
    let chunk = chunk_len(samples.len(), shards.len());
    pool.install(|| {
        shards
            .par_iter_mut()
            .zip(samples.par_chunks(chunk))
            .try_for_each(|(shard, part)| shard.update(part, r_idx))
    })
}

fn update_joint_sharded(
    pool: &ThreadPool,
    shards: &mut [StatsAccumulator],
    samples: &[f64],
    cond: &[f64],
    r_idx: usize,
) -> Result<(), CoreError> {
    debug_assert_eq!(samples.len(), cond.len());
    let chunk = chunk_len(samples.len(), shards.len());
    pool.install(|| {
        shards
            .par_iter_mut()
            .zip(samples.par_chunks(chunk).zip(cond.par_chunks(chunk)))
            .try_for_each(|(shard, (part, cond_part))| shard.update_joint(part, cond_part, r_idx))
    })
}
