//! Hierarchical JSON result container.
//!
//! The layout mirrors the groups of the production containers: a
//! `SimParams` group with the domain description, and one analysis group
//! holding a child group per quantity with `Moments`, `Histogram` and
//! `Histogram2D` blocks as enabled.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use circ2d_core::params::GpParams;
use circ2d_core::stats::{Histogram1D, Histogram2D, Moments, StatsAccumulator};

use crate::driver::QuantityStats;
use crate::error::PipelineError;

#[derive(Serialize)]
struct SimParamsOut<'a> {
    #[serde(rename = "D")]
    dim: usize,
    #[serde(rename = "N")]
    resolution: &'a [usize],
    #[serde(rename = "L")]
    box_size: &'a [f64],
    c: f64,
    xi: f64,
    kappa: f64,
}

#[derive(Serialize)]
struct MomentsOut {
    orders: Vec<usize>,
    /// ⟨Gamma^p⟩ indexed [order][loop size].
    mean: Vec<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    abs_mean: Option<Vec<Vec<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fractional_orders: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fractional_mean: Option<Vec<Vec<f64>>>,
    #[serde(rename = "Nsamples")]
    nsamples: Vec<u64>,
}

#[derive(Serialize)]
struct HistogramOut {
    bin_edges: Vec<f64>,
    /// Counts indexed [loop size][bin].
    counts: Vec<Vec<u64>>,
    vmin: Vec<f64>,
    vmax: Vec<f64>,
    #[serde(rename = "Nsamples")]
    nsamples: Vec<u64>,
    total: u64,
}

#[derive(Serialize)]
struct Histogram2DOut {
    bin_edges_gamma: Vec<f64>,
    bin_edges_cond: Vec<f64>,
    /// Counts indexed [loop size][gamma bin][cond bin].
    counts: Vec<Vec<Vec<u64>>>,
    vmin_gamma: Vec<f64>,
    vmax_gamma: Vec<f64>,
    vmin_cond: Vec<f64>,
    vmax_cond: Vec<f64>,
    #[serde(rename = "Nsamples")]
    nsamples: Vec<u64>,
    total: u64,
}

#[derive(Serialize)]
struct QuantityGroup {
    loop_sizes: Vec<usize>,
    #[serde(rename = "Moments", skip_serializing_if = "Option::is_none")]
    moments: Option<MomentsOut>,
    #[serde(rename = "Histogram", skip_serializing_if = "Option::is_none")]
    histogram: Option<HistogramOut>,
    #[serde(rename = "Histogram2D", skip_serializing_if = "Option::is_none")]
    histogram2d: Option<Histogram2DOut>,
}

pub(crate) fn write_results(
    path: &Path,
    params: &GpParams,
    group_name: &str,
    stats: &[QuantityStats],
) -> Result<(), PipelineError> {
    let mut analysis = Map::new();
    for quantity_stats in stats {
        let group = quantity_group(&quantity_stats.master)?;
        analysis.insert(
            quantity_stats.quantity.to_string(),
            serde_json::to_value(group).map_err(|err| PipelineError::Output(err.to_string()))?,
        );
    }

    let sim_params = SimParamsOut {
        dim: params.dim(),
        resolution: &params.resolution,
        box_size: &params.box_size,
        c: params.c,
        xi: params.xi,
        kappa: params.kappa(),
    };

    let mut root = Map::new();
    root.insert(
        "SimParams".into(),
        serde_json::to_value(&sim_params).map_err(|err| PipelineError::Output(err.to_string()))?,
    );
    root.insert(group_name.into(), Value::Object(analysis));

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &Value::Object(root))
        .map_err(|err| PipelineError::Output(err.to_string()))?;
    Ok(())
}

fn quantity_group(acc: &StatsAccumulator) -> Result<QuantityGroup, PipelineError> {
    if !acc.is_finalised() {
        return Err(PipelineError::Output(
            "statistics must be finalised before serialisation".into(),
        ));
    }
    Ok(QuantityGroup {
        loop_sizes: acc.loop_sizes().to_vec(),
        moments: acc.moments().map(|m| moments_out(m, acc.n_loops())),
        histogram: acc.histogram().map(|h| histogram_out(h, acc.n_loops())),
        histogram2d: acc.histogram2d().map(|h| histogram2d_out(h, acc.n_loops())),
    })
}

fn moments_out(moments: &Moments, n_loops: usize) -> MomentsOut {
    let spec = moments.spec();
    let orders: Vec<usize> = (1..=spec.p_max).collect();
    let collect = |get: &dyn Fn(usize, usize) -> f64| -> Vec<Vec<f64>> {
        orders
            .iter()
            .map(|&p| (0..n_loops).map(|r| get(p, r)).collect())
            .collect()
    };
    let mean = collect(&|p, r| moments.mean(p, r).unwrap_or(f64::NAN));
    let abs_mean = spec
        .absolute
        .then(|| collect(&|p, r| moments.mean_abs(p, r).unwrap_or(f64::NAN)));
    let fractional = (!spec.fractional.is_empty()).then(|| {
        (0..spec.fractional.len())
            .map(|k| {
                (0..n_loops)
                    .map(|r| moments.mean_fractional(k, r).unwrap_or(f64::NAN))
                    .collect()
            })
            .collect::<Vec<Vec<f64>>>()
    });
    MomentsOut {
        nsamples: (0..n_loops).map(|r| moments.nsamples(r)).collect(),
        fractional_orders: (!spec.fractional.is_empty()).then(|| spec.fractional.clone()),
        fractional_mean: fractional,
        orders,
        mean,
        abs_mean,
    }
}

fn histogram_out(histogram: &Histogram1D, n_loops: usize) -> HistogramOut {
    let nsamples: Vec<u64> = (0..n_loops).map(|r| histogram.nsamples(r)).collect();
    HistogramOut {
        bin_edges: histogram.edges().to_vec(),
        counts: (0..n_loops).map(|r| histogram.counts_for(r).to_vec()).collect(),
        vmin: (0..n_loops).map(|r| histogram.vmin(r)).collect(),
        vmax: (0..n_loops).map(|r| histogram.vmax(r)).collect(),
        total: nsamples.iter().sum(),
        nsamples,
    }
}

fn histogram2d_out(histogram: &Histogram2D, n_loops: usize) -> Histogram2DOut {
    let (na, nb) = histogram.n_bins();
    let nsamples: Vec<u64> = (0..n_loops).map(|r| histogram.nsamples(r)).collect();
    Histogram2DOut {
        bin_edges_gamma: histogram.edges_a().to_vec(),
        bin_edges_cond: histogram.edges_b().to_vec(),
        counts: (0..n_loops)
            .map(|r| {
                let flat = histogram.counts_for(r);
                (0..na).map(|a| flat[a * nb..(a + 1) * nb].to_vec()).collect()
            })
            .collect(),
        vmin_gamma: (0..n_loops).map(|r| histogram.vmin_a(r)).collect(),
        vmax_gamma: (0..n_loops).map(|r| histogram.vmax_a(r)).collect(),
        vmin_cond: (0..n_loops).map(|r| histogram.vmin_b(r)).collect(),
        vmax_cond: (0..n_loops).map(|r| histogram.vmax_b(r)).collect(),
        total: nsamples.iter().sum(),
        nsamples,
    }
}
