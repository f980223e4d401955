//! Configuration file parsing and validation.
//!
//! Analyses are described by TOML files with a `[fields]` section naming
//! the input dumps and the domain, one analysis section (`[circulation]`
//! or `[increments]`), and optional `[pipeline]` / `[output]` sections.
//!
//! # File Format
//!
//! ```toml
//! [fields]
//! directory = "$GP_DATA/tangle1024"
//! resolution = [256, 256, 256]
//! c = 1.0
//! xi = 0.05
//! timesteps = [100]
//!
//! [circulation]
//! loop_sizes = [1, 2, 4, 8, 16]
//! quantities = ["velocity", "reg_velocity"]
//!
//! [circulation.moments]
//! p_max = 8
//! absolute = true
//!
//! [circulation.histogram]
//! bins = 200
//! max = 40.0
//!
//! [output]
//! path = "circulation.json"
//! ```
//!
//! `$VAR` substrings in path values are substituted from the environment
//! at load time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use circ2d_core::params::GpParams;
use circ2d_core::stats::{MomentsSpec, Quantity};

use crate::error::PipelineError;

/// Environment variable consulted for the worker-thread count when the
/// `[pipeline]` section does not set one.
pub const THREADS_ENV_VAR: &str = "CIRC2D_NTHREADS";

// ============================================================================
// Field input
// ============================================================================

/// Scalar width of the stored binary dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    F32,
    F64,
}

impl Precision {
    pub fn bytes(self) -> usize {
        match self {
            Precision::F32 => 4,
            Precision::F64 => 8,
        }
    }
}

/// What the input dumps contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldInput {
    /// Complex wave function as `ReaPsi` / `ImaPsi` pairs.
    Psi,
    /// Precomputed incompressible velocity (`VIx_d`, ...).
    VelocityInc,
    /// Precomputed compressible velocity (`VCx_d`, ...).
    VelocityComp,
}

impl FieldInput {
    pub fn is_velocity(self) -> bool {
        !matches!(self, FieldInput::Psi)
    }
}

/// Slice orientation on a 3D domain (the fixed axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    X,
    Y,
    Z,
}

impl Orientation {
    pub fn axis(self) -> usize {
        match self {
            Orientation::X => 0,
            Orientation::Y => 1,
            Orientation::Z => 2,
        }
    }
}

/// The `[fields]` section: where the dumps live and what domain they hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsConfig {
    /// Directory holding the binary dumps.
    pub directory: PathBuf,

    /// Per-axis grid resolution (2 or 3 axes, all even).
    pub resolution: Vec<usize>,

    /// Per-axis physical box size; defaults to 2 pi on every axis.
    #[serde(default)]
    pub box_size: Option<Vec<f64>>,

    /// Sound speed.
    #[serde(default = "default_sound_speed")]
    pub c: f64,

    /// Healing length.
    pub xi: f64,

    #[serde(default = "default_precision")]
    pub precision: Precision,

    #[serde(default = "default_input")]
    pub input: FieldInput,

    /// Field timestep indices; filenames carry them as three zero-padded
    /// decimals.
    pub timesteps: Vec<usize>,

    /// Load `Diss` dumps and condition 2D histograms on the
    /// loop-averaged dissipation.
    #[serde(default)]
    pub dissipation: bool,
}

fn default_sound_speed() -> f64 {
    1.0
}

fn default_precision() -> Precision {
    Precision::F64
}

fn default_input() -> FieldInput {
    FieldInput::Psi
}

// ============================================================================
// Pipeline section
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Worker threads; 0 means all available cores. Falls back to the
    /// `CIRC2D_NTHREADS` environment variable, then to 1.
    #[serde(default)]
    pub threads: Option<usize>,

    /// Upper bound on slices per orientation; 0 means all.
    #[serde(default)]
    pub max_slices: usize,

    /// Integer spectral upscaling factor applied to each psi slice.
    #[serde(default = "default_resampling_factor")]
    pub resampling_factor: usize,

    /// Velocity regularisation: v = p / (rho + epsilon).
    #[serde(default)]
    pub epsilon: f64,

    /// Slice orientations to analyse on 3D domains.
    #[serde(default = "default_orientations")]
    pub orientations: Vec<Orientation>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            threads: None,
            max_slices: 0,
            resampling_factor: default_resampling_factor(),
            epsilon: 0.0,
            orientations: default_orientations(),
        }
    }
}

fn default_resampling_factor() -> usize {
    1
}

fn default_orientations() -> Vec<Orientation> {
    vec![Orientation::X, Orientation::Y, Orientation::Z]
}

// ============================================================================
// Histogram specifications
// ============================================================================

/// Bin-edge specification: either explicit `edges`, or a linear grid of
/// `bins` cells from `min` (default `-max`) to `max`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramSpec {
    #[serde(default)]
    pub edges: Vec<f64>,

    #[serde(default = "default_bins")]
    pub bins: usize,

    #[serde(default = "default_hist_max")]
    pub max: f64,

    #[serde(default)]
    pub min: Option<f64>,
}

fn default_bins() -> usize {
    100
}

fn default_hist_max() -> f64 {
    20.0
}

impl HistogramSpec {
    pub fn build_edges(&self) -> Result<Vec<f64>, PipelineError> {
        if !self.edges.is_empty() {
            if self.edges.len() < 2 || self.edges.windows(2).any(|w| w[0] >= w[1]) {
                return Err(PipelineError::InvalidConfig(
                    "histogram edges must be strictly increasing with at least two entries".into(),
                ));
            }
            return Ok(self.edges.clone());
        }
        if self.bins == 0 {
            return Err(PipelineError::InvalidConfig(
                "histogram bins must be positive".into(),
            ));
        }
        let min = self.min.unwrap_or(-self.max);
        if min >= self.max {
            return Err(PipelineError::InvalidConfig(format!(
                "histogram range [{min}, {}] is empty",
                self.max
            )));
        }
        let step = (self.max - min) / self.bins as f64;
        Ok((0..=self.bins).map(|i| min + i as f64 * step).collect())
    }
}

/// Joint histogram over (circulation, conditioning value).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram2DSpec {
    pub gamma: HistogramSpec,
    pub cond: HistogramSpec,
}

// ============================================================================
// Analysis sections
// ============================================================================

/// How the circulation matrix is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CirculationMethod {
    /// O(1) rectangle loops over precomputed cumulative line integrals.
    #[default]
    Integral,
    /// Spectral convolution of the vorticity with a loop kernel.
    Convolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KernelShape {
    #[default]
    Rectangle,
    Ellipse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CirculationConfig {
    /// Loop sizes in grid steps (side length, or diameter for ellipses).
    pub loop_sizes: Vec<usize>,

    #[serde(default)]
    pub kernel: KernelShape,

    #[serde(default)]
    pub method: CirculationMethod,

    #[serde(default = "default_quantities")]
    pub quantities: Vec<Quantity>,

    #[serde(default)]
    pub moments: Option<MomentsSpec>,

    #[serde(default)]
    pub histogram: Option<HistogramSpec>,

    #[serde(default)]
    pub histogram2d: Option<Histogram2DSpec>,
}

/// Longitudinal velocity increments over the same stats machinery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementsConfig {
    /// Increment separations in grid steps.
    pub increments: Vec<usize>,

    #[serde(default = "default_quantities")]
    pub quantities: Vec<Quantity>,

    #[serde(default)]
    pub moments: Option<MomentsSpec>,

    #[serde(default)]
    pub histogram: Option<HistogramSpec>,
}

fn default_quantities() -> Vec<Quantity> {
    vec![Quantity::Velocity]
}

// ============================================================================
// Output section
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Name of the analysis group in the container; defaults to
    /// `Circulation` or `Increments` by analysis kind.
    #[serde(default)]
    pub group: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            group: None,
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("circulation.json")
}

// ============================================================================
// Complete configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub fields: FieldsConfig,

    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub circulation: Option<CirculationConfig>,

    #[serde(default)]
    pub increments: Option<IncrementsConfig>,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a configuration from a TOML string, expanding `$VAR`
    /// references in path values and validating the result.
    pub fn from_str(content: &str) -> Result<Self, PipelineError> {
        let mut config: PipelineConfig = toml::from_str(content)?;
        config.fields.directory = expand_env_path(&config.fields.directory);
        config.output.path = expand_env_path(&config.output.path);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        self.params()?;

        match (&self.circulation, &self.increments) {
            (Some(_), Some(_)) => {
                return Err(PipelineError::InvalidConfig(
                    "circulation and increment analyses cannot both be enabled".into(),
                ));
            }
            (None, None) => {
                return Err(PipelineError::InvalidConfig(
                    "one of [circulation] or [increments] must be present".into(),
                ));
            }
            _ => {}
        }

        if self.fields.timesteps.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "fields.timesteps must not be empty".into(),
            ));
        }
        if self.pipeline.epsilon < 0.0 {
            return Err(PipelineError::InvalidConfig(
                "pipeline.epsilon must be non-negative".into(),
            ));
        }
        if self.pipeline.resampling_factor == 0 {
            return Err(PipelineError::InvalidConfig(
                "pipeline.resampling_factor must be at least 1".into(),
            ));
        }
        if self.fields.input.is_velocity() {
            if self.pipeline.resampling_factor != 1 {
                return Err(PipelineError::InvalidConfig(
                    "precomputed velocity input cannot be resampled".into(),
                ));
            }
            let quantities = self.quantities();
            if quantities.iter().any(|q| *q != Quantity::Velocity) {
                return Err(PipelineError::InvalidConfig(
                    "precomputed velocity input only supports the velocity quantity".into(),
                ));
            }
        }
        if self.fields.dim() == 3 && self.pipeline.orientations.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "pipeline.orientations must not be empty on 3D domains".into(),
            ));
        }

        if let Some(circ) = &self.circulation {
            if circ.loop_sizes.is_empty() {
                return Err(PipelineError::InvalidConfig(
                    "circulation.loop_sizes must not be empty".into(),
                ));
            }
            if circ.quantities.is_empty() {
                return Err(PipelineError::InvalidConfig(
                    "circulation.quantities must not be empty".into(),
                ));
            }
            if circ.kernel == KernelShape::Ellipse && circ.method == CirculationMethod::Integral {
                return Err(PipelineError::InvalidConfig(
                    "ellipse kernels require method = \"convolution\"".into(),
                ));
            }
            if circ.moments.is_none() && circ.histogram.is_none() && circ.histogram2d.is_none() {
                return Err(PipelineError::InvalidConfig(
                    "circulation analysis enables no statistics blocks".into(),
                ));
            }
            if let Some(spec) = &circ.histogram {
                spec.build_edges()?;
            }
            if let Some(spec) = &circ.histogram2d {
                spec.gamma.build_edges()?;
                spec.cond.build_edges()?;
                if !self.fields.dissipation {
                    return Err(PipelineError::InvalidConfig(
                        "histogram2d conditioning requires fields.dissipation = true".into(),
                    ));
                }
            }
            if let Some(moments) = &circ.moments {
                validate_moments(moments)?;
            }
        }

        if let Some(inc) = &self.increments {
            if inc.increments.is_empty() {
                return Err(PipelineError::InvalidConfig(
                    "increments.increments must not be empty".into(),
                ));
            }
            if inc.quantities.is_empty() {
                return Err(PipelineError::InvalidConfig(
                    "increments.quantities must not be empty".into(),
                ));
            }
            if inc.moments.is_none() && inc.histogram.is_none() {
                return Err(PipelineError::InvalidConfig(
                    "increment analysis enables no statistics blocks".into(),
                ));
            }
            if let Some(spec) = &inc.histogram {
                spec.build_edges()?;
            }
            if let Some(moments) = &inc.moments {
                validate_moments(moments)?;
            }
        }

        Ok(())
    }

    /// Domain parameters, including the defaulted box size.
    pub fn params(&self) -> Result<GpParams, PipelineError> {
        let box_size = match &self.fields.box_size {
            Some(sizes) => sizes.clone(),
            None => vec![std::f64::consts::TAU; self.fields.resolution.len()],
        };
        GpParams::new(
            self.fields.resolution.clone(),
            box_size,
            self.fields.c,
            self.fields.xi,
        )
        .map_err(PipelineError::from)
    }

    /// The quantities of whichever analysis is enabled.
    pub fn quantities(&self) -> Vec<Quantity> {
        if let Some(circ) = &self.circulation {
            circ.quantities.clone()
        } else if let Some(inc) = &self.increments {
            inc.quantities.clone()
        } else {
            Vec::new()
        }
    }

    /// Worker-thread count: config, then environment, then 1. Zero means
    /// every available core.
    pub fn effective_threads(&self) -> usize {
        let configured = self.pipeline.threads.or_else(|| {
            std::env::var(THREADS_ENV_VAR)
                .ok()
                .and_then(|raw| raw.parse().ok())
        });
        match configured {
            Some(0) => num_cpus::get(),
            Some(threads) => threads,
            None => 1,
        }
    }

    /// Group name used in the output container.
    pub fn group_name(&self) -> String {
        if let Some(name) = &self.output.group {
            return name.clone();
        }
        if self.circulation.is_some() {
            "Circulation".into()
        } else {
            "Increments".into()
        }
    }
}

impl FieldsConfig {
    pub fn dim(&self) -> usize {
        self.resolution.len()
    }
}

fn validate_moments(spec: &MomentsSpec) -> Result<(), PipelineError> {
    if spec.p_max == 0 {
        return Err(PipelineError::InvalidConfig(
            "moments.p_max must be at least 1".into(),
        ));
    }
    if spec.fractional.iter().any(|&p| p <= 0.0 || p >= 1.0) {
        return Err(PipelineError::InvalidConfig(
            "fractional moment orders must lie in (0, 1)".into(),
        ));
    }
    Ok(())
}

// ============================================================================
// Environment expansion
// ============================================================================

/// Substitute `$VAR` and `${VAR}` from the environment; unset variables
/// expand to the empty string.
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    while let Some((_, ch)) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        let braced = matches!(chars.peek(), Some((_, '{')));
        if braced {
            chars.next();
        }
        let mut name = String::new();
        while let Some(&(_, c)) = chars.peek() {
            let part_of_name = if braced {
                c != '}'
            } else {
                c.is_ascii_alphanumeric() || c == '_'
            };
            if !part_of_name {
                break;
            }
            name.push(c);
            chars.next();
        }
        if braced {
            chars.next(); // closing brace
        }
        if name.is_empty() {
            out.push('$');
            continue;
        }
        if let Ok(value) = std::env::var(&name) {
            out.push_str(&value);
        }
    }
    out
}

fn expand_env_path(path: &Path) -> PathBuf {
    PathBuf::from(expand_env(&path.to_string_lossy()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
[fields]
directory = "/data/fields"
resolution = [16, 16]
xi = 0.05
timesteps = [0]

[circulation]
loop_sizes = [2, 4]

[circulation.moments]
p_max = 4
"#;

    #[test]
    fn minimal_circulation_config_parses() {
        let config = PipelineConfig::from_str(BASE).expect("should parse");
        let circ = config.circulation.as_ref().unwrap();
        assert_eq!(circ.loop_sizes, vec![2, 4]);
        assert_eq!(circ.quantities, vec![Quantity::Velocity]);
        assert_eq!(circ.method, CirculationMethod::Integral);
        assert_eq!(config.fields.precision, Precision::F64);
        assert_eq!(config.group_name(), "Circulation");
        let params = config.params().unwrap();
        assert!((params.box_size[0] - std::f64::consts::TAU).abs() < 1e-15);
    }

    #[test]
    fn both_analyses_conflict() {
        let content = format!(
            "{BASE}\n[increments]\nincrements = [1]\n[increments.moments]\np_max = 2\n"
        );
        let result = PipelineConfig::from_str(&content);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn missing_analysis_is_rejected() {
        let content = r#"
[fields]
directory = "/data"
resolution = [16, 16]
xi = 0.05
timesteps = [0]
"#;
        assert!(matches!(
            PipelineConfig::from_str(content),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_quantity_tag_fails_at_parse() {
        let content = BASE.replace(
            "loop_sizes = [2, 4]",
            "loop_sizes = [2, 4]\nquantities = [\"vorticity\"]",
        );
        assert!(matches!(
            PipelineConfig::from_str(&content),
            Err(PipelineError::Toml(_))
        ));
    }

    #[test]
    fn velocity_input_rejects_resampling() {
        let content = BASE.replace(
            "timesteps = [0]",
            "timesteps = [0]\ninput = \"velocity_inc\"\n[pipeline]\nresampling_factor = 2\n",
        );
        assert!(matches!(
            PipelineConfig::from_str(&content),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn ellipse_kernel_requires_convolution() {
        let content = BASE.replace(
            "loop_sizes = [2, 4]",
            "loop_sizes = [2, 4]\nkernel = \"ellipse\"",
        );
        assert!(matches!(
            PipelineConfig::from_str(&content),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn histogram2d_requires_dissipation() {
        let content = format!(
            "{BASE}\n[circulation.histogram2d.gamma]\nbins = 10\n[circulation.histogram2d.cond]\nbins = 10\n"
        );
        assert!(matches!(
            PipelineConfig::from_str(&content),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn odd_resolution_is_rejected() {
        let content = BASE.replace("[16, 16]", "[15, 16]");
        let result = PipelineConfig::from_str(&content);
        assert!(result.is_err());
    }

    #[test]
    fn histogram_edges_build_linear_grids() {
        let spec = HistogramSpec {
            edges: Vec::new(),
            bins: 4,
            max: 2.0,
            min: None,
        };
        let edges = spec.build_edges().unwrap();
        assert_eq!(edges.len(), 5);
        assert!((edges[0] + 2.0).abs() < 1e-12);
        assert!((edges[4] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn env_variables_expand_in_paths() {
        std::env::set_var("CIRC2D_TEST_ROOT", "/scratch/gp");
        assert_eq!(expand_env("$CIRC2D_TEST_ROOT/fields"), "/scratch/gp/fields");
        assert_eq!(expand_env("${CIRC2D_TEST_ROOT}/x"), "/scratch/gp/x");
        assert_eq!(expand_env("no variables"), "no variables");
        assert_eq!(expand_env("$CIRC2D_UNSET_VAR/x"), "/x");
    }

    #[test]
    fn threads_default_to_one_without_overrides() {
        let config = PipelineConfig::from_str(BASE).unwrap();
        std::env::remove_var(THREADS_ENV_VAR);
        assert_eq!(config.effective_threads(), 1);
    }
}
