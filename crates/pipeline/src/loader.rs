//! Raw binary field input: byte sources, slice selection and assembly.
//!
//! Dumps are flat arrays of IEEE-754 scalars in native byte order, stored
//! column-major over (N1, N2[, N3]). Slices fix one axis of a 3D domain
//! (or take the single 2D plane) and are assembled cell by cell into the
//! row-major working layout.

use std::fs;
use std::path::{Path, PathBuf};

use num_complex::Complex64;

use circ2d_core::error::CoreError;
use circ2d_core::field::{Field2D, RealField2D, VectorField2D};
use circ2d_core::grid::Grid2D;

use crate::config::{FieldInput, Precision};
use crate::error::PipelineError;

const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];

/// File stem of the optional dissipation dumps.
pub const DISSIPATION_STEM: &str = "Diss";

/// In-memory byte source decoding one native-endian scalar per call.
/// Stands in for the read-only memory mapping of the production runs.
pub struct RawScalarFile {
    bytes: Vec<u8>,
    precision: Precision,
}

impl RawScalarFile {
    /// Read a dump and check its byte length against the expected element
    /// count; a short or oversized file is a hard error.
    pub fn open(path: &Path, precision: Precision, expected: usize) -> Result<Self, PipelineError> {
        let bytes = fs::read(path)
            .map_err(|err| PipelineError::FieldFile(format!("{}: {err}", path.display())))?;
        let want = expected * precision.bytes();
        if bytes.len() != want {
            return Err(PipelineError::FieldFile(format!(
                "{}: {} bytes on disk, expected {want}",
                path.display(),
                bytes.len()
            )));
        }
        Ok(Self { bytes, precision })
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / self.precision.bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> f64 {
        match self.precision {
            Precision::F64 => {
                let start = idx * 8;
                let raw: [u8; 8] = self.bytes[start..start + 8]
                    .try_into()
                    .expect("scalar width");
                f64::from_ne_bytes(raw)
            }
            Precision::F32 => {
                let start = idx * 4;
                let raw: [u8; 4] = self.bytes[start..start + 4]
                    .try_into()
                    .expect("scalar width");
                f32::from_ne_bytes(raw) as f64
            }
        }
    }
}

/// One 2D cut through the stored array: the fixed axis and its index.
/// `fixed_axis` is None on 2D domains, which have a single plane.
#[derive(Debug, Clone, Copy)]
pub struct SlicePlane {
    pub fixed_axis: Option<usize>,
    pub index: usize,
}

impl SlicePlane {
    pub fn whole_2d() -> Self {
        Self {
            fixed_axis: None,
            index: 0,
        }
    }
}

/// The two kept axes of a slice, in increasing order.
fn kept_axes(dim: usize, fixed_axis: Option<usize>) -> (usize, usize) {
    match fixed_axis {
        None => (0, 1),
        Some(axis) => {
            debug_assert!(dim == 3 && axis < 3);
            match axis {
                0 => (1, 2),
                1 => (0, 2),
                _ => (0, 1),
            }
        }
    }
}

pub struct FieldLoader {
    directory: PathBuf,
    resolution: Vec<usize>,
    box_size: Vec<f64>,
    precision: Precision,
    strides: Vec<usize>,
    points: usize,
}

impl FieldLoader {
    pub fn new(
        directory: PathBuf,
        resolution: Vec<usize>,
        box_size: Vec<f64>,
        precision: Precision,
    ) -> Self {
        let mut strides = Vec::with_capacity(resolution.len());
        let mut stride = 1;
        for &n in &resolution {
            strides.push(stride);
            stride *= n;
        }
        Self {
            directory,
            points: resolution.iter().product(),
            resolution,
            box_size,
            precision,
            strides,
        }
    }

    pub fn dim(&self) -> usize {
        self.resolution.len()
    }

    /// Number of slices available along a fixed axis.
    pub fn slices_along(&self, fixed_axis: Option<usize>) -> usize {
        match fixed_axis {
            None => 1,
            Some(axis) => self.resolution[axis],
        }
    }

    /// Working grid of one slice plane.
    pub fn slice_grid(&self, plane: SlicePlane) -> Grid2D {
        let (a0, a1) = kept_axes(self.dim(), plane.fixed_axis);
        Grid2D::new(
            self.resolution[a0],
            self.resolution[a1],
            self.box_size[a0],
            self.box_size[a1],
        )
    }

    fn path(&self, stem: &str, timestep: usize) -> PathBuf {
        self.directory.join(format!("{stem}.{timestep:03}.dat"))
    }

    /// Base offset and kept-axis strides of the column-major layout.
    fn plane_strides(&self, plane: SlicePlane) -> (usize, usize, usize) {
        let (a0, a1) = kept_axes(self.dim(), plane.fixed_axis);
        let base = plane
            .fixed_axis
            .map(|axis| plane.index * self.strides[axis])
            .unwrap_or(0);
        (base, self.strides[a0], self.strides[a1])
    }

    fn check_grid(&self, plane: SlicePlane, grid: Grid2D) -> Result<(), PipelineError> {
        let expected = self.slice_grid(plane);
        if grid.nx != expected.nx || grid.ny != expected.ny {
            return Err(PipelineError::Core(CoreError::DimensionMismatch(format!(
                "slice buffer is {}x{}, plane is {}x{}",
                grid.nx, grid.ny, expected.nx, expected.ny
            ))));
        }
        Ok(())
    }

    /// Assemble the complex wave function for one slice from the
    /// `ReaPsi` / `ImaPsi` pair, one cell at a time.
    pub fn psi_slice(
        &self,
        timestep: usize,
        plane: SlicePlane,
        out: &mut Field2D,
    ) -> Result<(), PipelineError> {
        self.check_grid(plane, out.grid())?;
        let rea = RawScalarFile::open(&self.path("ReaPsi", timestep), self.precision, self.points)?;
        let ima = RawScalarFile::open(&self.path("ImaPsi", timestep), self.precision, self.points)?;

        let (base, s0, s1) = self.plane_strides(plane);
        let grid = out.grid();
        for v in 0..grid.ny {
            for u in 0..grid.nx {
                let idx = base + u * s0 + v * s1;
                out.set(u, v, Complex64::new(rea.get(idx), ima.get(idx)));
            }
        }
        Ok(())
    }

    /// Load the two in-plane components of a precomputed velocity field.
    pub fn velocity_slice(
        &self,
        input: FieldInput,
        timestep: usize,
        plane: SlicePlane,
        out: &mut VectorField2D,
    ) -> Result<(), PipelineError> {
        let prefix = match input {
            FieldInput::VelocityInc => "VI",
            FieldInput::VelocityComp => "VC",
            FieldInput::Psi => {
                return Err(PipelineError::InvalidConfig(
                    "psi input has no velocity component files".into(),
                ));
            }
        };
        self.check_grid(plane, out.grid())?;
        let (a0, a1) = kept_axes(self.dim(), plane.fixed_axis);
        let stem_x = format!("{prefix}{}_d", AXIS_NAMES[a0]);
        let stem_y = format!("{prefix}{}_d", AXIS_NAMES[a1]);
        self.scalar_slice_with_stem(&stem_x, timestep, plane, &mut out.x)?;
        self.scalar_slice_with_stem(&stem_y, timestep, plane, &mut out.y)
    }

    /// Load one scalar dump (e.g. dissipation) for a slice.
    pub fn scalar_slice(
        &self,
        stem: &str,
        timestep: usize,
        plane: SlicePlane,
        out: &mut RealField2D,
    ) -> Result<(), PipelineError> {
        self.check_grid(plane, out.grid())?;
        self.scalar_slice_with_stem(stem, timestep, plane, out)
    }

    fn scalar_slice_with_stem(
        &self,
        stem: &str,
        timestep: usize,
        plane: SlicePlane,
        out: &mut RealField2D,
    ) -> Result<(), PipelineError> {
        let file = RawScalarFile::open(&self.path(stem, timestep), self.precision, self.points)?;
        let (base, s0, s1) = self.plane_strides(plane);
        let grid = out.grid();
        for v in 0..grid.ny {
            for u in 0..grid.nx {
                out.set(u, v, file.get(base + u * s0 + v * s1));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("circ2d-loader-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_f64_file(path: &Path, values: &[f64]) {
        let mut file = fs::File::create(path).unwrap();
        for v in values {
            file.write_all(&v.to_ne_bytes()).unwrap();
        }
    }

    #[test]
    fn psi_slices_follow_the_column_major_layout() {
        let dir = scratch_dir("psi");
        // 2x2x2 domain, element (i, j, k) stored at i + 2j + 4k
        let rea: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let ima: Vec<f64> = (0..8).map(|i| 10.0 + i as f64).collect();
        write_f64_file(&dir.join("ReaPsi.007.dat"), &rea);
        write_f64_file(&dir.join("ImaPsi.007.dat"), &ima);

        let loader = FieldLoader::new(
            dir.clone(),
            vec![2, 2, 2],
            vec![1.0, 1.0, 1.0],
            Precision::F64,
        );

        // fix z = 1: element (i, j) at i + 2j + 4
        let plane = SlicePlane {
            fixed_axis: Some(2),
            index: 1,
        };
        let mut out = Field2D::zeros(loader.slice_grid(plane));
        loader.psi_slice(7, plane, &mut out).unwrap();
        assert_eq!(out.get(0, 0), Complex64::new(4.0, 14.0));
        assert_eq!(out.get(1, 0), Complex64::new(5.0, 15.0));
        assert_eq!(out.get(0, 1), Complex64::new(6.0, 16.0));

        // fix x = 1: kept axes (y, z), element (j, k) at 1 + 2j + 4k
        let plane = SlicePlane {
            fixed_axis: Some(0),
            index: 1,
        };
        let mut out = Field2D::zeros(loader.slice_grid(plane));
        loader.psi_slice(7, plane, &mut out).unwrap();
        assert_eq!(out.get(0, 0), Complex64::new(1.0, 11.0));
        assert_eq!(out.get(1, 0), Complex64::new(3.0, 13.0));
        assert_eq!(out.get(1, 1), Complex64::new(7.0, 17.0));

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn byte_size_mismatch_is_an_error() {
        let dir = scratch_dir("short");
        write_f64_file(&dir.join("ReaPsi.000.dat"), &[1.0, 2.0, 3.0]);
        let result = RawScalarFile::open(&dir.join("ReaPsi.000.dat"), Precision::F64, 4);
        assert!(matches!(result, Err(PipelineError::FieldFile(_))));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        let loader = FieldLoader::new(
            PathBuf::from("/nonexistent-circ2d"),
            vec![4, 4],
            vec![1.0, 1.0],
            Precision::F64,
        );
        let mut out = Field2D::zeros(loader.slice_grid(SlicePlane::whole_2d()));
        let result = loader.psi_slice(0, SlicePlane::whole_2d(), &mut out);
        assert!(matches!(result, Err(PipelineError::FieldFile(_))));
    }

    #[test]
    fn f32_dumps_widen_to_f64() {
        let dir = scratch_dir("f32");
        let path = dir.join("Diss.001.dat");
        let mut file = fs::File::create(&path).unwrap();
        for v in [1.5f32, -2.25, 0.0, 3.0] {
            file.write_all(&v.to_ne_bytes()).unwrap();
        }
        drop(file);

        let loader =
            FieldLoader::new(dir.clone(), vec![2, 2], vec![1.0, 1.0], Precision::F32);
        let mut out = RealField2D::zeros(loader.slice_grid(SlicePlane::whole_2d()));
        loader
            .scalar_slice(DISSIPATION_STEM, 1, SlicePlane::whole_2d(), &mut out)
            .unwrap();
        assert_eq!(out.get(0, 0), 1.5);
        assert_eq!(out.get(1, 0), -2.25);
        assert_eq!(out.get(1, 1), 3.0);

        fs::remove_dir_all(dir).ok();
    }
}
