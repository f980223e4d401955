//! Spectral zero-pad resampling between even-sized Fourier grids.

use num_complex::Complex64;

use crate::error::CoreError;
use crate::field::Field2D;
use crate::wavenumbers::ensure_even;

/// Copy `src` (a Fourier-space field) into the larger Fourier grid of
/// `dst`, preserving the negative-frequency layout and scaling by
/// |dst|/|src| so a normalised inverse transform keeps amplitudes.
///
/// Every destination axis must be an exact integer multiple of the source
/// axis (factor 1 degenerates to a scaled copy); downscaling and odd axis
/// lengths are rejected with `InvalidShape`.
pub fn resample_spectrum(src: &Field2D, dst: &mut Field2D) -> Result<(), CoreError> {
    let sg = src.grid();
    let dg = dst.grid();
    for &n in &[sg.nx, sg.ny, dg.nx, dg.ny] {
        ensure_even(n)?;
    }
    let map_x = axis_map(sg.nx, dg.nx)?;
    let map_y = axis_map(sg.ny, dg.ny)?;

    dst.fill(Complex64::default());
    let scale = (dg.len() / sg.len()) as f64;
    for iy in 0..sg.ny {
        let dy = map_y[iy];
        for ix in 0..sg.nx {
            dst.set(map_x[ix], dy, scale * src.get(ix, iy));
        }
    }
    Ok(())
}

/// Per-axis index map keeping mode n at n and mode -m at the tail of the
/// wider layout; the source Nyquist lands on the negative side.
fn axis_map(n_in: usize, n_out: usize) -> Result<Vec<usize>, CoreError> {
    if n_out < n_in {
        return Err(CoreError::InvalidShape(format!(
            "cannot downscale a spectrum from {n_in} to {n_out}"
        )));
    }
    if n_out % n_in != 0 {
        return Err(CoreError::InvalidShape(format!(
            "resampling factor {n_out}/{n_in} is not an integer"
        )));
    }
    let half = n_in / 2;
    let mut map = vec![0usize; n_in];
    for (i, slot) in map.iter_mut().enumerate().take(half) {
        *slot = i;
    }
    for m in 1..=half {
        map[n_in - m] = n_out - m;
    }
    Ok(map)
}
