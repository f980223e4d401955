//! Wavenumber sequences for the periodic spectral transforms.

use crate::error::CoreError;

/// Two-sided angular wavenumbers for a complex transform of length `n`
/// over physical length `length`:
/// `[0, 1, ..., n/2 - 1, -n/2, ..., -1] * 2 pi / L`.
pub fn wavenumbers(n: usize, length: f64) -> Vec<f64> {
    let scale = std::f64::consts::TAU / length;
    (0..n)
        .map(|i| {
            let centered = if i < n / 2 {
                i as isize
            } else {
                i as isize - n as isize
            };
            scale * centered as f64
        })
        .collect()
}

/// Spectral layouts assume even transform lengths; the negative-frequency
/// half would otherwise be ambiguous.
pub fn ensure_even(n: usize) -> Result<(), CoreError> {
    if n % 2 != 0 {
        return Err(CoreError::InvalidShape(format!(
            "axis length {n} is odd; spectral layout requires even axes"
        )));
    }
    Ok(())
}
