//! Running moments of circulation samples per loop size.

use serde::{Deserialize, Serialize};

/// Which moment orders to accumulate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentsSpec {
    /// Highest integer order; signed sums of Gamma^p for p in 1..=p_max.
    pub p_max: usize,
    /// Also accumulate |Gamma|^p for the same integer orders.
    #[serde(default)]
    pub absolute: bool,
    /// Fractional orders 0 < p < 1, accumulated as |Gamma|^p.
    #[serde(default)]
    pub fractional: Vec<f64>,
}

/// Running sums of powers of the samples, normalised on `finalise`.
#[derive(Debug, Clone)]
pub struct Moments {
    spec: MomentsSpec,
    nr: usize,
    sums: Vec<f64>,
    abs_sums: Vec<f64>,
    frac_sums: Vec<f64>,
    nsamples: Vec<u64>,
    normalised: bool,
}

impl Moments {
    pub fn new(spec: MomentsSpec, nr: usize) -> Self {
        assert!(spec.p_max > 0, "p_max must be at least 1");
        let abs_len = if spec.absolute { nr * spec.p_max } else { 0 };
        let frac_len = nr * spec.fractional.len();
        Self {
            sums: vec![0.0; nr * spec.p_max],
            abs_sums: vec![0.0; abs_len],
            frac_sums: vec![0.0; frac_len],
            nsamples: vec![0; nr],
            normalised: false,
            spec,
            nr,
        }
    }

    pub fn spec(&self) -> &MomentsSpec {
        &self.spec
    }

    pub fn is_normalised(&self) -> bool {
        self.normalised
    }

    pub fn nsamples(&self, r_idx: usize) -> u64 {
        self.nsamples[r_idx]
    }

    pub(crate) fn update(&mut self, gamma: &[f64], r_idx: usize) {
        let p_max = self.spec.p_max;
        let base = r_idx * p_max;
        for &g in gamma {
            let mut pow = 1.0;
            for slot in &mut self.sums[base..base + p_max] {
                pow *= g;
                *slot += pow;
            }
            if self.spec.absolute {
                let a = g.abs();
                let mut pow = 1.0;
                for slot in &mut self.abs_sums[base..base + p_max] {
                    pow *= a;
                    *slot += pow;
                }
            }
            if !self.spec.fractional.is_empty() {
                let a = g.abs();
                let fbase = r_idx * self.spec.fractional.len();
                for (k, &p) in self.spec.fractional.iter().enumerate() {
                    self.frac_sums[fbase + k] += a.powf(p);
                }
            }
        }
        self.nsamples[r_idx] += gamma.len() as u64;
    }

    pub(crate) fn reduce(&mut self, other: &Moments) {
        assert_eq!(self.nr, other.nr, "moment shards disagree on loop count");
        assert_eq!(
            self.spec.p_max, other.spec.p_max,
            "moment shards disagree on p_max"
        );
        for (dst, src) in self.sums.iter_mut().zip(&other.sums) {
            *dst += src;
        }
        for (dst, src) in self.abs_sums.iter_mut().zip(&other.abs_sums) {
            *dst += src;
        }
        for (dst, src) in self.frac_sums.iter_mut().zip(&other.frac_sums) {
            *dst += src;
        }
        for (dst, src) in self.nsamples.iter_mut().zip(&other.nsamples) {
            *dst += src;
        }
    }

    /// Divide every running sum by its sample count.
    pub(crate) fn finalise(&mut self) {
        let p_max = self.spec.p_max;
        let n_frac = self.spec.fractional.len();
        for r in 0..self.nr {
            let count = self.nsamples[r];
            if count == 0 {
                continue;
            }
            let inv = 1.0 / count as f64;
            for slot in &mut self.sums[r * p_max..(r + 1) * p_max] {
                *slot *= inv;
            }
            if self.spec.absolute {
                for slot in &mut self.abs_sums[r * p_max..(r + 1) * p_max] {
                    *slot *= inv;
                }
            }
            for slot in &mut self.frac_sums[r * n_frac..(r + 1) * n_frac] {
                *slot *= inv;
            }
        }
        self.normalised = true;
    }

    pub(crate) fn reset(&mut self) {
        self.sums.fill(0.0);
        self.abs_sums.fill(0.0);
        self.frac_sums.fill(0.0);
        self.nsamples.fill(0);
        self.normalised = false;
    }

    /// The raw running sum of Gamma^p (1-based order), before finalise.
    pub fn raw_sum(&self, p: usize, r_idx: usize) -> f64 {
        assert!((1..=self.spec.p_max).contains(&p), "order out of range");
        self.sums[r_idx * self.spec.p_max + p - 1]
    }

    /// ⟨Gamma^p⟩ for 1-based order `p`; None before finalise.
    pub fn mean(&self, p: usize, r_idx: usize) -> Option<f64> {
        if !self.normalised {
            return None;
        }
        Some(self.raw_sum(p, r_idx))
    }

    /// ⟨|Gamma|^p⟩ for 1-based order `p`; None before finalise or when
    /// absolute moments are disabled.
    pub fn mean_abs(&self, p: usize, r_idx: usize) -> Option<f64> {
        if !self.normalised || !self.spec.absolute {
            return None;
        }
        assert!((1..=self.spec.p_max).contains(&p), "order out of range");
        Some(self.abs_sums[r_idx * self.spec.p_max + p - 1])
    }

    /// ⟨|Gamma|^p⟩ for the k-th configured fractional order.
    pub fn mean_fractional(&self, k: usize, r_idx: usize) -> Option<f64> {
        if !self.normalised {
            return None;
        }
        let n_frac = self.spec.fractional.len();
        assert!(k < n_frac, "fractional order index out of range");
        Some(self.frac_sums[r_idx * n_frac + k])
    }
}
