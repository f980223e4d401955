//! Statistics accumulators for circulation samples.
//!
//! One `StatsAccumulator` holds the enabled blocks (moments, 1D and 2D
//! histograms) for one physical quantity. Threaded updates go through
//! per-thread shards over disjoint contiguous sample ranges; shards are
//! folded into a master with `reduce`, which is associative and
//! commutative, then `finalise` normalises the moments and freezes the
//! accumulator.

mod histogram;
mod moments;

pub use histogram::{Histogram1D, Histogram2D};
pub use moments::{Moments, MomentsSpec};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Physical quantity whose circulation is being accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    Velocity,
    RegVelocity,
    Momentum,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Velocity => write!(f, "Velocity"),
            Quantity::RegVelocity => write!(f, "RegVelocity"),
            Quantity::Momentum => write!(f, "Momentum"),
        }
    }
}

/// Per-quantity accumulator over a fixed list of loop sizes.
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    loop_sizes: Vec<usize>,
    moments: Option<Moments>,
    histogram: Option<Histogram1D>,
    histogram2d: Option<Histogram2D>,
    finalised: bool,
}

impl StatsAccumulator {
    pub fn new(
        loop_sizes: Vec<usize>,
        moments: Option<MomentsSpec>,
        histogram_edges: Option<Vec<f64>>,
        histogram2d_edges: Option<(Vec<f64>, Vec<f64>)>,
    ) -> Self {
        let nr = loop_sizes.len();
        Self {
            loop_sizes,
            moments: moments.map(|spec| Moments::new(spec, nr)),
            histogram: histogram_edges.map(|edges| Histogram1D::new(edges, nr)),
            histogram2d: histogram2d_edges.map(|(a, b)| Histogram2D::new(a, b, nr)),
            finalised: false,
        }
    }

    pub fn loop_sizes(&self) -> &[usize] {
        &self.loop_sizes
    }

    pub fn n_loops(&self) -> usize {
        self.loop_sizes.len()
    }

    pub fn is_finalised(&self) -> bool {
        self.finalised
    }

    pub fn moments(&self) -> Option<&Moments> {
        self.moments.as_ref()
    }

    pub fn histogram(&self) -> Option<&Histogram1D> {
        self.histogram.as_ref()
    }

    pub fn histogram2d(&self) -> Option<&Histogram2D> {
        self.histogram2d.as_ref()
    }

    /// Accumulate a batch of circulation samples for loop-size index
    /// `r_idx` into the moments and 1D histogram blocks.
    pub fn update(&mut self, gamma: &[f64], r_idx: usize) -> Result<(), CoreError> {
        if self.finalised {
            return Err(CoreError::UseAfterFinalise);
        }
        assert!(r_idx < self.n_loops(), "loop-size index out of range");
        if let Some(moments) = &mut self.moments {
            moments.update(gamma, r_idx);
        }
        if let Some(histogram) = &mut self.histogram {
            histogram.update(gamma, r_idx);
        }
        Ok(())
    }

    /// Joint update of (circulation, conditioning value) pairs into the
    /// 2D histogram block.
    pub fn update_joint(
        &mut self,
        gamma: &[f64],
        cond: &[f64],
        r_idx: usize,
    ) -> Result<(), CoreError> {
        if self.finalised {
            return Err(CoreError::UseAfterFinalise);
        }
        assert!(r_idx < self.n_loops(), "loop-size index out of range");
        if gamma.len() != cond.len() {
            return Err(CoreError::DimensionMismatch(
                "joint update requires equal sample counts".into(),
            ));
        }
        if let Some(histogram2d) = &mut self.histogram2d {
            histogram2d.update(gamma, cond, r_idx);
        }
        Ok(())
    }

    /// Fold a shard into `self`. Shards must carry the same loop sizes.
    pub fn reduce(&mut self, shard: &StatsAccumulator) {
        assert_eq!(
            self.loop_sizes, shard.loop_sizes,
            "cannot reduce shards with different loop sizes"
        );
        if let (Some(dst), Some(src)) = (&mut self.moments, &shard.moments) {
            dst.reduce(src);
        }
        if let (Some(dst), Some(src)) = (&mut self.histogram, &shard.histogram) {
            dst.reduce(src);
        }
        if let (Some(dst), Some(src)) = (&mut self.histogram2d, &shard.histogram2d) {
            dst.reduce(src);
        }
    }

    /// Normalise the moments and freeze the accumulator; further updates
    /// and resets fail with `UseAfterFinalise`.
    pub fn finalise(&mut self) -> Result<(), CoreError> {
        if self.finalised {
            return Err(CoreError::UseAfterFinalise);
        }
        if let Some(moments) = &mut self.moments {
            moments.finalise();
        }
        self.finalised = true;
        Ok(())
    }

    /// Clear all sums and counters.
    pub fn reset(&mut self) -> Result<(), CoreError> {
        if self.finalised {
            return Err(CoreError::UseAfterFinalise);
        }
        if let Some(moments) = &mut self.moments {
            moments.reset();
        }
        if let Some(histogram) = &mut self.histogram {
            histogram.reset();
        }
        if let Some(histogram2d) = &mut self.histogram2d {
            histogram2d.reset();
        }
        Ok(())
    }
}

/// Chunk length for partitioning `len` samples into at most `parts`
/// contiguous ranges of near-equal size (ceil division).
pub fn chunk_len(len: usize, parts: usize) -> usize {
    let parts = parts.max(1);
    len.div_ceil(parts).max(1)
}
