//! Uniform periodic grid helpers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid2D {
    pub nx: usize,
    pub ny: usize,
    #[serde(default = "default_length")]
    pub lx: f64,
    #[serde(default = "default_length")]
    pub ly: f64,
}

impl Grid2D {
    pub fn new(nx: usize, ny: usize, lx: f64, ly: f64) -> Self {
        Self { nx, ny, lx, ly }
    }

    #[inline]
    pub fn idx(&self, ix: usize, iy: usize) -> usize {
        iy * self.nx + ix
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dx(&self) -> f64 {
        self.lx / self.nx as f64
    }

    pub fn dy(&self) -> f64 {
        self.ly / self.ny as f64
    }

    pub fn axis_x(&self) -> PeriodicAxis {
        PeriodicAxis::new(self.nx, self.lx)
    }

    pub fn axis_y(&self) -> PeriodicAxis {
        PeriodicAxis::new(self.ny, self.ly)
    }
}

fn default_length() -> f64 {
    std::f64::consts::TAU
}

/// Node coordinates of one periodic axis. Holds N + 1 samples with
/// `node(0) = 0` and `node(N) = L`, so the closing node of the period is
/// addressable when a loop corner lands exactly on the boundary.
#[derive(Debug, Clone)]
pub struct PeriodicAxis {
    n: usize,
    length: f64,
    nodes: Vec<f64>,
}

impl PeriodicAxis {
    pub fn new(n: usize, length: f64) -> Self {
        assert!(n > 0, "axis must have at least one node");
        let step = length / n as f64;
        let nodes = (0..=n)
            .map(|i| if i == n { length } else { i as f64 * step })
            .collect();
        Self { n, length, nodes }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn step(&self) -> f64 {
        self.length / self.n as f64
    }

    pub fn node(&self, i: usize) -> f64 {
        self.nodes[i]
    }

    /// Fold an unbounded node index back into `0..n`, returning the folded
    /// index together with the physical coordinate including the unwrapped
    /// period offset: `wrap(i + k*n) = (i, k*L + node(i))`.
    pub fn wrap(&self, mut i: isize) -> (usize, f64) {
        let n = self.n as isize;
        let mut offset = 0.0;
        while i < 0 {
            i += n;
            offset -= self.length;
        }
        while i >= n {
            i -= n;
            offset += self.length;
        }
        (i as usize, offset + self.nodes[i as usize])
    }
}
