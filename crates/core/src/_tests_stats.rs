#![cfg(test)]

use super::error::CoreError;
use super::stats::{chunk_len, Histogram1D, MomentsSpec, StatsAccumulator};

fn linear_edges(min: f64, max: f64, bins: usize) -> Vec<f64> {
    let step = (max - min) / bins as f64;
    (0..=bins).map(|i| min + i as f64 * step).collect()
}

/// Deterministic pseudo-random samples in [0, 1).
fn lcg_samples(n: usize, mut state: u64) -> Vec<f64> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        out.push((state >> 11) as f64 / (1u64 << 53) as f64);
    }
    out
}

#[test]
fn moments_normalise_on_finalise() {
    let spec = MomentsSpec {
        p_max: 3,
        absolute: false,
        fractional: Vec::new(),
    };
    let mut acc = StatsAccumulator::new(vec![2], Some(spec), None, None);
    acc.update(&[1.0, 2.0, 3.0, 4.0, 5.0], 0).unwrap();

    let moments = acc.moments().unwrap();
    assert_eq!(moments.raw_sum(1, 0), 15.0);
    assert!(moments.mean(1, 0).is_none(), "means must not leak before finalise");

    acc.finalise().unwrap();
    let moments = acc.moments().unwrap();
    assert!((moments.mean(1, 0).unwrap() - 3.0).abs() < 1e-12);
    assert!((moments.mean(2, 0).unwrap() - 11.0).abs() < 1e-12);
    assert!((moments.mean(3, 0).unwrap() - 45.0).abs() < 1e-12);
}

#[test]
fn absolute_and_fractional_moments_track_magnitudes() {
    let spec = MomentsSpec {
        p_max: 2,
        absolute: true,
        fractional: vec![0.5],
    };
    let mut acc = StatsAccumulator::new(vec![1], Some(spec), None, None);
    acc.update(&[-4.0, 4.0], 0).unwrap();
    acc.finalise().unwrap();

    let moments = acc.moments().unwrap();
    assert!((moments.mean(1, 0).unwrap()).abs() < 1e-12); // signed mean cancels
    assert!((moments.mean_abs(1, 0).unwrap() - 4.0).abs() < 1e-12);
    assert!((moments.mean_fractional(0, 0).unwrap() - 2.0).abs() < 1e-12);
}

#[test]
fn histogram_boundary_conventions() {
    let edges = linear_edges(0.0, 4.0, 4);
    let mut acc = StatsAccumulator::new(vec![1], None, Some(edges), None);
    acc.update(&[0.0, 1.0, 3.9, 4.0, -1.0, 7.5], 0).unwrap();

    let hist = acc.histogram().unwrap();
    assert_eq!(hist.counts_for(0), &[2, 0, 0, 1]); // 0.0 and 1.0 left-bin, 3.9 last bin
    assert_eq!(hist.nsamples(0), 6); // outliers still counted
    assert_eq!(hist.vmin(0), -1.0);
    assert_eq!(hist.vmax(0), 7.5);
}

#[test]
fn sharded_reduction_matches_single_threaded_accumulation() {
    let samples = lcg_samples(1000, 42);
    let edges = linear_edges(0.0, 1.0, 20);
    let build = || {
        StatsAccumulator::new(
            vec![4, 8],
            Some(MomentsSpec {
                p_max: 4,
                absolute: true,
                fractional: vec![0.25, 0.75],
            }),
            Some(edges.clone()),
            None,
        )
    };

    let mut single = build();
    single.update(&samples, 0).unwrap();
    single.update(&samples[..500], 1).unwrap();

    let mut master = build();
    let mut shards: Vec<_> = (0..4).map(|_| build()).collect();
    let chunk = chunk_len(samples.len(), shards.len());
    for (shard, part) in shards.iter_mut().zip(samples.chunks(chunk)) {
        shard.update(part, 0).unwrap();
    }
    let chunk = chunk_len(500, shards.len());
    for (shard, part) in shards.iter_mut().zip(samples[..500].chunks(chunk)) {
        shard.update(part, 1).unwrap();
    }
    for shard in &shards {
        master.reduce(shard);
    }

    for r in 0..2 {
        let (a, b) = (single.histogram().unwrap(), master.histogram().unwrap());
        assert_eq!(a.counts_for(r), b.counts_for(r));
        assert_eq!(a.nsamples(r), b.nsamples(r));
        assert_eq!(a.vmin(r), b.vmin(r));
        assert_eq!(a.vmax(r), b.vmax(r));

        let (a, b) = (single.moments().unwrap(), master.moments().unwrap());
        for p in 1..=4 {
            assert!((a.raw_sum(p, r) - b.raw_sum(p, r)).abs() < 1e-9);
        }
        assert_eq!(a.nsamples(r), b.nsamples(r));
    }
}

#[test]
fn finalised_accumulator_rejects_updates_and_resets() {
    let mut acc = StatsAccumulator::new(
        vec![1],
        Some(MomentsSpec {
            p_max: 1,
            absolute: false,
            fractional: Vec::new(),
        }),
        None,
        None,
    );
    acc.update(&[1.0], 0).unwrap();
    acc.finalise().unwrap();
    assert!(matches!(acc.update(&[1.0], 0), Err(CoreError::UseAfterFinalise)));
    assert!(matches!(acc.reset(), Err(CoreError::UseAfterFinalise)));
    assert!(matches!(acc.finalise(), Err(CoreError::UseAfterFinalise)));
}

#[test]
fn reset_clears_counters() {
    let mut acc = StatsAccumulator::new(
        vec![1],
        Some(MomentsSpec {
            p_max: 2,
            absolute: false,
            fractional: Vec::new(),
        }),
        Some(linear_edges(-1.0, 1.0, 4)),
        None,
    );
    acc.update(&[0.5, -0.5], 0).unwrap();
    acc.reset().unwrap();
    assert_eq!(acc.moments().unwrap().nsamples(0), 0);
    assert_eq!(acc.histogram().unwrap().nsamples(0), 0);
    assert_eq!(acc.moments().unwrap().raw_sum(2, 0), 0.0);
}

#[test]
fn joint_histogram_requires_both_coordinates_in_range() {
    let mut acc = StatsAccumulator::new(
        vec![1],
        None,
        None,
        Some((linear_edges(0.0, 1.0, 2), linear_edges(0.0, 10.0, 2))),
    );
    acc.update_joint(&[0.25, 0.25, 2.0], &[2.0, 50.0, 2.0], 0).unwrap();

    let hist = acc.histogram2d().unwrap();
    // only the first pair is inside both ranges
    assert_eq!(hist.counts_for(0).iter().sum::<u64>(), 1);
    assert_eq!(hist.counts_for(0)[0], 1); // bin (0, 0)
    assert_eq!(hist.nsamples(0), 3);
    assert_eq!(hist.vmax_b(0), 50.0);
    assert_eq!(hist.vmax_a(0), 2.0);
}

#[test]
fn joint_update_rejects_length_mismatch() {
    let mut acc = StatsAccumulator::new(
        vec![1],
        None,
        None,
        Some((linear_edges(0.0, 1.0, 2), linear_edges(0.0, 1.0, 2))),
    );
    assert!(matches!(
        acc.update_joint(&[0.5], &[0.5, 0.5], 0),
        Err(CoreError::DimensionMismatch(_))
    ));
}

#[test]
fn chunk_len_covers_all_samples() {
    assert_eq!(chunk_len(1000, 4), 250);
    assert_eq!(chunk_len(10, 4), 3); // 3+3+3+1
    assert_eq!(chunk_len(3, 4), 1);
    assert_eq!(chunk_len(0, 4), 1);
}
