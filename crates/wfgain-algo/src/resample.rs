//! Bootstrap row resampling.
//!
//! Both shapes draw from the same random stream in the same order: the
//! pooled table's rows `[r * n, (r + 1) * n)` are exactly the looped
//! form's replicate `r` for the same seed. Callers can pick whichever
//! layout suits them without changing the statistics.

use std::time::Instant;

use anyhow::{bail, Context, Result};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Replicate-id column attached to the pooled sample.
pub const REP_ID_COL: &str = "rep_id";

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Draw `b` bootstrap replicates of `df` (sampling rows with replacement,
/// each replicate the size of the input) and stack them into one table
/// with a [`REP_ID_COL`] column identifying the replicate.
///
/// Replicate `r` occupies rows `[r * n, (r + 1) * n)`, so a caller can
/// recover it with `df.slice((r * n) as i64, n)`.
pub fn pooled_sample(df: &DataFrame, b: usize, seed: Option<u64>) -> Result<DataFrame> {
    let n = df.height();
    if n == 0 {
        bail!("cannot bootstrap an empty observation table");
    }
    let start = Instant::now();
    let mut rng = rng_for(seed);

    let mut draws: Vec<IdxSize> = Vec::with_capacity(b * n);
    let mut rep_ids: Vec<i64> = Vec::with_capacity(b * n);
    for rep in 0..b {
        for _ in 0..n {
            draws.push(rng.gen_range(0..n) as IdxSize);
            rep_ids.push(rep as i64);
        }
    }

    let idx_ca = IdxCa::new("draws", draws.as_slice());
    let mut pooled = df.take(&idx_ca).context("stacking bootstrap replicates")?;
    pooled.with_column(Series::new(REP_ID_COL, rep_ids))?;

    debug!(
        replicates = b,
        rows = pooled.height(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "drew pooled bootstrap sample"
    );
    Ok(pooled)
}

/// Draw the same `b` replicates as [`pooled_sample`] but keep each as its
/// own table, without the replicate-id column.
pub fn replicate_samples(df: &DataFrame, b: usize, seed: Option<u64>) -> Result<Vec<DataFrame>> {
    let n = df.height();
    if n == 0 {
        bail!("cannot bootstrap an empty observation table");
    }
    let mut rng = rng_for(seed);

    let mut replicates: Vec<DataFrame> = Vec::with_capacity(b);
    let mut draws: Vec<IdxSize> = Vec::with_capacity(n);
    for _ in 0..b {
        draws.clear();
        for _ in 0..n {
            draws.push(rng.gen_range(0..n) as IdxSize);
        }
        let idx_ca = IdxCa::new("draws", draws.as_slice());
        replicates.push(df.take(&idx_ca).context("drawing bootstrap replicate")?);
    }
    Ok(replicates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df![
            "time" => &[0i64, 1, 2, 3],
            "pow_001" => &[100.0, 110.0, 120.0, 130.0],
        ]
        .unwrap()
    }

    #[test]
    fn pooled_sample_has_expected_shape() {
        let df = frame();
        let pooled = pooled_sample(&df, 3, Some(7)).unwrap();
        assert_eq!(pooled.height(), 12);
        let rep_ids = pooled.column(REP_ID_COL).unwrap().i64().unwrap();
        assert_eq!(rep_ids.get(0), Some(0));
        assert_eq!(rep_ids.get(4), Some(1));
        assert_eq!(rep_ids.get(11), Some(2));
    }

    fn times(df: &DataFrame) -> Vec<Option<i64>> {
        df.column("time").unwrap().i64().unwrap().into_iter().collect()
    }

    #[test]
    fn pooled_slices_equal_looped_replicates() {
        let df = frame();
        let b = 5;
        let pooled = pooled_sample(&df, b, Some(42)).unwrap();
        let looped = replicate_samples(&df, b, Some(42)).unwrap();
        let n = df.height();
        for (rep, replicate) in looped.iter().enumerate() {
            let slice = pooled.slice((rep * n) as i64, n);
            assert_eq!(times(&slice), times(replicate), "replicate {rep} differs");
        }
    }

    #[test]
    fn same_seed_reproduces_the_draw() {
        let df = frame();
        let a = pooled_sample(&df, 4, Some(9)).unwrap();
        let b = pooled_sample(&df, 4, Some(9)).unwrap();
        assert_eq!(times(&a), times(&b));
    }

    #[test]
    fn empty_table_is_rejected() {
        let df = frame().slice(0, 0);
        assert!(pooled_sample(&df, 2, Some(1)).is_err());
        assert!(replicate_samples(&df, 2, Some(1)).is_err());
    }
}
