//! Wind-condition bin assignment.
//!
//! Attaches one bin-lower-bound column per active step variable to an
//! owned, filtered copy of the observation table. Bin assignment is only
//! defined inside the specified bounds, so the pre-filter on both
//! dimensions is mandatory: a row with an out-of-range speed is dropped
//! even when only direction is being stepped over.

use anyhow::{Context, Result};
use polars::prelude::*;
use wfgain_core::{BinSpec, StepVar};

/// Bin-lower-bound column for the direction dimension.
pub const DIRECTION_BIN_COL: &str = "direction_bin";

/// Bin-lower-bound column for the speed dimension.
pub const SPEED_BIN_COL: &str = "speed_bin";

/// Column holding the bin lower bounds for a step variable.
pub fn bin_column(var: StepVar) -> &'static str {
    match var {
        StepVar::Direction => DIRECTION_BIN_COL,
        StepVar::Speed => SPEED_BIN_COL,
    }
}

/// Filter `df` to rows inside both `[lower, upper)` ranges and attach a
/// bin-lower-bound column per active step variable.
///
/// Returns an owned copy; the input table is never mutated. Rows with a
/// missing direction or speed are dropped along with the out-of-range ones.
pub fn assign_bins(
    df: &DataFrame,
    wd_col: &str,
    ws_col: &str,
    direction: &BinSpec,
    speed: &BinSpec,
    step_vars: &[StepVar],
) -> Result<DataFrame> {
    let wd_series = df
        .column(wd_col)?
        .cast(&DataType::Float64)
        .with_context(|| format!("casting wind direction column '{wd_col}' to Float64"))?;
    let ws_series = df
        .column(ws_col)?
        .cast(&DataType::Float64)
        .with_context(|| format!("casting wind speed column '{ws_col}' to Float64"))?;
    let wd = wd_series.f64()?;
    let ws = ws_series.f64()?;

    let mut keep: Vec<IdxSize> = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        if let (Some(d), Some(s)) = (wd.get(idx), ws.get(idx)) {
            if direction.contains(d) && speed.contains(s) {
                keep.push(idx as IdxSize);
            }
        }
    }

    let idx_ca = IdxCa::new("keep", keep.as_slice());
    let mut binned = df.take(&idx_ca).context("filtering rows to bin bounds")?;

    for var in step_vars {
        let (series, spec) = match var {
            StepVar::Direction => (&wd_series, direction),
            StepVar::Speed => (&ws_series, speed),
        };
        let values = series.f64()?;
        let lowers: Vec<f64> = keep
            .iter()
            .map(|&idx| {
                // Rows in `keep` are non-null by construction.
                let value = values.get(idx as usize).unwrap_or(f64::NAN);
                spec.bin_lower_bound(value)
            })
            .collect();
        binned.with_column(Series::new(bin_column(*var), lowers))?;
    }

    Ok(binned)
}
