//! Power-ratio, percent-power-gain, and AEP-gain metrics.
//!
//! Two surfaces exist side by side, both consuming the same underlying
//! data:
//! - Scalar functions ([`average_power`], [`power_ratio`],
//!   [`change_in_power_ratio`], [`percent_power_gain`]) that select rows
//!   straight from the raw observation table for one wind-condition bin
//!   and thread the typed no-observations signal through every dependent
//!   computation.
//! - The tabular [`compute_all`] path over the wide aggregate, which is
//!   the single normalized representation consumed by [`aep_gain`] and by
//!   the bootstrap pipeline.
//!
//! The two paths differ deliberately in one place: the scalar percent
//! power gain divides the ratio change by the baseline ratio, while
//! `compute_all` divides by the controlled ratio. Both formulas are kept
//! exactly as specified.

use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::info;
use wfgain_core::{
    power_column, AepMethod, BinKey, ControlMode, ModeFilter, NoObservations, StepVar,
    TurbineRole, TurbineRoles, CONTROL_MODE_COL,
};

use crate::aggregate::{CellGrid, RoleAggregate};
use crate::binning::bin_column;
use crate::stats::nan_sum;

/// A metric value, or the typed signal that its defining selection was
/// empty. Callers pattern-match; the signal carries the full causal chain
/// of notes for display.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Value(f64),
    NoData(NoObservations),
}

impl MetricValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Value(v) => Some(*v),
            MetricValue::NoData(_) => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, MetricValue::NoData(_))
    }

    pub fn no_data(&self) -> Option<&NoObservations> {
        match self {
            MetricValue::NoData(signal) => Some(signal),
            MetricValue::Value(_) => None,
        }
    }

    /// Append a note when carrying a no-data signal; values pass through.
    fn note(self, note: &str) -> Self {
        match self {
            MetricValue::NoData(signal) => MetricValue::NoData(signal.with_note(note)),
            value => value,
        }
    }
}

/// Mean power across `turbines` over the raw rows matching the given
/// wind-direction bin, wind-speed bin (both half-open), and mode filter.
///
/// An empty row selection yields the typed no-observations signal. Rows
/// that match but carry only missing power readings yield `Value(NaN)`,
/// which is a different condition: the bin was observed, the sensors were
/// not.
pub fn average_power(
    df: &DataFrame,
    wd_col: &str,
    ws_col: &str,
    direction_bin: (f64, f64),
    speed_bin: (f64, f64),
    turbines: &[usize],
    mode: ModeFilter,
) -> Result<MetricValue> {
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

    let mode_labels = if matches!(mode, ModeFilter::Both) {
        None
    } else {
        Some(
            df.column(CONTROL_MODE_COL)
                .context("observation table is missing the control-mode column")?
                .utf8()?,
        )
    };

    let mut rows: Vec<usize> = Vec::new();
    for idx in 0..df.height() {
        let in_bin = match (wd.get(idx), ws.get(idx)) {
            (Some(d), Some(s)) => {
                d >= direction_bin.0
                    && d < direction_bin.1
                    && s >= speed_bin.0
                    && s < speed_bin.1
            }
            _ => false,
        };
        if !in_bin {
            continue;
        }
        if let Some(labels) = mode_labels {
            match labels.get(idx) {
                Some(label) if mode.admits(label) => {}
                _ => continue,
            }
        }
        rows.push(idx);
    }

    if rows.is_empty() {
        return Ok(MetricValue::NoData(NoObservations::new(
            turbines.to_vec(),
            mode,
            direction_bin,
            speed_bin,
        )));
    }

    let mut sum = 0.0;
    let mut count = 0u64;
    for &turbine in turbines {
        let name = power_column(turbine)?;
        let series = df
            .column(&name)
            .with_context(|| format!("selecting power column '{name}'"))?
            .cast(&DataType::Float64)
            .with_context(|| format!("casting power column '{name}' to Float64"))?;
        let power = series.f64()?;
        for &idx in &rows {
            if let Some(value) = power.get(idx) {
                sum += value;
                count += 1;
            }
        }
    }

    if count == 0 {
        return Ok(MetricValue::Value(f64::NAN));
    }
    Ok(MetricValue::Value(sum / count as f64))
}

/// Test-turbine average power divided by reference-turbine average power
/// for one bin and control mode. With `use_reference = false` the
/// denominator is fixed at one, so the "ratio" degenerates to plain
/// average power.
pub fn power_ratio(
    df: &DataFrame,
    wd_col: &str,
    ws_col: &str,
    direction_bin: (f64, f64),
    speed_bin: (f64, f64),
    roles: &TurbineRoles,
    mode: ControlMode,
    use_reference: bool,
) -> Result<MetricValue> {
    let numerator = average_power(
        df,
        wd_col,
        ws_col,
        direction_bin,
        speed_bin,
        &roles.test,
        mode.into(),
    )?
    .note("cannot compute power ratio numerator (average power)");
    let numerator = match numerator {
        MetricValue::Value(v) => v,
        no_data => return Ok(no_data),
    };

    let denominator = if use_reference {
        let denominator = average_power(
            df,
            wd_col,
            ws_col,
            direction_bin,
            speed_bin,
            &roles.reference,
            mode.into(),
        )?
        .note("cannot compute power ratio denominator (average power)");
        match denominator {
            MetricValue::Value(v) => v,
            no_data => return Ok(no_data),
        }
    } else {
        info!("reference turbines unused; computing average power");
        1.0
    };

    Ok(MetricValue::Value(numerator / denominator))
}

/// Controlled-mode power ratio minus baseline-mode power ratio.
///
/// Without reference turbines this is equivalently the change in average
/// power; the formula is unchanged.
pub fn change_in_power_ratio(
    df: &DataFrame,
    wd_col: &str,
    ws_col: &str,
    direction_bin: (f64, f64),
    speed_bin: (f64, f64),
    roles: &TurbineRoles,
    use_reference: bool,
) -> Result<MetricValue> {
    if !use_reference {
        info!(
            "change in power ratio without reference turbines is change in average power; \
             set use_reference to compare against reference turbines"
        );
    }
    let control = power_ratio(
        df,
        wd_col,
        ws_col,
        direction_bin,
        speed_bin,
        roles,
        ControlMode::Controlled,
        use_reference,
    )?
    .note("cannot compute power ratio for controlled mode");
    let control = match control {
        MetricValue::Value(v) => v,
        no_data => return Ok(no_data),
    };
    let baseline = power_ratio(
        df,
        wd_col,
        ws_col,
        direction_bin,
        speed_bin,
        roles,
        ControlMode::Baseline,
        use_reference,
    )?
    .note("cannot compute power ratio for baseline mode");
    let baseline = match baseline {
        MetricValue::Value(v) => v,
        no_data => return Ok(no_data),
    };
    Ok(MetricValue::Value(control - baseline))
}

/// Relative gain of the controlled-mode ratio over the baseline-mode
/// ratio: `(control - baseline) / baseline`.
pub fn percent_power_gain(
    df: &DataFrame,
    wd_col: &str,
    ws_col: &str,
    direction_bin: (f64, f64),
    speed_bin: (f64, f64),
    roles: &TurbineRoles,
    use_reference: bool,
) -> Result<MetricValue> {
    let control = power_ratio(
        df,
        wd_col,
        ws_col,
        direction_bin,
        speed_bin,
        roles,
        ControlMode::Controlled,
        use_reference,
    )?
    .note("cannot compute power ratio for controlled mode");
    let control = match control {
        MetricValue::Value(v) => v,
        no_data => return Ok(no_data),
    };
    let baseline = power_ratio(
        df,
        wd_col,
        ws_col,
        direction_bin,
        speed_bin,
        roles,
        ControlMode::Baseline,
        use_reference,
    )?
    .note("cannot compute power ratio for baseline mode");
    let baseline = match baseline {
        MetricValue::Value(v) => v,
        no_data => return Ok(no_data),
    };
    Ok(MetricValue::Value((control - baseline) / baseline))
}

/// Per-bin derived metrics, immutable once computed.
///
/// Carries the underlying `{role, mode}` cells so the AEP formulas can
/// reach the reference-turbine averages and counts without going back to
/// the aggregate.
#[derive(Debug, Clone)]
pub struct BinMetrics {
    pub key: BinKey,
    pub direction_bin: Option<f64>,
    pub speed_bin: Option<f64>,
    pub cells: CellGrid,
    pub power_ratio_baseline: f64,
    pub power_ratio_control: f64,
    pub change_in_power_ratio: f64,
    pub percent_power_gain: f64,
    pub total_num_obvs: u64,
    /// Share of all retained observations falling in this bin.
    pub freq: f64,
}

/// Derive the full per-bin metric table from the wide aggregate.
///
/// With `use_reference` the ratios divide test averages by reference
/// averages per mode and the observation total sums all four contributing
/// group counts; without it the "ratios" are plain test averages and the
/// total sums the two test counts. Missing combinations read as NaN
/// averages and zero counts, never a fatal error. The tabular percent
/// power gain is `change / power_ratio_control`.
pub fn compute_all(aggregate: &RoleAggregate, use_reference: bool) -> Vec<BinMetrics> {
    let mut metrics: Vec<BinMetrics> = Vec::with_capacity(aggregate.bins.len());
    for (key, grid) in &aggregate.bins {
        let (power_ratio_baseline, power_ratio_control, total_num_obvs) = if use_reference {
            (
                grid.average_power(TurbineRole::Test, ControlMode::Baseline)
                    / grid.average_power(TurbineRole::Reference, ControlMode::Baseline),
                grid.average_power(TurbineRole::Test, ControlMode::Controlled)
                    / grid.average_power(TurbineRole::Reference, ControlMode::Controlled),
                grid.num_observations(TurbineRole::Test, ControlMode::Controlled)
                    + grid.num_observations(TurbineRole::Reference, ControlMode::Controlled)
                    + grid.num_observations(TurbineRole::Test, ControlMode::Baseline)
                    + grid.num_observations(TurbineRole::Reference, ControlMode::Baseline),
            )
        } else {
            (
                grid.average_power(TurbineRole::Test, ControlMode::Baseline),
                grid.average_power(TurbineRole::Test, ControlMode::Controlled),
                grid.num_observations(TurbineRole::Test, ControlMode::Controlled)
                    + grid.num_observations(TurbineRole::Test, ControlMode::Baseline),
            )
        };
        let change_in_power_ratio = power_ratio_control - power_ratio_baseline;
        metrics.push(BinMetrics {
            key: *key,
            direction_bin: key.direction_lower(&aggregate.direction),
            speed_bin: key.speed_lower(&aggregate.speed),
            cells: *grid,
            power_ratio_baseline,
            power_ratio_control,
            change_in_power_ratio,
            percent_power_gain: change_in_power_ratio / power_ratio_control,
            total_num_obvs,
            freq: f64::NAN,
        });
    }

    let total: u64 = metrics.iter().map(|m| m.total_num_obvs).sum();
    for metric in &mut metrics {
        metric.freq = metric.total_num_obvs as f64 / total as f64;
    }
    metrics
}

/// Export the per-bin metric table as a `DataFrame`.
pub fn metrics_dataframe(metrics: &[BinMetrics], step_vars: &[StepVar]) -> Result<DataFrame> {
    let mut columns: Vec<Series> = Vec::new();
    for var in step_vars {
        let lowers: Vec<Option<f64>> = metrics
            .iter()
            .map(|m| match var {
                StepVar::Direction => m.direction_bin,
                StepVar::Speed => m.speed_bin,
            })
            .collect();
        columns.push(Series::new(bin_column(*var), lowers));
    }
    columns.push(Series::new(
        "power_ratio_baseline",
        metrics.iter().map(|m| m.power_ratio_baseline).collect::<Vec<f64>>(),
    ));
    columns.push(Series::new(
        "power_ratio_control",
        metrics.iter().map(|m| m.power_ratio_control).collect::<Vec<f64>>(),
    ));
    columns.push(Series::new(
        "total_num_obvs",
        metrics.iter().map(|m| m.total_num_obvs as i64).collect::<Vec<i64>>(),
    ));
    columns.push(Series::new(
        "freq",
        metrics.iter().map(|m| m.freq).collect::<Vec<f64>>(),
    ));
    columns.push(Series::new(
        "change_in_power_ratio",
        metrics.iter().map(|m| m.change_in_power_ratio).collect::<Vec<f64>>(),
    ));
    columns.push(Series::new(
        "percent_power_gain",
        metrics.iter().map(|m| m.percent_power_gain).collect::<Vec<f64>>(),
    ));
    DataFrame::new(columns).context("assembling per-bin metric table")
}

/// Per-bin AEP-gain contribution.
#[derive(Debug, Clone)]
pub struct AepContribution {
    pub key: BinKey,
    pub direction_bin: Option<f64>,
    pub speed_bin: Option<f64>,
    pub aep_gain_contribution: f64,
}

/// Annotated AEP-gain result: the per-bin contributions plus the scalar.
#[derive(Debug, Clone)]
pub struct AepGain {
    /// Formula actually applied, after any fallback.
    pub method: AepMethod,
    pub absolute: bool,
    pub use_reference: bool,
    /// Scale actually applied: the configured hours when absolute, 100
    /// otherwise so the result reads as a percentage share.
    pub hours: f64,
    pub contributions: Vec<AepContribution>,
    pub aep_gain: f64,
}

/// Aggregate AEP gain across bins, weighting per-bin ratio changes by each
/// bin's empirical frequency.
///
/// Method one weights the percent power gain by baseline test power
/// (or, without reference turbines, uses the raw ratio change). Method two
/// weights the ratio change by the pooled, count-weighted reference power
/// across both modes; it falls back to method one when `use_reference` is
/// false, where the two formulas coincide. When not `absolute`, the
/// contributions are normalized to a dimensionless share and `hours` is
/// fixed at 100 so the scalar reads as a percentage.
pub fn aep_gain(
    metrics: &[BinMetrics],
    hours: f64,
    method: AepMethod,
    absolute: bool,
    use_reference: bool,
) -> AepGain {
    let method = if !use_reference && method == AepMethod::Two {
        // Both formulas are equivalent without reference turbines.
        info!("AEP method 2 requires reference turbines; falling back to method 1");
        AepMethod::One
    } else {
        method
    };

    let mut contributions: Vec<f64> = Vec::with_capacity(metrics.len());
    let mut denom_terms: Vec<f64> = Vec::with_capacity(metrics.len());

    match method {
        AepMethod::One => {
            for m in metrics {
                let baseline_test_power =
                    m.cells.average_power(TurbineRole::Test, ControlMode::Baseline);
                let contribution = if use_reference {
                    baseline_test_power * m.percent_power_gain * m.freq
                } else {
                    m.change_in_power_ratio * m.freq
                };
                contributions.push(contribution);
                denom_terms.push(baseline_test_power * m.freq);
            }
        }
        AepMethod::Two => {
            for m in metrics {
                // Pooled reference power across both modes, weighted by
                // observation counts.
                let sum_ref = nan_sum([
                    m.cells.average_power(TurbineRole::Reference, ControlMode::Baseline)
                        * m.cells.num_observations(TurbineRole::Reference, ControlMode::Baseline)
                            as f64,
                    m.cells.average_power(TurbineRole::Reference, ControlMode::Controlled)
                        * m.cells
                            .num_observations(TurbineRole::Reference, ControlMode::Controlled)
                            as f64,
                ]);
                let num_ref = m.cells.num_observations(TurbineRole::Reference, ControlMode::Baseline)
                    + m.cells
                        .num_observations(TurbineRole::Reference, ControlMode::Controlled);
                let avg_ref_power = sum_ref / num_ref as f64;
                contributions.push(avg_ref_power * m.change_in_power_ratio * m.freq);
                denom_terms.push(avg_ref_power * m.power_ratio_baseline * m.freq);
            }
        }
    }

    let hours = if absolute {
        hours
    } else {
        // Not really hours: fixes the scale so shares read as percentages.
        let denom = nan_sum(denom_terms.iter().copied());
        for contribution in &mut contributions {
            *contribution *= 1.0 / denom;
        }
        100.0
    };

    let aep = hours * nan_sum(contributions.iter().copied());
    AepGain {
        method,
        absolute,
        use_reference,
        hours,
        contributions: metrics
            .iter()
            .zip(contributions)
            .map(|(m, contribution)| AepContribution {
                key: m.key,
                direction_bin: m.direction_bin,
                speed_bin: m.speed_bin,
                aep_gain_contribution: contribution,
            })
            .collect(),
        aep_gain: aep,
    }
}
