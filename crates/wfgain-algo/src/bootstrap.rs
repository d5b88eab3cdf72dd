//! Bootstrap uncertainty quantification for the gain metrics.
//!
//! Each replicate resamples the observation table rows with replacement
//! and runs the full pipeline (bin, aggregate, derive metrics) on the
//! resampled table. Per-bin percent power gain and change in power ratio
//! are summarized across replicates, as is the AEP gain under every
//! combination of weighting method, absolute flag, and reference usage —
//! one resampling pass prices all eight variants.
//!
//! A bin that a replicate never observes contributes nothing to that
//! bin's sampling distribution; the summary's `num_obvs` records how many
//! replicates produced a defined value.

use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::{Context, Result};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::debug;
use wfgain_core::{AepMethod, AnalysisConfig, BinKey, ConfigError, StepVar};

use crate::aggregate::aggregate_wide;
use crate::binning::{assign_bins, bin_column};
use crate::metrics::{aep_gain, compute_all};
use crate::resample::{pooled_sample, replicate_samples, REP_ID_COL};
use crate::stats::{summarize, DistributionSummary};

/// Bootstrap tuning knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapOptions {
    /// Number of replicates.
    pub b: usize,
    /// Fixed seed for reproducible draws; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Draw all replicates in one pooled table rather than one at a time.
    /// The statistics are identical either way; this only changes how the
    /// rows are materialized.
    pub pooled: bool,
    /// Multiplier on the standard error for the mean +/- SE interval.
    pub se_multiplier: f64,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    /// Keep the resampled tables in the result for inspection.
    pub retain_reps: bool,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            b: 1000,
            seed: None,
            pooled: true,
            se_multiplier: 2.0,
            lower_percentile: 2.5,
            upper_percentile: 97.5,
            retain_reps: false,
        }
    }
}

impl BootstrapOptions {
    pub fn with_replicates(mut self, b: usize) -> Self {
        self.b = b;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_pooled(mut self, pooled: bool) -> Self {
        self.pooled = pooled;
        self
    }

    pub fn with_se_multiplier(mut self, multiplier: f64) -> Self {
        self.se_multiplier = multiplier;
        self
    }

    pub fn with_percentiles(mut self, lower: f64, upper: f64) -> Self {
        self.lower_percentile = lower;
        self.upper_percentile = upper;
        self
    }

    pub fn with_retain_reps(mut self, retain: bool) -> Self {
        self.retain_reps = retain;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.b == 0 {
            return Err(ConfigError::ZeroReplicates);
        }
        let (lower, upper) = (self.lower_percentile, self.upper_percentile);
        if !(0.0 <= lower && lower < upper && upper <= 100.0) {
            return Err(ConfigError::BadPercentiles { lower, upper });
        }
        Ok(())
    }
}

/// One AEP-gain variant priced by the bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AepSelector {
    pub method: AepMethod,
    pub absolute: bool,
    pub use_reference: bool,
}

impl AepSelector {
    /// Every variant, in a fixed nested order: method outermost, then
    /// absolute, then reference usage.
    pub fn all() -> [AepSelector; 8] {
        let mut selectors = [AepSelector {
            method: AepMethod::One,
            absolute: false,
            use_reference: false,
        }; 8];
        let mut slot = 0;
        for method in [AepMethod::One, AepMethod::Two] {
            for absolute in [false, true] {
                for use_reference in [false, true] {
                    selectors[slot] = AepSelector {
                        method,
                        absolute,
                        use_reference,
                    };
                    slot += 1;
                }
            }
        }
        selectors
    }
}

/// Sampling-distribution summaries for one wind-condition bin.
#[derive(Debug, Clone)]
pub struct BinDistribution {
    pub key: BinKey,
    pub direction_bin: Option<f64>,
    pub speed_bin: Option<f64>,
    pub percent_power_gain: DistributionSummary,
    pub change_in_power_ratio: DistributionSummary,
}

/// Sampling-distribution summary for one AEP-gain variant.
#[derive(Debug, Clone)]
pub struct AepDistribution {
    pub selector: AepSelector,
    pub summary: DistributionSummary,
}

/// Full bootstrap output: per-bin and per-variant summaries plus the raw
/// sampling distributions as tables, keyed by replicate id.
#[derive(Debug, Clone)]
pub struct BootstrapEstimate {
    pub bins: Vec<BinDistribution>,
    pub aep: Vec<AepDistribution>,
    pub percent_power_gain_samples: DataFrame,
    pub change_in_power_ratio_samples: DataFrame,
    pub aep_gain_samples: DataFrame,
    /// The resampled tables, when retained.
    pub replicates: Option<Vec<DataFrame>>,
}

struct BinOutcome {
    key: BinKey,
    direction_bin: Option<f64>,
    speed_bin: Option<f64>,
    percent_power_gain: f64,
    change_in_power_ratio: f64,
}

/// Everything one replicate contributes.
struct RepOutcome {
    bins: Vec<BinOutcome>,
    /// AEP gain per selector, aligned with [`AepSelector::all`].
    aep: [f64; 8],
}

fn replicate_outcome(
    replicate: &DataFrame,
    wd_col: &str,
    ws_col: &str,
    config: &AnalysisConfig,
) -> Result<RepOutcome> {
    let binned = assign_bins(
        replicate,
        wd_col,
        ws_col,
        &config.wind_direction,
        &config.wind_speed,
        &config.step_vars,
    )?;
    let aggregate = aggregate_wide(
        &binned,
        &config.roles,
        &config.wind_direction,
        &config.wind_speed,
        &config.step_vars,
    )?;
    let metrics = compute_all(&aggregate, config.use_reference);

    let selectors = AepSelector::all();
    let mut aep = [f64::NAN; 8];
    for (slot, selector) in selectors.iter().enumerate() {
        aep[slot] = aep_gain(
            &metrics,
            config.hours,
            selector.method,
            selector.absolute,
            selector.use_reference,
        )
        .aep_gain;
    }

    Ok(RepOutcome {
        bins: metrics
            .into_iter()
            .map(|m| BinOutcome {
                key: m.key,
                direction_bin: m.direction_bin,
                speed_bin: m.speed_bin,
                percent_power_gain: m.percent_power_gain,
                change_in_power_ratio: m.change_in_power_ratio,
            })
            .collect(),
        aep,
    })
}

/// Run the bootstrap: draw replicates of `df`, evaluate the gain pipeline
/// on each, and summarize the sampling distributions.
pub fn estimate(
    df: &DataFrame,
    wd_col: &str,
    ws_col: &str,
    config: &AnalysisConfig,
    options: &BootstrapOptions,
) -> Result<BootstrapEstimate> {
    config.validate()?;
    options.validate()?;

    let replicates: Vec<DataFrame> = if options.pooled {
        let pooled = pooled_sample(df, options.b, options.seed)?;
        let n = df.height();
        (0..options.b)
            .map(|rep| {
                pooled
                    .slice((rep * n) as i64, n)
                    .drop(REP_ID_COL)
                    .context("splitting pooled sample into replicates")
            })
            .collect::<Result<_>>()?
    } else {
        replicate_samples(df, options.b, options.seed)?
    };

    estimate_from_replicates(&replicates, wd_col, ws_col, config, options)
}

/// Summarize already-drawn replicates. [`estimate`] is the usual entry
/// point; this exists for callers that construct replicates themselves.
pub fn estimate_from_replicates(
    replicates: &[DataFrame],
    wd_col: &str,
    ws_col: &str,
    config: &AnalysisConfig,
    options: &BootstrapOptions,
) -> Result<BootstrapEstimate> {
    let start = Instant::now();
    let outcomes: Vec<RepOutcome> = replicates
        .par_iter()
        .map(|replicate| replicate_outcome(replicate, wd_col, ws_col, config))
        .collect::<Result<_>>()?;
    let num_reps = outcomes.len() as u64;

    // Gather per-bin replicate values in canonical bin order.
    type BinSamples = (Option<f64>, Option<f64>, Vec<f64>, Vec<f64>);
    let mut by_bin: BTreeMap<BinKey, BinSamples> = BTreeMap::new();
    for outcome in &outcomes {
        for bin in &outcome.bins {
            let entry = by_bin.entry(bin.key).or_insert_with(|| {
                (bin.direction_bin, bin.speed_bin, Vec::new(), Vec::new())
            });
            entry.2.push(bin.percent_power_gain);
            entry.3.push(bin.change_in_power_ratio);
        }
    }

    let bins: Vec<BinDistribution> = by_bin
        .iter()
        .map(|(key, (direction_bin, speed_bin, gains, changes))| BinDistribution {
            key: *key,
            direction_bin: *direction_bin,
            speed_bin: *speed_bin,
            percent_power_gain: summarize(
                gains,
                options.se_multiplier,
                options.lower_percentile,
                options.upper_percentile,
                num_reps,
            ),
            change_in_power_ratio: summarize(
                changes,
                options.se_multiplier,
                options.lower_percentile,
                options.upper_percentile,
                num_reps,
            ),
        })
        .collect();

    let selectors = AepSelector::all();
    let aep: Vec<AepDistribution> = selectors
        .iter()
        .enumerate()
        .map(|(slot, selector)| {
            let values: Vec<f64> = outcomes.iter().map(|o| o.aep[slot]).collect();
            AepDistribution {
                selector: *selector,
                summary: summarize(
                    &values,
                    options.se_multiplier,
                    options.lower_percentile,
                    options.upper_percentile,
                    num_reps,
                ),
            }
        })
        .collect();

    let (percent_power_gain_samples, change_in_power_ratio_samples) =
        bin_sample_frames(&outcomes, &config.step_vars)?;
    let aep_gain_samples = aep_sample_frame(&outcomes, &selectors)?;

    debug!(
        replicates = replicates.len(),
        bins = bins.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "summarized bootstrap sampling distributions"
    );

    Ok(BootstrapEstimate {
        bins,
        aep,
        percent_power_gain_samples,
        change_in_power_ratio_samples,
        aep_gain_samples,
        replicates: options.retain_reps.then(|| replicates.to_vec()),
    })
}

/// Long tables of the per-bin replicate values, one row per
/// (bin, replicate) with a defined pipeline output.
fn bin_sample_frames(
    outcomes: &[RepOutcome],
    step_vars: &[StepVar],
) -> Result<(DataFrame, DataFrame)> {
    let mut direction_bins: Vec<Option<f64>> = Vec::new();
    let mut speed_bins: Vec<Option<f64>> = Vec::new();
    let mut gains: Vec<f64> = Vec::new();
    let mut changes: Vec<f64> = Vec::new();
    let mut rep_ids: Vec<i64> = Vec::new();

    for (rep, outcome) in outcomes.iter().enumerate() {
        for bin in &outcome.bins {
            direction_bins.push(bin.direction_bin);
            speed_bins.push(bin.speed_bin);
            gains.push(bin.percent_power_gain);
            changes.push(bin.change_in_power_ratio);
            rep_ids.push(rep as i64);
        }
    }

    let mut bin_columns: Vec<Series> = Vec::new();
    for var in step_vars {
        let lowers = match var {
            StepVar::Direction => &direction_bins,
            StepVar::Speed => &speed_bins,
        };
        bin_columns.push(Series::new(bin_column(*var), lowers.clone()));
    }

    let mut gain_columns = bin_columns.clone();
    gain_columns.push(Series::new("percent_power_gain", gains));
    gain_columns.push(Series::new(REP_ID_COL, rep_ids.clone()));
    let gain_frame =
        DataFrame::new(gain_columns).context("assembling percent-power-gain samples")?;

    let mut change_columns = bin_columns;
    change_columns.push(Series::new("change_in_power_ratio", changes));
    change_columns.push(Series::new(REP_ID_COL, rep_ids));
    let change_frame =
        DataFrame::new(change_columns).context("assembling change-in-power-ratio samples")?;

    Ok((gain_frame, change_frame))
}

/// Long table of AEP-gain replicate values across every variant.
fn aep_sample_frame(outcomes: &[RepOutcome], selectors: &[AepSelector; 8]) -> Result<DataFrame> {
    let rows = outcomes.len() * selectors.len();
    let mut methods: Vec<i64> = Vec::with_capacity(rows);
    let mut absolutes: Vec<bool> = Vec::with_capacity(rows);
    let mut references: Vec<bool> = Vec::with_capacity(rows);
    let mut values: Vec<f64> = Vec::with_capacity(rows);
    let mut rep_ids: Vec<i64> = Vec::with_capacity(rows);

    for (rep, outcome) in outcomes.iter().enumerate() {
        for (slot, selector) in selectors.iter().enumerate() {
            methods.push(selector.method.as_index());
            absolutes.push(selector.absolute);
            references.push(selector.use_reference);
            values.push(outcome.aep[slot]);
            rep_ids.push(rep as i64);
        }
    }

    DataFrame::new(vec![
        Series::new("aep_method", methods),
        Series::new("absolute", absolutes),
        Series::new("use_reference", references),
        Series::new("aep_gain", values),
        Series::new(REP_ID_COL, rep_ids),
    ])
    .context("assembling AEP-gain samples")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfgain_core::TurbineRoles;

    /// Two interchangeable rows per control mode, so every replicate that
    /// observes both modes reproduces the same metric values exactly.
    fn scenario_frame() -> DataFrame {
        df![
            "time" => &[0i64, 1, 2, 3],
            "pow_001" => &[100.0, 100.0, 100.0, 100.0],
            "pow_002" => &[90.0, 100.0, 90.0, 100.0],
            "wd" => &[10.0, 10.0, 10.0, 10.0],
            "ws" => &[5.0, 5.0, 5.0, 5.0],
            "control_mode" => &["baseline", "controlled", "baseline", "controlled"],
        ]
        .unwrap()
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig::new(TurbineRoles::new(vec![2], vec![1]))
            .with_wind_direction(wfgain_core::BinSpec::new(0.0, 360.0, 10.0))
            .with_wind_speed(wfgain_core::BinSpec::new(0.0, 20.0, 5.0))
    }

    #[test]
    fn options_validate_percentiles_and_replicates() {
        assert!(BootstrapOptions::default().validate().is_ok());
        assert!(BootstrapOptions::default()
            .with_replicates(0)
            .validate()
            .is_err());
        assert!(BootstrapOptions::default()
            .with_percentiles(97.5, 2.5)
            .validate()
            .is_err());
    }

    #[test]
    fn selectors_cover_every_variant_in_nested_order() {
        let selectors = AepSelector::all();
        assert_eq!(selectors.len(), 8);
        assert_eq!(
            selectors[0],
            AepSelector {
                method: AepMethod::One,
                absolute: false,
                use_reference: false
            }
        );
        assert_eq!(
            selectors[7],
            AepSelector {
                method: AepMethod::Two,
                absolute: true,
                use_reference: true
            }
        );
        // Reference usage toggles fastest.
        assert!(selectors[1].use_reference);
        assert!(!selectors[1].absolute);
    }

    #[test]
    fn degenerate_scenario_concentrates_at_the_point_estimate() {
        let df = scenario_frame();
        let options = BootstrapOptions::default()
            .with_replicates(64)
            .with_seed(17);
        let estimate = estimate(&df, "wd", "ws", &config(), &options).unwrap();

        assert_eq!(estimate.bins.len(), 1);
        let bin = &estimate.bins[0];
        // Every replicate that observes both modes lands exactly on the
        // point estimate, so the mean matches it and the spread is zero.
        assert!((bin.percent_power_gain.mean - 0.1).abs() < 1e-12);
        assert!(bin.percent_power_gain.se.abs() < 1e-12);
        assert!((bin.change_in_power_ratio.mean - 0.1).abs() < 1e-12);
        assert_eq!(bin.percent_power_gain.num_reps, 64);
        assert!(bin.percent_power_gain.num_obvs <= 64);

        assert_eq!(estimate.aep.len(), 8);
        for aep in &estimate.aep {
            assert!(aep.summary.num_obvs > 0);
        }
    }

    #[test]
    fn pooled_and_looped_draws_agree() {
        let df = scenario_frame();
        let base = BootstrapOptions::default().with_replicates(16).with_seed(5);
        let pooled = estimate(&df, "wd", "ws", &config(), &base.clone().with_pooled(true)).unwrap();
        let looped = estimate(&df, "wd", "ws", &config(), &base.with_pooled(false)).unwrap();

        let a = pooled.aep_gain_samples.column("aep_gain").unwrap().f64().unwrap();
        let b = looped.aep_gain_samples.column("aep_gain").unwrap().f64().unwrap();
        for idx in 0..a.len() {
            match (a.get(idx), b.get(idx)) {
                (Some(x), Some(y)) if x.is_nan() && y.is_nan() => {}
                (x, y) => assert_eq!(x, y, "row {idx} differs"),
            }
        }
    }

    #[test]
    fn same_seed_reproduces_the_estimate() {
        let df = scenario_frame();
        let options = BootstrapOptions::default().with_replicates(8).with_seed(3);
        let a = estimate(&df, "wd", "ws", &config(), &options).unwrap();
        let b = estimate(&df, "wd", "ws", &config(), &options).unwrap();
        assert_eq!(a.bins[0].percent_power_gain, b.bins[0].percent_power_gain);
    }

    #[test]
    fn sample_frames_have_expected_schema() {
        let df = scenario_frame();
        let options = BootstrapOptions::default().with_replicates(1).with_seed(2);
        let estimate = estimate(&df, "wd", "ws", &config(), &options).unwrap();

        assert_eq!(
            estimate.percent_power_gain_samples.get_column_names(),
            &["direction_bin", "speed_bin", "percent_power_gain", "rep_id"]
        );
        assert_eq!(
            estimate.change_in_power_ratio_samples.get_column_names(),
            &["direction_bin", "speed_bin", "change_in_power_ratio", "rep_id"]
        );
        assert_eq!(
            estimate.aep_gain_samples.get_column_names(),
            &["aep_method", "absolute", "use_reference", "aep_gain", "rep_id"]
        );
        assert_eq!(estimate.aep_gain_samples.height(), 8);
    }

    #[test]
    fn retained_replicates_match_the_input_shape() {
        let df = scenario_frame();
        let options = BootstrapOptions::default()
            .with_replicates(3)
            .with_seed(11)
            .with_retain_reps(true);
        let estimate = estimate(&df, "wd", "ws", &config(), &options).unwrap();
        let replicates = estimate.replicates.expect("replicates were retained");
        assert_eq!(replicates.len(), 3);
        for replicate in &replicates {
            assert_eq!(replicate.height(), df.height());
            assert!(replicate.column(REP_ID_COL).is_err());
        }
    }
}
