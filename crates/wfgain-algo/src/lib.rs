//! # wfgain-algo: Wind-Farm Control Gain Estimation
//!
//! This crate estimates the power gain attributable to a wind-farm control
//! strategy from an observation table, and quantifies the uncertainty of
//! that estimate with a bootstrap.
//!
//! ## Pipeline
//!
//! The tabular path runs in fixed stages, each a standalone module:
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Bin assignment | [`binning`] | Filtered table with bin-label columns |
//! | Role aggregation | [`aggregate`] | Per-bin `{role, mode}` power cells |
//! | Metric derivation | [`metrics`] | Power ratios, gain, frequency per bin |
//! | AEP weighting | [`metrics::aep_gain`] | Frequency-weighted annual gain |
//! | Bootstrap | [`bootstrap`] | Sampling-distribution summaries |
//!
//! [`GainAnalysis`] binds a configuration to one observation table and
//! exposes every stage as a method, plus the scalar metric functions that
//! operate on a single wind-condition window.
//!
//! ## Conventions
//!
//! - Power columns are named `pow_NNN` with the zero-padded turbine id;
//!   roles partition turbine ids into test and reference sets.
//! - Wind-condition bins are half-open `[lower, lower + width)`; rows
//!   outside the configured ranges are dropped before anything else runs.
//! - An empty metric selection is a value ([`MetricValue::NoData`]), not
//!   an error: it carries a note chain explaining which downstream
//!   computations became undefined.
//! - Grouped outputs are canonically ordered (bin coordinate
//!   direction-major, then role, then mode) by construction.
//!
//! ## Example
//!
//! ```ignore
//! use wfgain_algo::{BootstrapOptions, GainAnalysis};
//! use wfgain_core::{AnalysisConfig, TurbineRoles};
//!
//! let config = AnalysisConfig::new(TurbineRoles::new(vec![2], vec![1]));
//! let analysis = GainAnalysis::new(&df, "wd", "ws", config)?;
//!
//! let table = analysis.metrics_table()?;
//! let aep = analysis.aep_gain()?;
//! let uncertainty = analysis.bootstrap(&BootstrapOptions::default().with_seed(42))?;
//! ```

pub mod aggregate;
pub mod analysis;
pub mod binning;
pub mod bootstrap;
pub mod metrics;
pub mod resample;
pub mod stats;

pub use aggregate::{
    aggregate_wide, group_roles, melt_roles, CellGrid, GroupKey, PowerCell, RoleAggregate,
};
pub use analysis::GainAnalysis;
pub use binning::{assign_bins, bin_column, DIRECTION_BIN_COL, SPEED_BIN_COL};
pub use bootstrap::{
    estimate, estimate_from_replicates, AepDistribution, AepSelector, BinDistribution,
    BootstrapEstimate, BootstrapOptions,
};
pub use metrics::{
    aep_gain, average_power, change_in_power_ratio, compute_all, metrics_dataframe,
    percent_power_gain, power_ratio, AepContribution, AepGain, BinMetrics, MetricValue,
};
pub use resample::{pooled_sample, replicate_samples, REP_ID_COL};
pub use stats::{summarize, DistributionSummary};
