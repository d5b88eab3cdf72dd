//! # wfgain-core: Wind-Farm Gain Analysis Core
//!
//! Fundamental data types for quantifying the energy-production effect of a
//! wind-farm control strategy (e.g., wake steering) by comparing test
//! turbines against reference turbines across ambient wind-condition bins.
//!
//! ## Design Philosophy
//!
//! The analysis engine (`wfgain-algo`) operates on observation tables; this
//! crate holds everything the tables are interpreted through:
//! - **Roles and modes**: [`TurbineRole`] (test vs. reference) and
//!   [`ControlMode`] (baseline vs. controlled) as enums rather than string
//!   labels, so grouped results are keyed structurally.
//! - **Bin specifications**: [`BinSpec`] half-open `[lower, upper)` ranges
//!   with a fixed width, and [`BinKey`] as the ordered per-bin coordinate.
//! - **Column conventions**: per-turbine power columns named `pow_NNN`
//!   with a zero-padded three-digit turbine id (capping supported turbine
//!   counts at 1000).
//! - **Typed missing-data signal**: [`NoObservations`] carries the
//!   bin/turbine/mode context of an empty selection and a chain of notes
//!   added by each dependent computation, replacing stringly-typed
//!   propagation while keeping a readable causal message.
//!
//! Configuration preconditions (disjoint role sets, positive bin widths,
//! sane percentile bounds) are validated fatally up front via
//! [`AnalysisConfig::validate`] instead of being re-checked inside the
//! numeric pipeline.

pub mod bins;
pub mod columns;
pub mod config;
pub mod error;
pub mod roles;

pub use bins::{BinKey, BinSpec, StepVar};
pub use columns::{parse_power_column, power_column, turbine_ids, CONTROL_MODE_COL, TIME_COL};
pub use config::{AepMethod, AnalysisConfig};
pub use error::{ConfigError, NoObservations};
pub use roles::{ControlMode, ModeFilter, TurbineRole, TurbineRoles};
