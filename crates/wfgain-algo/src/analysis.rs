//! The analysis facade tying the pipeline together.
//!
//! [`GainAnalysis`] owns a copy of the observation table and a validated
//! configuration, and exposes the scalar metrics, the binned metric table,
//! the AEP gain, and the bootstrap estimate as methods. Everything here
//! delegates to the pipeline modules; the facade's own job is validation
//! and supplying configuration defaults (full wind-condition ranges for
//! the scalar metrics, configured bins for the tabular path).

use anyhow::Result;
use polars::prelude::*;
use tracing::info;
use wfgain_core::{
    turbine_ids, AnalysisConfig, ConfigError, ControlMode, ModeFilter, StepVar,
};

use crate::aggregate::{aggregate_wide, RoleAggregate};
use crate::binning::assign_bins;
use crate::bootstrap::{estimate, BootstrapEstimate, BootstrapOptions};
use crate::metrics::{
    self, aep_gain, compute_all, metrics_dataframe, AepGain, BinMetrics, MetricValue,
};

/// A gain analysis bound to one observation table.
#[derive(Debug, Clone)]
pub struct GainAnalysis {
    df: DataFrame,
    config: AnalysisConfig,
    wd_col: String,
    ws_col: String,
    all_turbines: Vec<usize>,
}

impl GainAnalysis {
    /// Bind a configuration to an observation table. The table is copied;
    /// the caller's frame is never mutated by any analysis method.
    ///
    /// Fails when the configuration is invalid, when a role names a
    /// turbine with no power column, or when the wind columns are missing.
    pub fn new(
        df: &DataFrame,
        wd_col: impl Into<String>,
        ws_col: impl Into<String>,
        config: AnalysisConfig,
    ) -> Result<Self> {
        let wd_col = wd_col.into();
        let ws_col = ws_col.into();
        config.validate()?;
        df.column(&wd_col)?;
        df.column(&ws_col)?;

        let all_turbines = turbine_ids(&df.get_column_names());
        for &turbine in config.roles.test.iter().chain(&config.roles.reference) {
            if !all_turbines.contains(&turbine) {
                return Err(ConfigError::UnknownTurbine(turbine).into());
            }
        }

        info!(
            rows = df.height(),
            turbines = all_turbines.len(),
            test = config.roles.test.len(),
            reference = config.roles.reference.len(),
            "bound gain analysis to observation table"
        );
        Ok(Self {
            df: df.clone(),
            config,
            wd_col,
            ws_col,
            all_turbines,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Every turbine id with a power column in the table, whether or not
    /// it is assigned a role.
    pub fn all_turbines(&self) -> &[usize] {
        &self.all_turbines
    }

    /// Reassign the test turbines, revalidating the role sets.
    pub fn set_test_turbines(&mut self, turbines: Vec<usize>) -> Result<(), ConfigError> {
        let previous = std::mem::replace(&mut self.config.roles.test, turbines);
        if let Err(err) = self.validate_roles() {
            self.config.roles.test = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Reassign the reference turbines, revalidating the role sets.
    pub fn set_reference_turbines(&mut self, turbines: Vec<usize>) -> Result<(), ConfigError> {
        let previous = std::mem::replace(&mut self.config.roles.reference, turbines);
        if let Err(err) = self.validate_roles() {
            self.config.roles.reference = previous;
            return Err(err);
        }
        Ok(())
    }

    fn validate_roles(&self) -> Result<(), ConfigError> {
        self.config.roles.validate(self.config.use_reference)?;
        for &turbine in self
            .config
            .roles
            .test
            .iter()
            .chain(&self.config.roles.reference)
        {
            if !self.all_turbines.contains(&turbine) {
                return Err(ConfigError::UnknownTurbine(turbine));
            }
        }
        Ok(())
    }

    fn range_or_full(&self, var: StepVar, range: Option<(f64, f64)>) -> (f64, f64) {
        range.unwrap_or_else(|| self.config.full_range(var))
    }

    /// Mean power across `turbines` for a wind-condition window and mode
    /// filter. `None` ranges default to the configured full range.
    pub fn average_power(
        &self,
        turbines: &[usize],
        mode: ModeFilter,
        direction_bin: Option<(f64, f64)>,
        speed_bin: Option<(f64, f64)>,
    ) -> Result<MetricValue> {
        metrics::average_power(
            &self.df,
            &self.wd_col,
            &self.ws_col,
            self.range_or_full(StepVar::Direction, direction_bin),
            self.range_or_full(StepVar::Speed, speed_bin),
            turbines,
            mode,
        )
    }

    /// Test-over-reference power ratio for one control mode.
    pub fn power_ratio(
        &self,
        mode: ControlMode,
        direction_bin: Option<(f64, f64)>,
        speed_bin: Option<(f64, f64)>,
    ) -> Result<MetricValue> {
        metrics::power_ratio(
            &self.df,
            &self.wd_col,
            &self.ws_col,
            self.range_or_full(StepVar::Direction, direction_bin),
            self.range_or_full(StepVar::Speed, speed_bin),
            &self.config.roles,
            mode,
            self.config.use_reference,
        )
    }

    /// Controlled-minus-baseline change in power ratio.
    pub fn change_in_power_ratio(
        &self,
        direction_bin: Option<(f64, f64)>,
        speed_bin: Option<(f64, f64)>,
    ) -> Result<MetricValue> {
        metrics::change_in_power_ratio(
            &self.df,
            &self.wd_col,
            &self.ws_col,
            self.range_or_full(StepVar::Direction, direction_bin),
            self.range_or_full(StepVar::Speed, speed_bin),
            &self.config.roles,
            self.config.use_reference,
        )
    }

    /// Relative gain of the controlled ratio over the baseline ratio.
    pub fn percent_power_gain(
        &self,
        direction_bin: Option<(f64, f64)>,
        speed_bin: Option<(f64, f64)>,
    ) -> Result<MetricValue> {
        metrics::percent_power_gain(
            &self.df,
            &self.wd_col,
            &self.ws_col,
            self.range_or_full(StepVar::Direction, direction_bin),
            self.range_or_full(StepVar::Speed, speed_bin),
            &self.config.roles,
            self.config.use_reference,
        )
    }

    /// The filtered observation table with bin-label columns attached.
    pub fn binned(&self) -> Result<DataFrame> {
        assign_bins(
            &self.df,
            &self.wd_col,
            &self.ws_col,
            &self.config.wind_direction,
            &self.config.wind_speed,
            &self.config.step_vars,
        )
    }

    /// Per-bin `{role, mode}` power averages and counts.
    pub fn aggregate(&self) -> Result<RoleAggregate> {
        aggregate_wide(
            &self.binned()?,
            &self.config.roles,
            &self.config.wind_direction,
            &self.config.wind_speed,
            &self.config.step_vars,
        )
    }

    /// The full per-bin metric table.
    pub fn compute_all(&self) -> Result<Vec<BinMetrics>> {
        Ok(compute_all(&self.aggregate()?, self.config.use_reference))
    }

    /// [`GainAnalysis::compute_all`] exported as a `DataFrame`.
    pub fn metrics_table(&self) -> Result<DataFrame> {
        metrics_dataframe(&self.compute_all()?, &self.config.step_vars)
    }

    /// AEP gain under the configured method, absolute flag, and hours.
    pub fn aep_gain(&self) -> Result<AepGain> {
        Ok(aep_gain(
            &self.compute_all()?,
            self.config.hours,
            self.config.aep_method,
            self.config.absolute,
            self.config.use_reference,
        ))
    }

    /// Bootstrap the sampling distributions of the per-bin metrics and
    /// every AEP-gain variant.
    pub fn bootstrap(&self, options: &BootstrapOptions) -> Result<BootstrapEstimate> {
        estimate(&self.df, &self.wd_col, &self.ws_col, &self.config, options)
    }
}
