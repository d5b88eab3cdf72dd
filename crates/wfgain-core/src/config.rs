//! Analysis configuration.

use serde::{Deserialize, Serialize};

use crate::bins::{BinSpec, StepVar};
use crate::error::ConfigError;
use crate::roles::TurbineRoles;

/// Which AEP-gain weighting formula to use.
///
/// Method two pools reference-turbine power across both control modes and
/// weights the change in power ratio by it; it is only meaningful when
/// reference turbines are in play and explicitly falls back to method one
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AepMethod {
    One,
    Two,
}

impl AepMethod {
    pub fn as_index(&self) -> i64 {
        match self {
            AepMethod::One => 1,
            AepMethod::Two => 2,
        }
    }
}

/// Full configuration for a gain analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Turbine-role assignment.
    pub roles: TurbineRoles,
    /// Compare test turbines against reference turbines (`true`) or against
    /// themselves across control modes (`false`).
    pub use_reference: bool,
    /// Wind-direction bin specification, degrees.
    pub wind_direction: BinSpec,
    /// Wind-speed bin specification, m/s.
    pub wind_speed: BinSpec,
    /// Which wind-condition dimensions to step over.
    pub step_vars: Vec<StepVar>,
    /// AEP weighting formula.
    pub aep_method: AepMethod,
    /// Report AEP gain as an energy quantity (`true`) or as a normalized
    /// percentage share (`false`).
    pub absolute: bool,
    /// Hours per year for absolute AEP. Ignored when `absolute` is false,
    /// where the scale is fixed at 100 so results read as percentages.
    pub hours: f64,
}

impl AnalysisConfig {
    pub fn new(roles: TurbineRoles) -> Self {
        Self {
            roles,
            use_reference: true,
            wind_direction: BinSpec::new(0.0, 360.0, 1.0),
            wind_speed: BinSpec::new(0.0, 20.0, 1.0),
            step_vars: vec![StepVar::Direction, StepVar::Speed],
            aep_method: AepMethod::One,
            absolute: false,
            hours: 8760.0,
        }
    }

    pub fn with_use_reference(mut self, use_reference: bool) -> Self {
        self.use_reference = use_reference;
        self
    }

    pub fn with_wind_direction(mut self, spec: BinSpec) -> Self {
        self.wind_direction = spec;
        self
    }

    pub fn with_wind_speed(mut self, spec: BinSpec) -> Self {
        self.wind_speed = spec;
        self
    }

    pub fn with_step_vars(mut self, step_vars: Vec<StepVar>) -> Self {
        self.step_vars = step_vars;
        self
    }

    pub fn with_aep_method(mut self, method: AepMethod) -> Self {
        self.aep_method = method;
        self
    }

    pub fn with_absolute(mut self, absolute: bool) -> Self {
        self.absolute = absolute;
        self
    }

    pub fn with_hours(mut self, hours: f64) -> Self {
        self.hours = hours;
        self
    }

    /// Validate every precondition the numeric pipeline assumes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.roles.validate(self.use_reference)?;
        self.wind_direction.validate()?;
        self.wind_speed.validate()?;
        if self.step_vars.is_empty() {
            return Err(ConfigError::NoStepVars);
        }
        Ok(())
    }

    pub fn steps_over(&self, var: StepVar) -> bool {
        self.step_vars.contains(&var)
    }

    /// Full bin range of one dimension as a `(lower, upper)` pair, used as
    /// the default bin for the scalar metric functions.
    pub fn full_range(&self, var: StepVar) -> (f64, f64) {
        let spec = match var {
            StepVar::Direction => &self.wind_direction,
            StepVar::Speed => &self.wind_speed,
        };
        (spec.lower_bound, spec.upper_bound)
    }
}
