//! Error and missing-data signal types.

use std::fmt;

use thiserror::Error;

use crate::roles::ModeFilter;

/// Configuration precondition violations. These are caller errors and are
/// raised fatally at construction time rather than being re-checked inside
/// the numeric pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("test and reference turbine sets must be disjoint; both contain {0:?}")]
    OverlappingRoles(Vec<usize>),
    #[error("the {role} turbine set is empty")]
    EmptyRole { role: &'static str },
    #[error("turbine {0} has no matching power column in the observation table")]
    UnknownTurbine(usize),
    #[error("turbine ids must format into three digits; {0} exceeds 999")]
    TurbineIdTooLarge(usize),
    #[error("bin width must be positive, got {0}")]
    NonPositiveWidth(f64),
    #[error("bin lower bound {lower} must be below upper bound {upper}")]
    EmptyRange { lower: f64, upper: f64 },
    #[error("at least one step variable (direction or speed) must be selected")]
    NoStepVars,
    #[error("percentile bounds must satisfy 0 <= lower < upper <= 100, got {lower} and {upper}")]
    BadPercentiles { lower: f64, upper: f64 },
    #[error("bootstrap replicate count must be positive")]
    ZeroReplicates,
}

/// A filtered selection matched no rows.
///
/// This is a value, not a failure: every metric that depends on an average
/// power propagates it upward, each layer appending a note explaining which
/// computation became undefined. Callers pattern-match on the type instead
/// of string-testing, and render the full causal chain with `Display`.
#[derive(Debug, Clone, PartialEq)]
pub struct NoObservations {
    pub turbines: Vec<usize>,
    pub mode: ModeFilter,
    pub direction_bin: (f64, f64),
    pub speed_bin: (f64, f64),
    notes: Vec<String>,
}

impl NoObservations {
    pub fn new(
        turbines: Vec<usize>,
        mode: ModeFilter,
        direction_bin: (f64, f64),
        speed_bin: (f64, f64),
    ) -> Self {
        Self {
            turbines,
            mode,
            direction_bin,
            speed_bin,
            notes: Vec::new(),
        }
    }

    /// Append an explanatory note describing which dependent computation
    /// this empty selection made undefined.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}

impl fmt::Display for NoObservations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no observations for turbines {:?} in {} mode for wind directions [{}, {}) and wind speeds [{}, {})",
            self.turbines,
            self.mode.as_str(),
            self.direction_bin.0,
            self.direction_bin.1,
            self.speed_bin.0,
            self.speed_bin.1,
        )?;
        for note in &self.notes {
            write!(f, "; {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for NoObservations {}
