//! Turbine roles and control modes.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which comparison group a turbine belongs to.
///
/// Test turbines are the ones whose output is attributed to the control
/// strategy; reference turbines are an unaffected comparison baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurbineRole {
    Test,
    Reference,
}

impl TurbineRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurbineRole::Test => "test",
            TurbineRole::Reference => "reference",
        }
    }
}

/// Operating regime of the farm at a given timestamp: standard yaw control
/// (`baseline`) or the control strategy under evaluation (`controlled`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Baseline,
    Controlled,
}

impl ControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::Baseline => "baseline",
            ControlMode::Controlled => "controlled",
        }
    }

    /// Parse a control-mode label from the observation table. Unrecognized
    /// labels yield `None` and the row is excluded from mode-keyed groups.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "baseline" => Some(ControlMode::Baseline),
            "controlled" => Some(ControlMode::Controlled),
            _ => None,
        }
    }
}

/// Row filter for the scalar metric functions: a single mode, or both
/// modes pooled together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeFilter {
    Baseline,
    Controlled,
    Both,
}

impl ModeFilter {
    /// Whether a row carrying `label` passes this filter. `Both` admits
    /// every row regardless of its label.
    pub fn admits(&self, label: &str) -> bool {
        match self {
            ModeFilter::Both => true,
            ModeFilter::Baseline => label == "baseline",
            ModeFilter::Controlled => label == "controlled",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModeFilter::Baseline => "baseline",
            ModeFilter::Controlled => "controlled",
            ModeFilter::Both => "both",
        }
    }
}

impl From<ControlMode> for ModeFilter {
    fn from(mode: ControlMode) -> Self {
        match mode {
            ControlMode::Baseline => ModeFilter::Baseline,
            ControlMode::Controlled => ModeFilter::Controlled,
        }
    }
}

/// Explicit turbine-role assignment. Turbines appearing in neither set are
/// excluded from aggregation entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurbineRoles {
    pub test: Vec<usize>,
    pub reference: Vec<usize>,
}

impl TurbineRoles {
    pub fn new(test: Vec<usize>, reference: Vec<usize>) -> Self {
        Self { test, reference }
    }

    pub fn role_of(&self, turbine: usize) -> Option<TurbineRole> {
        if self.test.contains(&turbine) {
            Some(TurbineRole::Test)
        } else if self.reference.contains(&turbine) {
            Some(TurbineRole::Reference)
        } else {
            None
        }
    }

    /// All selected turbines, reference set first. This is the column
    /// order the aggregation stage walks.
    pub fn selected(&self) -> Vec<usize> {
        let mut ids = self.reference.clone();
        ids.extend_from_slice(&self.test);
        ids
    }

    /// Precondition check: the sets must be disjoint and the test set
    /// non-empty; the reference set may be empty only when the analysis
    /// does not compare against reference turbines.
    pub fn validate(&self, use_reference: bool) -> Result<(), ConfigError> {
        let overlap: Vec<usize> = self
            .test
            .iter()
            .copied()
            .filter(|id| self.reference.contains(id))
            .collect();
        if !overlap.is_empty() {
            return Err(ConfigError::OverlappingRoles(overlap));
        }
        if self.test.is_empty() {
            return Err(ConfigError::EmptyRole { role: "test" });
        }
        if use_reference && self.reference.is_empty() {
            return Err(ConfigError::EmptyRole { role: "reference" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_lookup_prefers_membership() {
        let roles = TurbineRoles::new(vec![2, 3], vec![1]);
        assert_eq!(roles.role_of(2), Some(TurbineRole::Test));
        assert_eq!(roles.role_of(1), Some(TurbineRole::Reference));
        assert_eq!(roles.role_of(9), None);
    }

    #[test]
    fn selected_lists_reference_first() {
        let roles = TurbineRoles::new(vec![2], vec![1, 4]);
        assert_eq!(roles.selected(), vec![1, 4, 2]);
    }

    #[test]
    fn validate_rejects_overlap_and_empty_sets() {
        let overlapping = TurbineRoles::new(vec![1, 2], vec![2]);
        assert!(matches!(
            overlapping.validate(true),
            Err(ConfigError::OverlappingRoles(ids)) if ids == vec![2]
        ));

        let no_test = TurbineRoles::new(vec![], vec![1]);
        assert!(no_test.validate(false).is_err());

        let no_reference = TurbineRoles::new(vec![1], vec![]);
        assert!(no_reference.validate(true).is_err());
        assert!(no_reference.validate(false).is_ok());
    }

    #[test]
    fn mode_filter_admits_labels() {
        assert!(ModeFilter::Both.admits("baseline"));
        assert!(ModeFilter::Both.admits("anything"));
        assert!(ModeFilter::Baseline.admits("baseline"));
        assert!(!ModeFilter::Baseline.admits("controlled"));
    }
}
