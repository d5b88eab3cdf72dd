//! Role aggregation: wide per-turbine power columns to per-bin averages.
//!
//! The binned table has one row per timestamp and one power column per
//! turbine. This module reshapes it to one observation per
//! (timestamp, turbine), labels each observation with its turbine role and
//! control mode, and reduces to per-group mean power and observation
//! counts. Groups with zero retained observations are simply absent from
//! the output; downstream consumers read an absent combination as NaN
//! average power with a zero count.
//!
//! Grouping accumulates into a `BTreeMap`, so every output is canonically
//! ordered by bin coordinate (direction-major), then role, then mode —
//! no defensive reordering is needed downstream.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use polars::prelude::*;
use wfgain_core::{
    power_column, BinKey, BinSpec, ControlMode, StepVar, TurbineRole, TurbineRoles,
    CONTROL_MODE_COL,
};

use crate::binning::bin_column;

/// Mean power and observation count for one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerCell {
    pub average_power: f64,
    pub num_observations: u64,
}

fn role_slot(role: TurbineRole) -> usize {
    match role {
        TurbineRole::Test => 0,
        TurbineRole::Reference => 1,
    }
}

fn mode_slot(mode: ControlMode) -> usize {
    match mode {
        ControlMode::Baseline => 0,
        ControlMode::Controlled => 1,
    }
}

/// Per-bin cells keyed by `{role, mode}`.
///
/// This replaces wide multi-level column indexing: lookups are by enum,
/// and a missing combination reads as NaN average / zero count.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CellGrid {
    cells: [[Option<PowerCell>; 2]; 2],
}

impl CellGrid {
    pub fn get(&self, role: TurbineRole, mode: ControlMode) -> Option<&PowerCell> {
        self.cells[role_slot(role)][mode_slot(mode)].as_ref()
    }

    pub fn set(&mut self, role: TurbineRole, mode: ControlMode, cell: PowerCell) {
        self.cells[role_slot(role)][mode_slot(mode)] = Some(cell);
    }

    /// Average power for a combination, NaN when it has no observations.
    pub fn average_power(&self, role: TurbineRole, mode: ControlMode) -> f64 {
        self.get(role, mode)
            .map(|cell| cell.average_power)
            .unwrap_or(f64::NAN)
    }

    /// Observation count for a combination, zero when absent.
    pub fn num_observations(&self, role: TurbineRole, mode: ControlMode) -> u64 {
        self.get(role, mode)
            .map(|cell| cell.num_observations)
            .unwrap_or(0)
    }
}

/// Grouping key for the generic grouped output. Role and mode are `None`
/// when the corresponding label was not retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub bin: BinKey,
    pub role: Option<TurbineRole>,
    pub mode: Option<ControlMode>,
}

/// Wide aggregated table: per-bin `{role, mode}` cell grids plus the bin
/// specifications needed to map bin coordinates back to lower bounds.
#[derive(Debug, Clone)]
pub struct RoleAggregate {
    pub step_vars: Vec<StepVar>,
    pub direction: BinSpec,
    pub speed: BinSpec,
    pub bins: BTreeMap<BinKey, CellGrid>,
}

/// One-row-per-(timestamp, turbine) observation used by the row walk.
struct LongRow {
    bin: BinKey,
    role: TurbineRole,
    mode: Option<ControlMode>,
    mode_label: Option<String>,
    turbine: usize,
    power: Option<f64>,
}

/// Walk the binned table in long form, invoking `visit` once per
/// (timestamp, selected turbine). Reference turbines come first, matching
/// the selected power-column order.
fn for_each_long_row(
    binned: &DataFrame,
    roles: &TurbineRoles,
    direction: &BinSpec,
    speed: &BinSpec,
    step_vars: &[StepVar],
    need_mode: bool,
    mut visit: impl FnMut(LongRow),
) -> Result<()> {
    let height = binned.height();

    // Bin coordinates per row, recovered from the bin-label columns.
    let mut bin_keys: Vec<BinKey> = vec![BinKey::default(); height];
    for var in step_vars {
        let column = bin_column(*var);
        let lowers = binned
            .column(column)
            .with_context(|| format!("binned table is missing the '{column}' column"))?
            .f64()?;
        for (idx, key) in bin_keys.iter_mut().enumerate() {
            let lower = lowers.get(idx).unwrap_or(f64::NAN);
            match var {
                StepVar::Direction => key.direction = Some(direction.index_of_lower(lower)),
                StepVar::Speed => key.speed = Some(speed.index_of_lower(lower)),
            }
        }
    }

    let mode_labels: Option<Vec<Option<String>>> = if need_mode {
        let labels = binned
            .column(CONTROL_MODE_COL)
            .context("binned table is missing the control-mode column")?
            .utf8()?;
        Some(
            (0..height)
                .map(|idx| labels.get(idx).map(|s| s.to_string()))
                .collect(),
        )
    } else {
        None
    };

    for turbine in roles.selected() {
        let role = match roles.role_of(turbine) {
            Some(role) => role,
            None => continue,
        };
        let name = power_column(turbine)?;
        let series = binned
            .column(&name)
            .with_context(|| format!("selecting power column '{name}'"))?
            .cast(&DataType::Float64)
            .with_context(|| format!("casting power column '{name}' to Float64"))?;
        let power = series.f64()?;

        for idx in 0..height {
            let mode_label = mode_labels
                .as_ref()
                .and_then(|labels| labels[idx].clone());
            let mode = mode_label.as_deref().and_then(ControlMode::parse);
            visit(LongRow {
                bin: bin_keys[idx],
                role,
                mode,
                mode_label,
                turbine,
                power: power.get(idx),
            });
        }
    }
    Ok(())
}

/// Group the binned table by bin coordinates and the retained labels,
/// computing mean and count of power with nulls skipped.
///
/// Rows with an unrecognized control-mode label are excluded from
/// mode-keyed groups.
pub fn group_roles(
    binned: &DataFrame,
    roles: &TurbineRoles,
    direction: &BinSpec,
    speed: &BinSpec,
    step_vars: &[StepVar],
    retain_control_mode: bool,
    retain_turbine_label: bool,
) -> Result<BTreeMap<GroupKey, PowerCell>> {
    let mut sums: BTreeMap<GroupKey, (f64, u64)> = BTreeMap::new();
    for_each_long_row(
        binned,
        roles,
        direction,
        speed,
        step_vars,
        retain_control_mode,
        |row| {
            let power = match row.power {
                Some(power) => power,
                None => return,
            };
            let mode = if retain_control_mode {
                match row.mode {
                    Some(mode) => Some(mode),
                    None => return,
                }
            } else {
                None
            };
            let key = GroupKey {
                bin: row.bin,
                role: retain_turbine_label.then_some(row.role),
                mode,
            };
            let entry = sums.entry(key).or_insert((0.0, 0));
            entry.0 += power;
            entry.1 += 1;
        },
    )?;

    Ok(sums
        .into_iter()
        .map(|(key, (sum, count))| {
            (
                key,
                PowerCell {
                    average_power: sum / count as f64,
                    num_observations: count,
                },
            )
        })
        .collect())
}

/// Group with both labels retained and pivot into per-bin cell grids.
/// This is the wide shape the metric calculator consumes.
pub fn aggregate_wide(
    binned: &DataFrame,
    roles: &TurbineRoles,
    direction: &BinSpec,
    speed: &BinSpec,
    step_vars: &[StepVar],
) -> Result<RoleAggregate> {
    let grouped = group_roles(binned, roles, direction, speed, step_vars, true, true)?;

    let mut bins: BTreeMap<BinKey, CellGrid> = BTreeMap::new();
    for (key, cell) in grouped {
        // Both labels were retained, so role and mode are always present.
        if let (Some(role), Some(mode)) = (key.role, key.mode) {
            bins.entry(key.bin).or_default().set(role, mode, cell);
        }
    }

    Ok(RoleAggregate {
        step_vars: step_vars.to_vec(),
        direction: *direction,
        speed: *speed,
        bins,
    })
}

/// The un-grouped long reshape: one row per (timestamp, selected turbine)
/// with bin labels, optional control mode, the turbine id, an optional
/// role label, and the power reading.
pub fn melt_roles(
    binned: &DataFrame,
    roles: &TurbineRoles,
    direction: &BinSpec,
    speed: &BinSpec,
    step_vars: &[StepVar],
    retain_control_mode: bool,
    retain_turbine_label: bool,
) -> Result<DataFrame> {
    let mut direction_bins: Vec<f64> = Vec::new();
    let mut speed_bins: Vec<f64> = Vec::new();
    let mut modes: Vec<Option<String>> = Vec::new();
    let mut turbines: Vec<i64> = Vec::new();
    let mut labels: Vec<&'static str> = Vec::new();
    let mut powers: Vec<Option<f64>> = Vec::new();

    for_each_long_row(
        binned,
        roles,
        direction,
        speed,
        step_vars,
        retain_control_mode,
        |row| {
            if let Some(index) = row.bin.direction {
                direction_bins.push(direction.lower_of(index));
            }
            if let Some(index) = row.bin.speed {
                speed_bins.push(speed.lower_of(index));
            }
            if retain_control_mode {
                modes.push(row.mode_label);
            }
            turbines.push(row.turbine as i64);
            labels.push(row.role.as_str());
            powers.push(row.power);
        },
    )?;

    let mut columns: Vec<Series> = Vec::new();
    for var in step_vars {
        match var {
            StepVar::Direction => {
                columns.push(Series::new(bin_column(*var), std::mem::take(&mut direction_bins)))
            }
            StepVar::Speed => {
                columns.push(Series::new(bin_column(*var), std::mem::take(&mut speed_bins)))
            }
        }
    }
    if retain_control_mode {
        columns.push(Series::new(CONTROL_MODE_COL, modes));
    }
    columns.push(Series::new("turbine", turbines));
    if retain_turbine_label {
        columns.push(Series::new("turbine_label", labels));
    }
    columns.push(Series::new("power", powers));

    DataFrame::new(columns).context("assembling long observation table")
}
