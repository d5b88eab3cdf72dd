//! Observation-table column conventions.

use crate::error::ConfigError;

/// Timestamp column of the observation table.
pub const TIME_COL: &str = "time";

/// Control-mode label column of the observation table.
pub const CONTROL_MODE_COL: &str = "control_mode";

/// Power column name for a turbine id, e.g. `pow_007`.
///
/// Ids are zero-padded to exactly three digits, which caps the supported
/// turbine count at 1000.
pub fn power_column(turbine: usize) -> Result<String, ConfigError> {
    if turbine > 999 {
        return Err(ConfigError::TurbineIdTooLarge(turbine));
    }
    Ok(format!("pow_{turbine:03}"))
}

/// Parse the turbine id out of a power column name. Returns `None` for
/// columns that are not `pow_` followed by digits.
pub fn parse_power_column(name: &str) -> Option<usize> {
    let digits = name.strip_prefix("pow_")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Turbine ids derived from every power column in a table's column list.
pub fn turbine_ids<S: AsRef<str>>(column_names: &[S]) -> Vec<usize> {
    column_names
        .iter()
        .filter_map(|name| parse_power_column(name.as_ref()))
        .collect()
}
