//! Gap filling for merged totals.
use crate::calibrate::CalibrationTable;
use crate::config::ImputationStrategy;
use crate::types::{GapReason, ObservationTable, StateYear, Totals, UnrecoverableGap};
use crate::util::{average, round2};
use tracing::debug;

/// Estimate missing yearly totals with `strategy`. Present yearly totals are
/// never touched. Returns the keys that received an estimate.
pub fn fill_yearly(
    table: &mut ObservationTable,
    calibration: &CalibrationTable,
    strategy: ImputationStrategy,
) -> Vec<StateYear> {
    let estimates: Vec<(StateYear, f64)> = match strategy {
        ImputationStrategy::RatioCalibration => ratio_estimates(table, calibration),
        ImputationStrategy::StateMean => state_mean_estimates(table),
        ImputationStrategy::LinearInterpolation => interpolation_estimates(table),
    };

    let mut filled = Vec::with_capacity(estimates.len());
    for ((state, year), value) in estimates {
        let daily_total_mm = table.get(&state, year).and_then(|t| t.daily_total_mm);
        table.upsert(
            &state,
            year,
            Totals {
                daily_total_mm,
                yearly_total_mm: Some(round2(value)),
            },
        );
        filled.push((state, year));
    }
    debug!(%strategy, filled = filled.len(), "Estimated missing yearly totals");
    filled
}

fn ratio_estimates(
    table: &ObservationTable,
    calibration: &CalibrationTable,
) -> Vec<(StateYear, f64)> {
    table
        .iter()
        .filter(|(_, t)| t.yearly_total_mm.is_none())
        .filter_map(|((state, year), t)| {
            let daily = t.daily_total_mm?;
            let ratio = calibration.ratio_for(*year)?;
            Some(((state.clone(), *year), daily * ratio))
        })
        .collect()
}

fn state_mean_estimates(table: &ObservationTable) -> Vec<(StateYear, f64)> {
    let mut out = Vec::new();
    for state in table.states() {
        let rows = table.state_rows(state);
        let present: Vec<f64> = rows.iter().filter_map(|(_, t)| t.yearly_total_mm).collect();
        let Some(mean) = average(&present) else {
            continue;
        };
        for (year, t) in &rows {
            if t.yearly_total_mm.is_none() {
                out.push(((state.to_string(), *year), mean));
            }
        }
    }
    out
}

fn interpolation_estimates(table: &ObservationTable) -> Vec<(StateYear, f64)> {
    let mut out = Vec::new();
    for state in table.states() {
        let rows = table.state_rows(state);
        let known: Vec<(i32, f64)> = rows
            .iter()
            .filter_map(|(y, t)| t.yearly_total_mm.map(|v| (*y, v)))
            .collect();
        if known.is_empty() {
            continue;
        }
        for (year, t) in &rows {
            if t.yearly_total_mm.is_some() {
                continue;
            }
            let before = known.iter().rev().find(|(y, _)| y < year);
            let after = known.iter().find(|(y, _)| y > year);
            let value = match (before, after) {
                (Some(&(y0, v0)), Some(&(y1, v1))) => {
                    let span = f64::from(y1) - f64::from(y0);
                    v0 + (v1 - v0) * (f64::from(*year) - f64::from(y0)) / span
                }
                (Some(&(_, v)), None) | (None, Some(&(_, v))) => v,
                (None, None) => continue,
            };
            out.push(((state.to_string(), *year), value));
        }
    }
    out
}

/// For regions with yearly data but no daily stations, derive the daily
/// column as `yearly / days_per_year`. Returns the keys that were filled.
pub fn estimate_daily_from_yearly(
    table: &mut ObservationTable,
    regions: &[String],
    days_per_year: f64,
) -> Vec<StateYear> {
    let mut filled = Vec::new();
    for ((state, year), totals) in table.iter_mut() {
        if !regions.contains(state) || totals.daily_total_mm.is_some() {
            continue;
        }
        if let Some(yearly) = totals.yearly_total_mm {
            totals.daily_total_mm = Some(round2(yearly / days_per_year));
            filled.push((state.clone(), *year));
        }
    }
    debug!(filled = filled.len(), "Estimated daily totals from yearly totals");
    filled
}

/// Rows whose yearly total is still absent, with the reason no estimate
/// could be made.
pub fn unrecoverable_gaps(
    table: &ObservationTable,
    strategy: ImputationStrategy,
) -> Vec<UnrecoverableGap> {
    table
        .iter()
        .filter(|(_, t)| t.yearly_total_mm.is_none())
        .map(|((state, year), t)| {
            let reason = match strategy {
                ImputationStrategy::RatioCalibration => match t.daily_total_mm {
                    None => GapReason::NoDailyTotal,
                    Some(_) => GapReason::NoCalibrationRatio,
                },
                ImputationStrategy::StateMean | ImputationStrategy::LinearInterpolation => {
                    GapReason::NoStateHistory
                }
            };
            UnrecoverableGap {
                state: state.clone(),
                year: *year,
                reason,
            }
        })
        .collect()
}
