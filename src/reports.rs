use crate::calibrate::CalibrationTable;
use crate::config::PipelineConfig;
use crate::pipeline::Reconciliation;
use crate::proxy::SubstitutionCount;
use crate::types::{
    CalibrationRow, ObservationTable, ReconciledRow, RunSummary, StateAverageRow, StateYear,
    UnrecoverableGap,
};
use crate::util::{average, round2};

/// Advisory output of a run. Nothing downstream depends on it; it exists so
/// estimated and unrecoverable values can be reviewed by hand.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub estimated_yearly: Vec<StateYear>,
    pub estimated_daily: Vec<StateYear>,
    pub proxy_rows: SubstitutionCount,
    pub unrecoverable: Vec<UnrecoverableGap>,
    pub extreme_rows: Vec<ReconciledRow>,
    pub calibration_empty: bool,
}

/// Rows whose yearly total exceeds `threshold_mm`.
pub fn extreme_rows(table: &ObservationTable, threshold_mm: f64) -> Vec<ReconciledRow> {
    table
        .to_rows()
        .into_iter()
        .filter(|r| r.yearly_total_mm.is_some_and(|v| v > threshold_mm))
        .collect()
}

pub fn calibration_rows(calibration: &CalibrationTable) -> Vec<CalibrationRow> {
    calibration
        .median_ratio_by_year()
        .iter()
        .map(|(year, ratio)| CalibrationRow {
            year: *year,
            ratio: format!("{:.3}", ratio),
            source: if calibration.is_fallback(*year) {
                "global fallback".to_string()
            } else {
                "year median".to_string()
            },
        })
        .collect()
}

/// Per-state mean of the present totals across all reconciled years.
pub fn generate_state_averages(table: &ObservationTable) -> Vec<StateAverageRow> {
    table
        .states()
        .into_iter()
        .map(|state| {
            let rows = table.state_rows(state);
            let daily: Vec<f64> = rows.iter().filter_map(|(_, t)| t.daily_total_mm).collect();
            let yearly: Vec<f64> = rows.iter().filter_map(|(_, t)| t.yearly_total_mm).collect();
            StateAverageRow {
                state: state.to_string(),
                daily_total_mm: average(&daily).map(round2),
                yearly_total_mm: average(&yearly).map(round2),
            }
        })
        .collect()
}

pub fn generate_summary(result: &Reconciliation, config: &PipelineConfig) -> RunSummary {
    let diagnostics = &result.diagnostics;
    RunSummary {
        config_version: config.version,
        strategy: config.imputation.strategy.to_string(),
        total_rows: result.table.len(),
        total_states: result.table.states().len(),
        estimated_yearly: diagnostics.estimated_yearly.len(),
        estimated_daily: diagnostics.estimated_daily.len(),
        proxy_rows_written: diagnostics.proxy_rows.total(),
        rejected_ratios: result.calibration.rejected_count(),
        calibration_empty: diagnostics.calibration_empty,
        global_median_ratio: result.calibration.global_median_ratio(),
        median_ratio_by_year: result.calibration.median_ratio_by_year().clone(),
        unrecoverable: diagnostics.unrecoverable.clone(),
        extreme_rows: diagnostics.extreme_rows.clone(),
    }
}
