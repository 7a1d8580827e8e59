//! Pipeline driver.
//!
//! Stages run strictly forward over whole tables:
//! aggregate -> merge -> calibrate -> fill -> proxy substitution -> round.
//! `reconcile` is pure over in-memory rows; `run` adds file loading on top and
//! fails before producing anything if either input cannot be read.
use crate::aggregate::{aggregate_daily, aggregate_yearly};
use crate::calibrate::CalibrationTable;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::impute::{estimate_daily_from_yearly, fill_yearly, unrecoverable_gaps};
use crate::loader::{load_daily, load_yearly, LoadReport};
use crate::merge::outer_join;
use crate::names::NameNormalizer;
use crate::proxy::{finalize, substitute_proxies};
use crate::reports::{extreme_rows, Diagnostics};
use crate::types::{DailyObservation, ObservationTable, YearlyObservation};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub table: ObservationTable,
    pub calibration: CalibrationTable,
    pub diagnostics: Diagnostics,
}

#[derive(Debug)]
pub struct RunOutput {
    pub result: Reconciliation,
    pub daily_report: LoadReport,
    pub yearly_report: LoadReport,
}

pub fn reconcile(
    daily: &[DailyObservation],
    yearly: &[YearlyObservation],
    config: &PipelineConfig,
) -> Reconciliation {
    let names = NameNormalizer::new(&config.aliases);

    let daily_totals = aggregate_daily(daily, &names, &config.proxy);
    let yearly_totals = aggregate_yearly(yearly, &names, &config.years, &config.stations);
    let mut table = outer_join(&daily_totals, &yearly_totals);

    let calibration = CalibrationTable::build(&table, &config.calibration);
    let estimated_yearly = fill_yearly(&mut table, &calibration, config.imputation.strategy);
    let estimated_daily = estimate_daily_from_yearly(
        &mut table,
        &config.imputation.daily_from_yearly_regions,
        config.imputation.days_per_year,
    );
    let proxy_rows = substitute_proxies(&mut table, &config.proxy);
    finalize(&mut table);

    let unrecoverable = unrecoverable_gaps(&table, config.imputation.strategy);
    for gap in &unrecoverable {
        warn!(state = %gap.state, year = gap.year, reason = %gap.reason, "Yearly total could not be recovered");
    }
    let extreme = extreme_rows(&table, config.diagnostics.extreme_yearly_mm);
    for row in &extreme {
        warn!(
            state = %row.state,
            year = row.year,
            yearly_mm = ?row.yearly_total_mm,
            "Yearly total exceeds review threshold"
        );
    }

    info!(
        rows = table.len(),
        estimated_yearly = estimated_yearly.len(),
        estimated_daily = estimated_daily.len(),
        proxy_rows = proxy_rows.total(),
        unrecoverable = unrecoverable.len(),
        "Reconciliation complete"
    );

    let diagnostics = Diagnostics {
        estimated_yearly,
        estimated_daily,
        proxy_rows,
        unrecoverable,
        extreme_rows: extreme,
        calibration_empty: calibration.is_empty(),
    };
    Reconciliation {
        table,
        calibration,
        diagnostics,
    }
}

pub fn run(daily_path: &Path, yearly_path: &Path, config: &PipelineConfig) -> Result<RunOutput> {
    let (daily, daily_report) = load_daily(daily_path)?;
    let (yearly, yearly_report) = load_yearly(yearly_path)?;
    Ok(RunOutput {
        result: reconcile(&daily, &yearly, config),
        daily_report,
        yearly_report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Totals;

    fn daily(state: &str, year: i32, mm: f64) -> DailyObservation {
        DailyObservation {
            state: state.to_string(),
            year,
            rainfall_mm: Some(mm),
        }
    }

    fn yearly(state: &str, year: i32, mm: f64) -> YearlyObservation {
        YearlyObservation {
            state: state.to_string(),
            year,
            total_mm: Some(mm),
            station: None,
        }
    }

    #[test]
    fn test_reconcile_end_to_end() {
        let daily_rows = vec![
            daily("Selangor", 2016, 300.0),
            daily("Selangor", 2016, 300.0),
            daily("Kedah", 2016, 500.0),
            daily("Perak", 2016, 400.0),
        ];
        let yearly_rows = vec![
            yearly("Selangor", 2016, 2600.0),
            yearly("Perak", 2016, 1800.0), // 4.5
            yearly("Sarawak", 2016, 18000.0),
            yearly("Kuala Lumpur", 2016, 100.0), // folds into Selangor
        ];
        let result = reconcile(&daily_rows, &yearly_rows, &PipelineConfig::default());
        let t = &result.table;

        // 2600 + 100 = 2700 over 600 daily, ratio 4.5
        assert_eq!(
            t.get("Selangor", 2016),
            Some(&Totals {
                daily_total_mm: Some(600.0),
                yearly_total_mm: Some(2700.0)
            })
        );
        assert_eq!(t.get("Kuala Lumpur", 2016), t.get("Selangor", 2016));
        assert_eq!(t.get("Putrajaya", 2016), t.get("Selangor", 2016));
        assert_eq!(t.get("Kedah", 2016).unwrap().yearly_total_mm, Some(2250.0));
        assert_eq!(t.get("Sarawak", 2016).unwrap().daily_total_mm, Some(49.32));
        assert!(result.diagnostics.unrecoverable.is_empty());
        assert!(!result.diagnostics.calibration_empty);
        assert_eq!(result.diagnostics.estimated_yearly.len(), 3);
    }

    #[test]
    fn test_empty_calibration_is_flagged() {
        let daily_rows = vec![daily("Kedah", 2016, 500.0)];
        let result = reconcile(&daily_rows, &[], &PipelineConfig::default());
        assert!(result.diagnostics.calibration_empty);
        assert_eq!(result.diagnostics.unrecoverable.len(), 1);
        assert_eq!(result.table.get("Kedah", 2016).unwrap().yearly_total_mm, None);
    }
}
