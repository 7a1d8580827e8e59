//! Yearly/daily ratio calibration.
//!
//! Rows that carry both totals yield a ratio `yearly / daily`. Ratios outside
//! the plausibility band are dropped; the rest are reduced to a median per
//! year. Years without a surviving ratio fall back to the median of all
//! surviving ratios. When nothing survives the table is empty and yearly
//! totals cannot be estimated from daily ones for any year.
use crate::config::PlausibilityBand;
use crate::types::ObservationTable;
use crate::util::median;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioSample {
    pub year: i32,
    pub ratio: f64,
}

/// Ratios for every row where both totals exist and the daily total is
/// positive, split into (plausible, rejected).
pub fn ratio_samples(
    table: &ObservationTable,
    band: &PlausibilityBand,
) -> (Vec<RatioSample>, Vec<RatioSample>) {
    table
        .iter()
        .filter_map(|((_, year), totals)| match (totals.daily_total_mm, totals.yearly_total_mm) {
            (Some(daily), Some(yearly)) if daily > 0.0 => Some(RatioSample {
                year: *year,
                ratio: yearly / daily,
            }),
            _ => None,
        })
        .partition(|s| band.contains(s.ratio))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTable {
    median_ratio_by_year: BTreeMap<i32, f64>,
    fallback_years: BTreeSet<i32>,
    global_median_ratio: Option<f64>,
    accepted: usize,
    rejected: usize,
}

impl CalibrationTable {
    pub fn build(table: &ObservationTable, band: &PlausibilityBand) -> Self {
        let (accepted, rejected) = ratio_samples(table, band);

        let mut by_year: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
        for s in &accepted {
            by_year.entry(s.year).or_default().push(s.ratio);
        }
        let global_median_ratio = median(accepted.iter().map(|s| s.ratio).collect());

        let mut median_ratio_by_year = BTreeMap::new();
        let mut fallback_years = BTreeSet::new();
        for year in table.years() {
            let year_median = by_year.remove(&year).and_then(median);
            match (year_median, global_median_ratio) {
                (Some(m), _) => {
                    median_ratio_by_year.insert(year, m);
                }
                (None, Some(g)) => {
                    median_ratio_by_year.insert(year, g);
                    fallback_years.insert(year);
                }
                (None, None) => {}
            }
        }

        for (year, ratio) in &median_ratio_by_year {
            debug!(year, ratio, fallback = fallback_years.contains(year), "Calibration ratio");
        }
        if median_ratio_by_year.is_empty() && !table.is_empty() {
            warn!(
                rejected = rejected.len(),
                "No plausible yearly/daily ratio; yearly totals cannot be estimated from daily totals"
            );
        }

        Self {
            median_ratio_by_year,
            fallback_years,
            global_median_ratio,
            accepted: accepted.len(),
            rejected: rejected.len(),
        }
    }

    pub fn ratio_for(&self, year: i32) -> Option<f64> {
        self.median_ratio_by_year.get(&year).copied()
    }

    pub fn is_fallback(&self, year: i32) -> bool {
        self.fallback_years.contains(&year)
    }

    pub fn is_empty(&self) -> bool {
        self.median_ratio_by_year.is_empty()
    }

    pub fn global_median_ratio(&self) -> Option<f64> {
        self.global_median_ratio
    }

    pub fn median_ratio_by_year(&self) -> &BTreeMap<i32, f64> {
        &self.median_ratio_by_year
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Totals;

    fn table(rows: &[(&str, i32, Option<f64>, Option<f64>)]) -> ObservationTable {
        rows.iter()
            .map(|(s, y, d, yr)| {
                (
                    (s.to_string(), *y),
                    Totals {
                        daily_total_mm: *d,
                        yearly_total_mm: *yr,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_implausible_ratio_is_excluded() {
        // 2400 / 30 = 80, far outside [0.2, 6.0]
        let t = table(&[("Selangor", 2015, Some(30.0), Some(2400.0))]);
        let cal = CalibrationTable::build(&t, &PlausibilityBand::default());
        assert!(cal.is_empty());
        assert_eq!(cal.rejected_count(), 1);
        assert_eq!(cal.ratio_for(2015), None);
        assert_eq!(cal.global_median_ratio(), None);
    }

    #[test]
    fn test_median_per_year_with_global_fallback() {
        let t = table(&[
            ("Kedah", 2015, Some(500.0), Some(1000.0)),    // 2.0
            ("Perak", 2015, Some(500.0), Some(2000.0)),    // 4.0
            ("Johor", 2015, Some(500.0), Some(1500.0)),    // 3.0
            ("Perlis", 2016, Some(500.0), Some(2500.0)),   // 5.0
            ("Pahang", 2017, Some(500.0), None),
            ("Melaka", 2017, Some(10.0), Some(10000.0)),   // 1000, rejected
        ]);
        let cal = CalibrationTable::build(&t, &PlausibilityBand::default());
        assert_eq!(cal.ratio_for(2015), Some(3.0));
        assert_eq!(cal.ratio_for(2016), Some(5.0));
        // global median of [2, 3, 4, 5]
        assert_eq!(cal.global_median_ratio(), Some(3.5));
        assert_eq!(cal.ratio_for(2017), Some(3.5));
        assert!(cal.is_fallback(2017));
        assert!(!cal.is_fallback(2015));
        assert_eq!(cal.accepted_count(), 4);
        assert_eq!(cal.rejected_count(), 1);
    }

    #[test]
    fn test_band_is_closed() {
        let t = table(&[
            ("A", 2015, Some(10.0), Some(2.0)),  // 0.2
            ("B", 2015, Some(10.0), Some(60.0)), // 6.0
        ]);
        let (accepted, rejected) = ratio_samples(&t, &PlausibilityBand::default());
        assert_eq!(accepted.len(), 2);
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_zero_daily_total_yields_no_ratio() {
        let t = table(&[("A", 2015, Some(0.0), Some(2000.0))]);
        let (accepted, rejected) = ratio_samples(&t, &PlausibilityBand::default());
        assert!(accepted.is_empty());
        assert!(rejected.is_empty());
    }
}
