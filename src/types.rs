use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tabled::Tabled;

use crate::util::format_mm;

/// Raw daily-table row. Every cell is kept as text; typing happens in the
/// loader so a bad cell never rejects the whole row.
#[derive(Debug, Deserialize)]
pub struct RawDailyRow {
    #[serde(rename = "State")]
    pub state: Option<String>,
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "Rainfall (mm)")]
    pub rainfall_mm: Option<String>,
    #[serde(rename = "Date", default)]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawYearlyRow {
    #[serde(rename = "State")]
    pub state: Option<String>,
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "Total Rainfall in millimetres")]
    pub total_mm: Option<String>,
    #[serde(rename = "Station", default)]
    pub station: Option<String>,
}

/// One daily station reading, state name not yet normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyObservation {
    pub state: String,
    pub year: i32,
    pub rainfall_mm: Option<f64>,
}

/// One annual reading, state name not yet normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct YearlyObservation {
    pub state: String,
    pub year: i32,
    pub total_mm: Option<f64>,
    pub station: Option<String>,
}

pub type StateYear = (String, i32);

/// Both rainfall totals for a single (state, year). `None` means absent,
/// never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub daily_total_mm: Option<f64>,
    pub yearly_total_mm: Option<f64>,
}

impl Totals {
    /// Drop non-finite values so NaN/inf never reach ratios or sums.
    pub fn coerced(self) -> Self {
        Self {
            daily_total_mm: self.daily_total_mm.filter(|v| v.is_finite()),
            yearly_total_mm: self.yearly_total_mm.filter(|v| v.is_finite()),
        }
    }
}

/// Observation rows keyed by (state, year). Iteration order is the output
/// sort order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationTable {
    rows: BTreeMap<StateYear, Totals>,
}

impl ObservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, state: &str, year: i32) -> Option<&Totals> {
        self.rows.get(&(state.to_string(), year))
    }

    /// Overwrite the row for (state, year), creating it when absent.
    /// Returns `true` when a new row was inserted.
    pub fn upsert(&mut self, state: &str, year: i32, totals: Totals) -> bool {
        self.rows.insert((state.to_string(), year), totals).is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StateYear, &Totals)> {
        self.rows.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&StateYear, &mut Totals)> {
        self.rows.iter_mut()
    }

    /// All rows of one state, ascending by year.
    pub fn state_rows(&self, state: &str) -> Vec<(i32, Totals)> {
        let lo = (state.to_string(), i32::MIN);
        let hi = (state.to_string(), i32::MAX);
        self.rows
            .range(lo..=hi)
            .map(|((_, year), totals)| (*year, *totals))
            .collect()
    }

    pub fn states(&self) -> BTreeSet<&str> {
        self.rows.keys().map(|(s, _)| s.as_str()).collect()
    }

    pub fn years(&self) -> BTreeSet<i32> {
        self.rows.keys().map(|(_, y)| *y).collect()
    }

    pub fn to_rows(&self) -> Vec<ReconciledRow> {
        self.rows
            .iter()
            .map(|((state, year), totals)| ReconciledRow {
                state: state.clone(),
                year: *year,
                daily_total_mm: totals.daily_total_mm,
                yearly_total_mm: totals.yearly_total_mm,
            })
            .collect()
    }
}

impl FromIterator<(StateYear, Totals)> for ObservationTable {
    fn from_iter<I: IntoIterator<Item = (StateYear, Totals)>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<ReconciledRow> for ObservationTable {
    fn from_iter<I: IntoIterator<Item = ReconciledRow>>(iter: I) -> Self {
        iter.into_iter()
            .map(|r| {
                (
                    (r.state, r.year),
                    Totals {
                        daily_total_mm: r.daily_total_mm,
                        yearly_total_mm: r.yearly_total_mm,
                    },
                )
            })
            .collect()
    }
}

/// Output row; the column names are the published file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tabled)]
pub struct ReconciledRow {
    #[serde(rename = "State")]
    #[tabled(rename = "State")]
    pub state: String,
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Daily Rainfall (mm)")]
    #[tabled(rename = "Daily Rainfall (mm)", display_with = "format_mm")]
    pub daily_total_mm: Option<f64>,
    #[serde(rename = "Yearly Rainfall (mm)")]
    #[tabled(rename = "Yearly Rainfall (mm)", display_with = "format_mm")]
    pub yearly_total_mm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct StateAverageRow {
    #[serde(rename = "State")]
    #[tabled(rename = "State")]
    pub state: String,
    #[serde(rename = "Daily Rainfall (mm)")]
    #[tabled(rename = "Daily Rainfall (mm)", display_with = "format_mm")]
    pub daily_total_mm: Option<f64>,
    #[serde(rename = "Yearly Rainfall (mm)")]
    #[tabled(rename = "Yearly Rainfall (mm)", display_with = "format_mm")]
    pub yearly_total_mm: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct CalibrationRow {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Ratio")]
    #[tabled(rename = "Ratio")]
    pub ratio: String,
    #[serde(rename = "Source")]
    #[tabled(rename = "Source")]
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapReason {
    /// No daily aggregate to scale.
    NoDailyTotal,
    /// Daily aggregate exists but the year has no calibration entry.
    NoCalibrationRatio,
    /// Mean/interpolation strategies found no present yearly total for the state.
    NoStateHistory,
}

impl std::fmt::Display for GapReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GapReason::NoDailyTotal => write!(f, "no daily total"),
            GapReason::NoCalibrationRatio => write!(f, "no calibration ratio"),
            GapReason::NoStateHistory => write!(f, "no yearly history for state"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnrecoverableGap {
    pub state: String,
    pub year: i32,
    pub reason: GapReason,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub config_version: u32,
    pub strategy: String,
    pub total_rows: usize,
    pub total_states: usize,
    pub estimated_yearly: usize,
    pub estimated_daily: usize,
    pub proxy_rows_written: usize,
    pub rejected_ratios: usize,
    pub calibration_empty: bool,
    pub global_median_ratio: Option<f64>,
    pub median_ratio_by_year: BTreeMap<i32, f64>,
    pub unrecoverable: Vec<UnrecoverableGap>,
    pub extreme_rows: Vec<ReconciledRow>,
}
