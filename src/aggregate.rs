//! Collapse each source into one total per (state, year).
use crate::config::{ProxyConfig, StationConfig, YearWindow};
use crate::names::NameNormalizer;
use crate::types::{DailyObservation, StateYear, YearlyObservation};
use std::collections::BTreeMap;
use tracing::debug;

/// Grouped totals. A group whose every value was absent maps to `None`; a
/// state with no rows at all has no key.
pub type AnnualTotals = BTreeMap<StateYear, Option<f64>>;

fn accumulate(acc: &mut AnnualTotals, key: StateYear, value: Option<f64>) {
    let slot = acc.entry(key).or_insert(None);
    if let Some(v) = value {
        *slot = Some(slot.unwrap_or(0.0) + v);
    }
}

/// Sum daily readings into annual totals per canonical state. The reference
/// region's readings are also credited, unchanged, to every proxy region.
pub fn aggregate_daily(
    rows: &[DailyObservation],
    names: &NameNormalizer<'_>,
    proxy: &ProxyConfig,
) -> AnnualTotals {
    let mut totals = AnnualTotals::new();
    let mut proxied = 0usize;
    for row in rows {
        let state = names.canonical(&row.state);
        if state == proxy.reference {
            for region in &proxy.regions {
                accumulate(&mut totals, (region.clone(), row.year), row.rainfall_mm);
                proxied += 1;
            }
        }
        accumulate(&mut totals, (state, row.year), row.rainfall_mm);
    }
    debug!(
        groups = totals.len(),
        proxied_rows = proxied,
        "Aggregated daily readings"
    );
    totals
}

fn is_station_match(label: &str, stations: &StationConfig) -> bool {
    let label = label.to_lowercase();
    stations
        .patterns
        .iter()
        .any(|p| label.contains(&p.to_lowercase()))
}

/// Restrict the yearly source to `window`, fold subdivisions into their
/// aggregation state, and sum per (state, year). A station label matching one
/// of the configured patterns overrides the row's own state.
pub fn aggregate_yearly(
    rows: &[YearlyObservation],
    names: &NameNormalizer<'_>,
    window: &YearWindow,
    stations: &StationConfig,
) -> AnnualTotals {
    let mut totals = AnnualTotals::new();
    let mut outside_window = 0usize;
    for row in rows {
        if !window.contains(row.year) {
            outside_window += 1;
            continue;
        }
        let state = match row.station.as_deref() {
            Some(label) if is_station_match(label, stations) => stations.target.clone(),
            _ => names.aggregated(&row.state),
        };
        accumulate(&mut totals, (state, row.year), row.total_mm);
    }
    debug!(
        groups = totals.len(),
        outside_window,
        "Aggregated yearly readings"
    );
    totals
}
