//! Property tests for reconciliation invariants.
//!
//! 1. Name normalization is idempotent
//! 2. Calibration ratios stay inside the plausibility band
//! 3. Proxy regions always mirror the reference region
//! 4. A missing yearly total is only left when no estimate path exists

use proptest::prelude::*;
use rainfall_reconcile::calibrate::CalibrationTable;
use rainfall_reconcile::config::AliasConfig;
use rainfall_reconcile::names::NameNormalizer;
use rainfall_reconcile::types::{DailyObservation, YearlyObservation};
use rainfall_reconcile::{reconcile, PipelineConfig};

const STATES: &[&str] = &[
    "Selangor",
    "Kedah",
    "Perak",
    "NSembilan",
    "Penang",
    "Sabah",
    "Sarawak",
    "Kuala Lumpur",
    "Putrajaya",
];

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_state() -> impl Strategy<Value = String> {
    prop::sample::select(STATES).prop_map(str::to_string)
}

fn arb_daily() -> impl Strategy<Value = DailyObservation> {
    (arb_state(), 2014..=2020i32, prop::option::weighted(0.9, 0.0..50.0_f64)).prop_map(
        |(state, year, rainfall_mm)| DailyObservation {
            state,
            year,
            rainfall_mm,
        },
    )
}

fn arb_yearly() -> impl Strategy<Value = YearlyObservation> {
    (arb_state(), 2012..=2022i32, prop::option::weighted(0.9, 500.0..6000.0_f64)).prop_map(
        |(state, year, total_mm)| YearlyObservation {
            state,
            year,
            total_mm,
            station: None,
        },
    )
}

proptest! {
    #[test]
    fn canonical_name_is_idempotent(raw in "[A-Za-z \\t-]{0,40}") {
        let aliases = AliasConfig::default();
        let names = NameNormalizer::new(&aliases);
        let once = names.canonical(&raw);
        prop_assert_eq!(names.canonical(&once), once);
    }

    #[test]
    fn alias_keys_with_noise_are_idempotent(
        key in prop::sample::select(AliasConfig::default().base.keys().cloned().collect::<Vec<_>>()),
        pad in "[ \\t]{0,3}",
    ) {
        let aliases = AliasConfig::default();
        let names = NameNormalizer::new(&aliases);
        let once = names.canonical(&format!("{pad}{key}{pad}"));
        prop_assert_eq!(names.canonical(&once), once);
    }

    #[test]
    fn reconciliation_invariants(
        daily in prop::collection::vec(arb_daily(), 0..60),
        yearly in prop::collection::vec(arb_yearly(), 0..40),
    ) {
        let config = PipelineConfig::default();
        let result = reconcile(&daily, &yearly, &config);
        let table = &result.table;
        let cal: &CalibrationTable = &result.calibration;

        for (year, ratio) in cal.median_ratio_by_year() {
            let in_band = config.calibration.contains(*ratio);
            prop_assert!(in_band || cal.is_fallback(*year));
            if cal.is_fallback(*year) {
                prop_assert_eq!(Some(*ratio), cal.global_median_ratio());
            }
        }

        for (year, reference) in table.state_rows(&config.proxy.reference) {
            for region in &config.proxy.regions {
                prop_assert_eq!(table.get(region, year), Some(&reference));
            }
        }

        for ((state, year), totals) in table.iter() {
            if totals.yearly_total_mm.is_none() {
                let is_proxy = config.proxy.regions.contains(state);
                prop_assert!(
                    is_proxy || totals.daily_total_mm.is_none() || cal.ratio_for(*year).is_none(),
                    "{} {} left without yearly total despite daily total and ratio",
                    state,
                    year
                );
            }
        }
    }
}
