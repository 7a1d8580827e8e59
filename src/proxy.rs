//! Final reconciliation pass for regions defined by a reference region.
use crate::config::ProxyConfig;
use crate::types::ObservationTable;
use crate::util::round2;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstitutionCount {
    pub updated: usize,
    pub inserted: usize,
}

impl SubstitutionCount {
    pub fn total(&self) -> usize {
        self.updated + self.inserted
    }
}

/// Copy the reference region's totals onto every proxy region for each year
/// the reference has a row, overwriting whatever an earlier stage computed
/// and inserting rows that do not exist yet.
pub fn substitute_proxies(table: &mut ObservationTable, proxy: &ProxyConfig) -> SubstitutionCount {
    let reference_rows = table.state_rows(&proxy.reference);
    let mut count = SubstitutionCount::default();
    for region in &proxy.regions {
        for (year, totals) in &reference_rows {
            if table.upsert(region, *year, *totals) {
                count.inserted += 1;
            } else {
                count.updated += 1;
            }
        }
    }
    debug!(
        reference = %proxy.reference,
        updated = count.updated,
        inserted = count.inserted,
        "Substituted proxy regions"
    );
    count
}

/// Round both totals to 2 decimal places.
pub fn finalize(table: &mut ObservationTable) {
    for (_, totals) in table.iter_mut() {
        totals.daily_total_mm = totals.daily_total_mm.map(round2);
        totals.yearly_total_mm = totals.yearly_total_mm.map(round2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Totals;

    fn totals(d: Option<f64>, y: Option<f64>) -> Totals {
        Totals {
            daily_total_mm: d,
            yearly_total_mm: y,
        }
    }

    #[test]
    fn test_missing_proxy_row_is_appended() {
        let mut t = ObservationTable::new();
        t.upsert("Selangor", 2019, totals(Some(120.0), Some(2800.0)));
        let count = substitute_proxies(&mut t, &ProxyConfig::default());
        assert_eq!(count, SubstitutionCount { updated: 0, inserted: 2 });
        assert_eq!(
            t.get("Putrajaya", 2019),
            Some(&totals(Some(120.0), Some(2800.0)))
        );
        assert_eq!(
            t.get("Kuala Lumpur", 2019),
            Some(&totals(Some(120.0), Some(2800.0)))
        );
    }

    #[test]
    fn test_existing_proxy_row_is_overwritten() {
        let mut t = ObservationTable::new();
        t.upsert("Selangor", 2018, totals(Some(100.0), Some(2500.0)));
        t.upsert("Kuala Lumpur", 2018, totals(Some(100.0), Some(9999.0)));
        t.upsert("Kuala Lumpur", 2013, totals(None, Some(1.0)));
        let count = substitute_proxies(&mut t, &ProxyConfig::default());
        assert_eq!(count.updated, 1);
        assert_eq!(count.inserted, 1);
        assert_eq!(count.total(), 2);
        assert_eq!(
            t.get("Kuala Lumpur", 2018),
            Some(&totals(Some(100.0), Some(2500.0)))
        );
        // Years the reference lacks are left alone.
        assert_eq!(t.get("Kuala Lumpur", 2013), Some(&totals(None, Some(1.0))));
    }

    #[test]
    fn test_finalize_rounds() {
        let mut t = ObservationTable::new();
        t.upsert("Kedah", 2016, totals(Some(10.126), Some(2250.004)));
        finalize(&mut t);
        assert_eq!(t.get("Kedah", 2016), Some(&totals(Some(10.13), Some(2250.0))));
    }
}
