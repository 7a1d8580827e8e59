use crate::aggregate::AnnualTotals;
use crate::types::{ObservationTable, Totals};
use tracing::debug;

/// Outer join on (state, year). A key present on only one side keeps the
/// other field absent.
pub fn outer_join(daily: &AnnualTotals, yearly: &AnnualTotals) -> ObservationTable {
    let mut table = ObservationTable::new();
    for ((state, year), total) in daily {
        table.upsert(
            state,
            *year,
            Totals {
                daily_total_mm: *total,
                yearly_total_mm: None,
            },
        );
    }
    for ((state, year), total) in yearly {
        let daily_total_mm = table.get(state, *year).and_then(|t| t.daily_total_mm);
        table.upsert(
            state,
            *year,
            Totals {
                daily_total_mm,
                yearly_total_mm: *total,
            },
        );
    }
    for (_, totals) in table.iter_mut() {
        *totals = totals.coerced();
    }
    debug!(rows = table.len(), "Merged daily and yearly totals");
    table
}
