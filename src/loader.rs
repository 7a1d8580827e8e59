use crate::error::{ReconcileError, Result};
use crate::types::{DailyObservation, RawDailyRow, RawYearlyRow, YearlyObservation};
use crate::util::{parse_f64_safe, parse_year_safe, year_of_date};
use csv::{Reader, ReaderBuilder, StringRecord};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

const DAILY_SOURCE: &str = "daily";
const YEARLY_SOURCE: &str = "yearly";

const TOTAL_COLUMN: &str = "Total Rainfall in millimetres";
const TOTAL_COLUMN_ALT: &str = "Total_Rainfall_mm";

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    /// Rows dropped for a malformed record, blank state or unusable year.
    pub skipped_rows: usize,
    /// Numeric cells that were blank or failed coercion; kept as absent.
    pub missing_values: usize,
}

fn open(path: &Path) -> Result<Reader<std::fs::File>> {
    ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|source| ReconcileError::MissingInputFile {
            path: path.to_path_buf(),
            source,
        })
}

fn trimmed_headers<R: Read>(rdr: &mut Reader<R>) -> Result<StringRecord> {
    Ok(rdr.headers()?.iter().map(str::trim).collect())
}

fn require(headers: &StringRecord, source_name: &str, column: &str) -> Result<()> {
    if headers.iter().any(|h| h == column) {
        Ok(())
    } else {
        Err(ReconcileError::MissingRequiredColumn {
            source_name: source_name.to_string(),
            column: column.to_string(),
        })
    }
}

pub fn load_daily(path: &Path) -> Result<(Vec<DailyObservation>, LoadReport)> {
    let rdr = open(path)?;
    let (rows, report) = read_daily(rdr)?;
    info!(
        path = %path.display(),
        rows = report.total_rows,
        skipped = report.skipped_rows,
        missing = report.missing_values,
        "Loaded daily table"
    );
    Ok((rows, report))
}

pub fn daily_from_reader<R: Read>(reader: R) -> Result<(Vec<DailyObservation>, LoadReport)> {
    read_daily(ReaderBuilder::new().flexible(true).from_reader(reader))
}

fn read_daily<R: Read>(mut rdr: Reader<R>) -> Result<(Vec<DailyObservation>, LoadReport)> {
    let headers = trimmed_headers(&mut rdr)?;
    for column in ["State", "Year", "Rainfall (mm)"] {
        require(&headers, DAILY_SOURCE, column)?;
    }
    rdr.set_headers(headers);

    let mut report = LoadReport::default();
    let mut rows = Vec::new();
    for result in rdr.deserialize::<RawDailyRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "Skipping malformed daily record");
                report.skipped_rows += 1;
                continue;
            }
        };

        let state = row.state.unwrap_or_default();
        if state.trim().is_empty() {
            report.skipped_rows += 1;
            continue;
        }
        // Fall back to the date column when the year cell is unusable.
        let year = match parse_year_safe(row.year.as_deref())
            .or_else(|| year_of_date(row.date.as_deref()))
        {
            Some(y) => y,
            None => {
                report.skipped_rows += 1;
                continue;
            }
        };
        let rainfall_mm = parse_f64_safe(row.rainfall_mm.as_deref());
        if rainfall_mm.is_none() {
            report.missing_values += 1;
        }
        rows.push(DailyObservation {
            state,
            year,
            rainfall_mm,
        });
    }
    Ok((rows, report))
}

pub fn load_yearly(path: &Path) -> Result<(Vec<YearlyObservation>, LoadReport)> {
    let rdr = open(path)?;
    let (rows, report) = read_yearly(rdr)?;
    info!(
        path = %path.display(),
        rows = report.total_rows,
        skipped = report.skipped_rows,
        missing = report.missing_values,
        "Loaded yearly table"
    );
    Ok((rows, report))
}

pub fn yearly_from_reader<R: Read>(reader: R) -> Result<(Vec<YearlyObservation>, LoadReport)> {
    read_yearly(ReaderBuilder::new().flexible(true).from_reader(reader))
}

fn read_yearly<R: Read>(mut rdr: Reader<R>) -> Result<(Vec<YearlyObservation>, LoadReport)> {
    let mut headers = trimmed_headers(&mut rdr)?;
    require(&headers, YEARLY_SOURCE, "State")?;
    require(&headers, YEARLY_SOURCE, "Year")?;

    // Rename the alternate total header and the station label column to the
    // names `RawYearlyRow` expects.
    let has_total = headers.iter().any(|h| h == TOTAL_COLUMN);
    let mut station_seen = false;
    headers = headers
        .iter()
        .map(|h| {
            if !has_total && h == TOTAL_COLUMN_ALT {
                TOTAL_COLUMN
            } else if !station_seen && h.to_lowercase().contains("station") {
                station_seen = true;
                "Station"
            } else {
                h
            }
        })
        .collect();
    require(&headers, YEARLY_SOURCE, TOTAL_COLUMN)?;
    if station_seen {
        debug!("Yearly table carries a station label column");
    }
    rdr.set_headers(headers);

    let mut report = LoadReport::default();
    let mut rows = Vec::new();
    for result in rdr.deserialize::<RawYearlyRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "Skipping malformed yearly record");
                report.skipped_rows += 1;
                continue;
            }
        };

        let state = row.state.unwrap_or_default();
        let Some(year) = parse_year_safe(row.year.as_deref()) else {
            report.skipped_rows += 1;
            continue;
        };
        if state.trim().is_empty() {
            report.skipped_rows += 1;
            continue;
        }
        let total_mm = parse_f64_safe(row.total_mm.as_deref());
        if total_mm.is_none() {
            report.missing_values += 1;
        }
        rows.push(YearlyObservation {
            state,
            year,
            total_mm,
            station: row.station.filter(|s| !s.trim().is_empty()),
        });
    }
    Ok((rows, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_reader_trims_headers_and_coerces() {
        let data = " State , Year ,Rainfall (mm)\n\
                    Selangor,2015,10.5\n\
                    Selangor,2015,n/a\n\
                    ,2015,3\n\
                    Kedah,,4\n";
        let (rows, report) = daily_from_reader(data.as_bytes()).unwrap();
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.skipped_rows, 2);
        assert_eq!(report.missing_values, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rainfall_mm, Some(10.5));
        assert_eq!(rows[1].rainfall_mm, None);
    }

    #[test]
    fn test_daily_year_from_date() {
        let data = "State,Year,Rainfall (mm),Date\nKedah,,4,2017-05-02\n";
        let (rows, report) = daily_from_reader(data.as_bytes()).unwrap();
        assert_eq!(report.skipped_rows, 0);
        assert_eq!(rows[0].year, 2017);
    }

    #[test]
    fn test_daily_missing_column() {
        let data = "State,Year\nKedah,2015\n";
        let err = daily_from_reader(data.as_bytes()).unwrap_err();
        match err {
            ReconcileError::MissingRequiredColumn { column, .. } => {
                assert_eq!(column, "Rainfall (mm)")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_yearly_station_column_detected() {
        let data = "State,Year,Total Rainfall in millimetres,Weather Station\n\
                    Kuala Lumpur,2016,\"2,800\",Subang Meteorological Station\n\
                    Kedah,2016,abc,\n";
        let (rows, report) = yearly_from_reader(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].total_mm, Some(2800.0));
        assert_eq!(
            rows[0].station.as_deref(),
            Some("Subang Meteorological Station")
        );
        assert_eq!(rows[1].total_mm, None);
        assert_eq!(rows[1].station, None);
        assert_eq!(report.missing_values, 1);
    }

    #[test]
    fn test_yearly_alternate_total_header() {
        let data = "State,Year,Total_Rainfall_mm\nSabah,2018,3000\n";
        let (rows, _) = yearly_from_reader(data.as_bytes()).unwrap();
        assert_eq!(rows[0].total_mm, Some(3000.0));
    }

    #[test]
    fn test_yearly_missing_total_column() {
        let data = "State,Year,Rain\nSabah,2018,3000\n";
        let err = yearly_from_reader(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains(TOTAL_COLUMN));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = load_daily(Path::new("does/not/exist.csv")).unwrap_err();
        assert!(matches!(err, ReconcileError::MissingInputFile { .. }));
    }
}
