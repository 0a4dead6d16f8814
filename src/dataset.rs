// 🗄️ Dataset Loader - monthly housing observations
// CSV → immutable in-memory table, loaded once per process

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Format of the `date` column in the source CSV
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// RECORD TYPES
// ============================================================================

/// Raw CSV row, before the date is parsed.
/// Columns not named here (e.g. `borough_flag`) are ignored.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    date: String,
    area: String,
    code: String,
    average_price: Option<f64>,
    houses_sold: Option<f64>,
    no_of_crimes: Option<f64>,
}

/// One row per (area, month).
/// Duplicate (area, date) pairs are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub area: String,
    pub code: String,
    pub average_price: Option<f64>,
    pub houses_sold: Option<f64>,
    pub no_of_crimes: Option<f64>,
}

impl CsvRecord {
    fn into_observation(self, line: usize) -> Result<Observation> {
        let date = NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).with_context(|| {
            format!(
                "Invalid date {:?} on line {} (expected {})",
                self.date, line, DATE_FORMAT
            )
        })?;

        Ok(Observation {
            date,
            area: self.area,
            code: self.code,
            average_price: self.average_price,
            houses_sold: self.houses_sold,
            no_of_crimes: self.no_of_crimes,
        })
    }
}

/// Render a value the way Python's `str(float)` does: integral values keep a
/// trailing `.0`, and a missing value is `nan`.
pub fn format_float(value: Option<f64>) -> String {
    match value {
        None => "nan".to_string(),
        Some(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => format!("{:.1}", v),
        Some(v) if v.is_nan() => "nan".to_string(),
        Some(v) => v.to_string(),
    }
}

// ============================================================================
// DATASET
// ============================================================================

/// The whole table, never mutated after construction.
/// Share it between requests behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Vec<Observation>,
    max_date: Option<NaiveDate>,
}

impl Dataset {
    /// Load the CSV at `path`. Fails on a missing file or any unparseable date.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open CSV file {}", path.display()))?;
        let dataset = Self::from_reader(file)
            .with_context(|| format!("Failed to load dataset from {}", path.display()))?;

        info!(
            path = %path.display(),
            rows = dataset.len(),
            max_date = ?dataset.max_date,
            "dataset loaded"
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut rows = Vec::new();

        for (idx, result) in rdr.deserialize().enumerate() {
            // header is line 1
            let line = idx + 2;
            let record: CsvRecord =
                result.with_context(|| format!("Failed to deserialize row on line {}", line))?;
            rows.push(record.into_observation(line)?);
        }

        Ok(Self::from_rows(rows))
    }

    pub fn from_rows(rows: Vec<Observation>) -> Self {
        let max_date = rows.iter().map(|r| r.date).max();
        Dataset { rows, max_date }
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Latest date across every area
    pub fn max_date(&self) -> Option<NaiveDate> {
        self.max_date
    }

    /// Rows for one area, in file order
    pub fn for_area<'a>(&'a self, area: &'a str) -> impl Iterator<Item = &'a Observation> + 'a {
        self.rows.iter().filter(move |r| r.area == area)
    }

    /// Rows at the dataset-wide maximum date that belong to `area`.
    /// An area without a row on that exact date yields nothing.
    pub fn latest_for_area(&self, area: &str) -> Vec<&Observation> {
        match self.max_date {
            Some(max) => self
                .rows
                .iter()
                .filter(|r| r.date == max && r.area == area)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn contains_area(&self, area: &str) -> bool {
        self.rows.iter().any(|r| r.area == area)
    }

    /// Sorted, de-duplicated area names
    pub fn areas(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.area.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE_CSV: &str = include_str!("../tests/fixtures/housing_sample.csv");

    pub(crate) fn sample_dataset() -> Dataset {
        Dataset::from_reader(SAMPLE_CSV.as_bytes()).unwrap()
    }

    #[test]
    fn test_load_sample() {
        let ds = sample_dataset();

        assert_eq!(ds.len(), 21);
        assert_eq!(ds.max_date(), NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(ds.for_area("Camden").count(), 4);
    }

    #[test]
    fn test_missing_values_are_none() {
        let ds = sample_dataset();
        let westminster_latest = ds.latest_for_area("Westminster");

        assert_eq!(westminster_latest.len(), 1);
        assert_eq!(westminster_latest[0].houses_sold, None);
        assert_eq!(westminster_latest[0].no_of_crimes, None);
        assert_eq!(westminster_latest[0].average_price, Some(1005000.0));
    }

    #[test]
    fn test_latest_for_area() {
        let ds = sample_dataset();

        let camden = ds.latest_for_area("Camden");
        assert_eq!(camden.len(), 1);
        assert_eq!(camden[0].code, "E09000007");

        // Barnet stops before the max date
        assert!(ds.latest_for_area("Barnet").is_empty());
        assert!(ds.latest_for_area("Atlantis").is_empty());
    }

    #[test]
    fn test_areas_sorted_unique() {
        let ds = sample_dataset();
        assert_eq!(
            ds.areas(),
            vec!["Barnet", "Camden", "Hackney", "Nosales", "Pair", "Tiny", "Westminster"]
        );
        assert!(ds.contains_area("Tiny"));
        assert!(!ds.contains_area("camden"));
    }

    #[test]
    fn test_bad_date_fails() {
        let csv = "date,area,average_price,code,houses_sold,no_of_crimes\n\
                   01/02/2020,Camden,1,E1,1,1\n";
        let err = Dataset::from_reader(csv.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn test_missing_file_fails() {
        let result = Dataset::load(Path::new("does/not/exist.csv"));
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let csv = "date,area,average_price,code,houses_sold,no_of_crimes\n\
                   2020-01-01,Camden,1,E1,1,1\n\
                   2020-01-01,Camden,2,E1,1,1\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(ds.latest_for_area("Camden").len(), 2);
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(Some(845000.0)), "845000.0");
        assert_eq!(format_float(Some(2150.0)), "2150.0");
        assert_eq!(format_float(Some(-3.0)), "-3.0");
        assert_eq!(format_float(Some(1234.5)), "1234.5");
        assert_eq!(format_float(Some(f64::NAN)), "nan");
        assert_eq!(format_float(Some(f64::INFINITY)), "inf");
        assert_eq!(format_float(None), "nan");
    }

    #[test]
    fn test_empty_dataset() {
        let ds = Dataset::from_rows(Vec::new());
        assert!(ds.is_empty());
        assert_eq!(ds.max_date(), None);
        assert!(ds.latest_for_area("Camden").is_empty());
    }
}
