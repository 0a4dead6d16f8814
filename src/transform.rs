// 🔢 Transform - log(1 + x) of one column, for modeling

use serde::{Deserialize, Serialize};

use crate::dataset::Observation;

/// Numeric columns of an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Column {
    AveragePrice,
    HousesSold,
    NoOfCrimes,
}

impl Column {
    /// CSV header name
    pub fn name(&self) -> &'static str {
        match self {
            Column::AveragePrice => "average_price",
            Column::HousesSold => "houses_sold",
            Column::NoOfCrimes => "no_of_crimes",
        }
    }

    pub fn get(&self, row: &Observation) -> Option<f64> {
        match self {
            Column::AveragePrice => row.average_price,
            Column::HousesSold => row.houses_sold,
            Column::NoOfCrimes => row.no_of_crimes,
        }
    }
}

/// Element-wise `log(1 + x)` of `column`, in row order, renumbered from 0.
///
/// Missing values become NaN. Nothing is clamped either: values ≤ -1 come
/// back as NaN or -inf and it is up to the caller to reject them.
pub fn log1p_column<'a, I>(rows: I, column: Column) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Observation>,
{
    rows.into_iter()
        .map(|r| column.get(r).map_or(f64::NAN, f64::ln_1p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(price: Option<f64>, sold: Option<f64>) -> Observation {
        Observation {
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            area: "Camden".to_string(),
            code: "E1".to_string(),
            average_price: price,
            houses_sold: sold,
            no_of_crimes: Some(0.0),
        }
    }

    #[test]
    fn test_log1p_values() {
        let rows = vec![
            row(Some(0.0), None),
            row(Some(std::f64::consts::E - 1.0), None),
            row(Some(99.0), None),
        ];

        let out = log1p_column(&rows, Column::AveragePrice);

        assert_eq!(out[0], 0.0);
        assert!((out[1] - 1.0).abs() < 1e-12);
        assert!((out[2] - 100f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_log1p_out_of_domain() {
        let rows = vec![row(None, Some(-1.0)), row(None, Some(-2.0))];

        let out = log1p_column(&rows, Column::HousesSold);

        assert_eq!(out[0], f64::NEG_INFINITY);
        assert!(out[1].is_nan());
    }

    #[test]
    fn test_log1p_column_missing_is_nan() {
        let rows = vec![row(Some(9.0), None)];

        let price = log1p_column(&rows, Column::AveragePrice);
        let sold = log1p_column(&rows, Column::HousesSold);
        let crimes = log1p_column(&rows, Column::NoOfCrimes);

        assert!((price[0] - 10f64.ln()).abs() < 1e-12);
        assert!(sold[0].is_nan());
        assert_eq!(crimes, vec![0.0]);
        assert_eq!(Column::NoOfCrimes.name(), "no_of_crimes");
    }
}
