// 📈 Regression Engine - price elasticity of sales
// OLS of log(1 + houses_sold) on log(1 + average_price), with intercept

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::debug;

use crate::dataset::{Dataset, Observation};
use crate::error::{AnalysisError, AnalysisResult};
use crate::transform::{log1p_column, Column};

pub const INTERCEPT: &str = "Intercept";
pub const LOG_PRICE: &str = "log(Price)";

/// Fewest rows that still determine a line
pub const MIN_ROWS: usize = 2;

/// Relative cutoff below which a singular value counts as zero
const RANK_TOLERANCE: f64 = 1e-12;

// ============================================================================
// MODEL FRAME
// ============================================================================

/// Cleaned, date-ordered modeling input for one area.
/// Every row has both `average_price` and `houses_sold` present;
/// `no_of_crimes` is not part of the selection and is always `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelFrame {
    pub rows: Vec<Observation>,
}

impl ModelFrame {
    /// Order by date, forward-fill each column, then drop rows that are still
    /// missing a value (only possible before the first observed value).
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let mut rows: Vec<&Observation> = rows.into_iter().collect();
        rows.sort_by_key(|r| r.date);

        let mut frame = ModelFrame::default();
        let mut last_price = None;
        let mut last_sold = None;

        for row in rows {
            last_price = Column::AveragePrice.get(row).or(last_price);
            last_sold = Column::HousesSold.get(row).or(last_sold);

            if let (Some(price), Some(sold)) = (last_price, last_sold) {
                frame.rows.push(Observation {
                    date: row.date,
                    area: row.area.clone(),
                    code: row.code.clone(),
                    average_price: Some(price),
                    houses_sold: Some(sold),
                    no_of_crimes: None,
                });
            }
        }

        frame
    }

    /// The date index
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// OLS
// ============================================================================

/// Result of a two-parameter OLS fit; index 0 is the intercept, 1 the slope.
/// Inference fields are `None` when there are no residual degrees of freedom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OlsFit {
    pub params: [f64; 2],
    pub std_errors: Option<[f64; 2]>,
    pub t_values: Option<[f64; 2]>,
    pub pvalues: Option<[f64; 2]>,
    pub r_squared: f64,
    pub n_obs: usize,
    pub df_resid: usize,
}

/// One row of the coefficient table returned by `/ela`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub var: String,
    pub coef: f64,
    pub pvalue: Option<f64>,
}

impl OlsFit {
    pub fn coefficients(&self) -> Vec<Coefficient> {
        [INTERCEPT, LOG_PRICE]
            .iter()
            .enumerate()
            .map(|(i, name)| Coefficient {
                var: name.to_string(),
                coef: self.params[i],
                pvalue: self.pvalues.map(|p| p[i]),
            })
            .collect()
    }
}

/// Fit `y = b0 + b1 * x` by ordinary least squares on the design `[1, x]`.
pub fn fit_ols(y: &[f64], x: &[f64]) -> AnalysisResult<OlsFit> {
    let n = y.len().min(x.len());
    if n < MIN_ROWS {
        return Err(AnalysisError::InsufficientData {
            rows: n,
            needed: MIN_ROWS,
        });
    }
    if y[..n].iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFinite { column: "y" });
    }
    if x[..n].iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFinite { column: "x" });
    }

    let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { x[i] });
    let response = DVector::from_column_slice(&y[..n]);

    let svd = design.clone().svd(true, true);
    let tolerance = RANK_TOLERANCE * svd.singular_values.max();
    if svd.rank(tolerance) < 2 {
        return Err(AnalysisError::SingularDesign);
    }
    let beta = svd
        .solve(&response, tolerance)
        .map_err(|_| AnalysisError::SingularDesign)?;

    let residuals = &response - &design * &beta;
    let sse = residuals.norm_squared();
    let y_mean = response.mean();
    let sst: f64 = response.iter().map(|yi| (yi - y_mean).powi(2)).sum();
    let r_squared = if sst > 0.0 { 1.0 - sse / sst } else { f64::NAN };

    let df_resid = n - 2;
    let (std_errors, t_values, pvalues) = if df_resid == 0 {
        (None, None, None)
    } else {
        let xtx_inv = (design.transpose() * &design)
            .try_inverse()
            .ok_or(AnalysisError::SingularDesign)?;
        let sigma2 = sse / df_resid as f64;

        let se = [
            (sigma2 * xtx_inv[(0, 0)]).sqrt(),
            (sigma2 * xtx_inv[(1, 1)]).sqrt(),
        ];
        let t = [beta[0] / se[0], beta[1] / se[1]];

        let dist = StudentsT::new(0.0, 1.0, df_resid as f64).map_err(|_| {
            AnalysisError::InsufficientData {
                rows: n,
                needed: MIN_ROWS + 1,
            }
        })?;
        let p = [two_sided_p(&dist, t[0]), two_sided_p(&dist, t[1])];

        (Some(se), Some(t), Some(p))
    };

    Ok(OlsFit {
        params: [beta[0], beta[1]],
        std_errors,
        t_values,
        pvalues,
        r_squared,
        n_obs: n,
        df_resid,
    })
}

fn two_sided_p(dist: &StudentsT, t: f64) -> f64 {
    if t.is_nan() {
        f64::NAN
    } else if t.is_infinite() {
        0.0
    } else {
        2.0 * dist.sf(t.abs())
    }
}

// ============================================================================
// ELASTICITY PIPELINE
// ============================================================================

/// Transform the frame and fit houses_sold on price.
/// Checks run in order: too few rows, then non-finite transformed values.
pub fn fit_elasticity(frame: &ModelFrame) -> AnalysisResult<OlsFit> {
    if frame.len() < MIN_ROWS {
        return Err(AnalysisError::InsufficientData {
            rows: frame.len(),
            needed: MIN_ROWS,
        });
    }

    let x = log1p_column(&frame.rows, Column::AveragePrice);
    let y = log1p_column(&frame.rows, Column::HousesSold);

    if x.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFinite {
            column: Column::AveragePrice.name(),
        });
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFinite {
            column: Column::HousesSold.name(),
        });
    }

    fit_ols(&y, &x)
}

/// Fitted elasticity model for one area
pub fn fit_area(dataset: &Dataset, area: &str) -> AnalysisResult<OlsFit> {
    let rows: Vec<&Observation> = dataset.for_area(area).collect();
    if rows.is_empty() {
        return Err(AnalysisError::EmptySelection {
            area: area.to_string(),
        });
    }

    let frame = ModelFrame::from_rows(rows);
    let fit = fit_elasticity(&frame)?;

    debug!(
        area,
        n_obs = fit.n_obs,
        intercept = fit.params[0],
        slope = fit.params[1],
        "elasticity model fitted"
    );
    Ok(fit)
}

/// Coefficient table for one area: "Intercept" then "log(Price)".
pub fn elasticity_summary(dataset: &Dataset, area: &str) -> AnalysisResult<Vec<Coefficient>> {
    fit_area(dataset, area).map(|fit| fit.coefficients())
}
