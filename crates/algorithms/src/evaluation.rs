//! Scoring counterfactuals against observed values
//!
//! Run an estimator on a placebo set, where the "treated" points were never
//! actually disturbed, and the error between observed outcomes and their
//! counterfactuals measures how well the estimator recovers reality.

use serde::{Deserialize, Serialize};

use regen_core::{Error, PointTable, Result};

fn check_pair(observed: &[f64], predicted: &[f64]) -> Result<()> {
    if observed.is_empty() {
        return Err(Error::EmptyInput("evaluation samples"));
    }
    if observed.len() != predicted.len() {
        return Err(Error::invalid_param(
            "predicted",
            predicted.len(),
            format!("expected {} values", observed.len()),
        ));
    }
    Ok(())
}

/// Mean squared error
pub fn mse(observed: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(observed, predicted)?;
    let sum: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(o, p)| (o - p) * (o - p))
        .sum();
    Ok(sum / observed.len() as f64)
}

/// Root mean squared error
pub fn rmse(observed: &[f64], predicted: &[f64]) -> Result<f64> {
    Ok(mse(observed, predicted)?.sqrt())
}

/// Coefficient of determination, `1 - SS_res / SS_tot`.
///
/// With constant observations (`SS_tot == 0`) the score is 1 for a perfect
/// prediction and 0 otherwise.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(observed, predicted)?;
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;

    let ss_res: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(o, p)| (o - p) * (o - p))
        .sum();
    let ss_tot: f64 = observed.iter().map(|o| (o - mean) * (o - mean)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Error summary of one counterfactual column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlScore {
    pub mse: f64,
    pub rmse: f64,
    pub r_squared: f64,
    /// Rows scored
    pub samples: usize,
}

/// Score `counterfactual` against `observed` over rows where both are finite.
pub fn score_counterfactual(
    table: &PointTable,
    observed: &str,
    counterfactual: &str,
) -> Result<ControlScore> {
    let rows = table.finite_rows(&[observed, counterfactual])?;
    let obs_col = table.column(observed)?;
    let cf_col = table.column(counterfactual)?;
    let obs: Vec<f64> = rows.iter().map(|&r| obs_col[r]).collect();
    let cf: Vec<f64> = rows.iter().map(|&r| cf_col[r]).collect();

    let mse = mse(&obs, &cf)?;
    Ok(ControlScore {
        mse,
        rmse: mse.sqrt(),
        r_squared: r_squared(&obs, &cf)?,
        samples: obs.len(),
    })
}
