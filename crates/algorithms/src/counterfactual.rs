//! Counterfactual estimators
//!
//! Each estimator fills `<outcome>_cf` columns on a copy of the treated
//! (burned) table with values derived from untreated (unburned) points:
//!
//! - [`NearbyEstimator`]: reduce the outcome over the `k` geographically
//!   nearest untreated shots (haversine)
//! - [`MatchingEstimator`]: take the outcome of the untreated shot(s) closest
//!   in covariate space (Mahalanobis, covariance of the untreated set)

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::matching::{MatchIndex, Metric, Reduce, Reducer, aggregate};
use regen_core::{PointTable, Result};

/// Common interface of the counterfactual estimators
pub trait CounterfactualEstimator {
    fn name(&self) -> &'static str;

    /// Copy of `treated` (possibly filtered) with `<outcome>_cf` columns
    fn generate(&self, treated: &PointTable, untreated: &PointTable) -> Result<PointTable>;
}

/// Name of the counterfactual column for `outcome`
pub fn cf_column(outcome: &str) -> String {
    format!("{outcome}_cf")
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Counterfactual from the `k` nearest untreated locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NearbyEstimator {
    pub outcomes: Vec<String>,
    pub k: usize,
    pub estimator: Reducer,
}

impl Default for NearbyEstimator {
    fn default() -> Self {
        Self {
            outcomes: to_strings(&["pai", "ndvi", "rh_98", "rh_70", "rh_50", "cover"]),
            k: 100,
            estimator: Reducer::Mean,
        }
    }
}

impl CounterfactualEstimator for NearbyEstimator {
    fn name(&self) -> &'static str {
        "nearby"
    }

    /// Both tables must be in the same geographic CRS.
    fn generate(&self, treated: &PointTable, untreated: &PointTable) -> Result<PointTable> {
        info!(k = self.k, estimator = ?self.estimator, "finding nearby untreated shots");
        let index = MatchIndex::build(untreated, Metric::Haversine)?;
        let matches = index.query(treated, self.k)?;

        let mut out = treated.clone();
        for outcome in &self.outcomes {
            let cf = aggregate(&matches, untreated, outcome, &self.estimator)?;
            out.set_column(cf_column(outcome), cf)?;
        }
        Ok(out)
    }
}

/// Standardised mean difference of one covariate after matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceDiagnostic {
    pub column: String,
    /// `|mean(treated) - mean(matched)| / std(treated)`, std with ddof = 1
    pub std_diff: f64,
}

/// Matched treated rows plus covariate balance
#[derive(Debug, Clone)]
pub struct MatchingOutcome {
    /// Treated rows with complete covariates, `<outcome>_cf` and
    /// `match_distance` columns
    pub table: PointTable,
    pub balance: Vec<BalanceDiagnostic>,
}

/// Counterfactual from covariate matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingEstimator {
    pub covariates: Vec<String>,
    pub outcomes: Vec<String>,
    /// Matched controls per treated row; their outcomes are averaged
    pub k: usize,
}

impl Default for MatchingEstimator {
    fn default() -> Self {
        Self {
            covariates: to_strings(&["elevation", "slope", "ndvi_2019", "ndvi_2015", "ndvi_2010"]),
            outcomes: to_strings(&[
                "pai",
                "rh_98",
                "rh_70",
                "rh_50",
                "cover",
                "ndvi_2020",
                "ndvi_2021",
                "ndvi_2022",
            ]),
            k: 1,
        }
    }
}

impl MatchingEstimator {
    /// Match treated rows to untreated rows and report covariate balance.
    ///
    /// Rows missing any covariate are dropped from both tables first. The
    /// covariance is estimated from the remaining untreated rows.
    pub fn generate_with_balance(
        &self,
        treated: &PointTable,
        untreated: &PointTable,
    ) -> Result<MatchingOutcome> {
        let covariates: Vec<&str> = self.covariates.iter().map(String::as_str).collect();
        let treated = treated.drop_missing(&covariates)?;
        let untreated = untreated.drop_missing(&covariates)?;

        info!(
            treated = treated.len(),
            untreated = untreated.len(),
            "matching on covariates"
        );
        let metric = Metric::mahalanobis_from(&untreated, &covariates)?;
        let index = MatchIndex::build(&untreated, metric)?;
        let matches = index.query(&treated, self.k)?;

        let mut balance = Vec::with_capacity(covariates.len());
        for name in &covariates {
            let treated_vals = treated.column(name)?;
            let matched = untreated.column(name)?;
            let matched_mean = matches.indices.iter().map(|&i| matched[i]).sum::<f64>()
                / matches.indices.len() as f64;

            let n = treated_vals.len() as f64;
            let mean = treated_vals.iter().sum::<f64>() / n;
            let var = treated_vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            let std_diff = (mean - matched_mean).abs() / var.sqrt();

            info!(column = %name, std_diff, "covariate balance");
            balance.push(BalanceDiagnostic {
                column: name.to_string(),
                std_diff,
            });
        }

        let mut table = treated;
        for outcome in &self.outcomes {
            let cf = aggregate(&matches, &untreated, outcome, &Reducer::Mean)?;
            table.set_column(cf_column(outcome), cf)?;
        }
        table.set_column("match_distance", matches.distances.column(0).to_vec())?;

        Ok(MatchingOutcome { table, balance })
    }
}

impl CounterfactualEstimator for MatchingEstimator {
    fn name(&self) -> &'static str {
        "matching"
    }

    fn generate(&self, treated: &PointTable, untreated: &PointTable) -> Result<PointTable> {
        Ok(self.generate_with_balance(treated, untreated)?.table)
    }
}

/// Nearby counterfactuals with a custom reducer
pub fn nearby_counterfactuals<R: Reduce>(
    treated: &PointTable,
    untreated: &PointTable,
    outcomes: &[&str],
    k: usize,
    reducer: &R,
) -> Result<PointTable> {
    let index = MatchIndex::build(untreated, Metric::Haversine)?;
    let matches = index.query(treated, k)?;

    let mut out = treated.clone();
    for outcome in outcomes {
        out.set_column(cf_column(outcome), aggregate(&matches, untreated, outcome, reducer)?)?;
    }
    Ok(out)
}
