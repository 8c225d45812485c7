//! Reduction of matched candidate values to one scalar per query

use serde::{Deserialize, Serialize};

use super::MatchResult;
use crate::maybe_rayon::*;
use crate::sampling::WindowStats;
use regen_core::{Error, PointTable, Result};

/// Built-in reducers over the values of a query's matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    #[default]
    Mean,
    Median,
    Min,
    Max,
}

/// Anything that folds a slice of matched values into one value.
///
/// Implemented for [`Reducer`] and for any `Fn(&[f64]) -> f64`.
pub trait Reduce: Sync {
    fn reduce(&self, values: &[f64]) -> f64;
}

impl Reduce for Reducer {
    /// Missing (non-finite) values are skipped; NaN if none are left.
    fn reduce(&self, values: &[f64]) -> f64 {
        let stats = WindowStats::compute(values.iter().copied().filter(|v| v.is_finite()));
        match self {
            Reducer::Mean => stats.mean,
            Reducer::Median => stats.median,
            Reducer::Min => stats.min,
            Reducer::Max => stats.max,
        }
    }
}

impl<F> Reduce for F
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    fn reduce(&self, values: &[f64]) -> f64 {
        self(values)
    }
}

/// Reduce `column` of `candidates` over each query's matches.
///
/// `result` must come from an index built on `candidates`.
///
/// # Errors
/// - [`Error::MissingColumn`] if `column` does not exist
/// - [`Error::InvalidParameter`] if a match index is out of range for the table
pub fn aggregate<R>(
    result: &MatchResult,
    candidates: &PointTable,
    column: &str,
    reducer: &R,
) -> Result<Vec<f64>>
where
    R: Reduce + ?Sized,
{
    let values = candidates.column(column)?;
    if let Some(&bad) = result.indices.iter().find(|&&i| i >= values.len()) {
        return Err(Error::invalid_param(
            "match index",
            bad,
            format!("candidate table has {} rows", values.len()),
        ));
    }

    Ok((0..result.len())
        .into_par_iter()
        .map(|q| {
            let matched: Vec<f64> = result.indices.row(q).iter().map(|&i| values[i]).collect();
            reducer.reduce(&matched)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use regen_core::CRS;

    fn candidates() -> PointTable {
        PointTable::from_coords(
            vec![1, 2, 3, 4],
            vec![0.0; 4],
            vec![0.0; 4],
            CRS::california_albers(),
        )
        .unwrap()
        .with_column("agbd", vec![10.0, 20.0, 40.0, f64::NAN])
        .unwrap()
    }

    fn result() -> MatchResult {
        MatchResult {
            indices: array![[0, 1, 2], [2, 1, 0], [0, 3, 1]],
            distances: array![[0.0, 1.0, 2.0], [0.0, 1.0, 2.0], [0.0, 1.0, 2.0]],
        }
    }

    #[test]
    fn test_builtin_reducers() {
        let (r, t) = (result(), candidates());
        let mean = aggregate(&r, &t, "agbd", &Reducer::Mean).unwrap();
        assert_relative_eq!(mean[0], 70.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(mean[1], mean[0]);
        // the NaN match is skipped
        assert_relative_eq!(mean[2], 15.0);

        let median = aggregate(&r, &t, "agbd", &Reducer::Median).unwrap();
        assert_eq!(median[0], 20.0);
        assert_eq!(aggregate(&r, &t, "agbd", &Reducer::Max).unwrap()[1], 40.0);
        assert_eq!(aggregate(&r, &t, "agbd", &Reducer::Min).unwrap()[0], 10.0);
    }

    #[test]
    fn test_builtin_reducers_skip_missing_matches() {
        let t = candidates()
            .with_column("pai", vec![2.0, f64::NAN, 6.0, f64::NAN])
            .unwrap();
        let r = MatchResult {
            indices: array![[0, 1, 2], [1, 3, 1]],
            distances: array![[0.0, 1.0, 2.0], [0.0, 1.0, 2.0]],
        };
        let mean = aggregate(&r, &t, "pai", &Reducer::Mean).unwrap();
        assert_eq!(mean[0], 4.0);
        assert!(mean[1].is_nan());
        assert_eq!(aggregate(&r, &t, "pai", &Reducer::Median).unwrap()[0], 4.0);
        assert_eq!(aggregate(&r, &t, "pai", &Reducer::Min).unwrap()[0], 2.0);
        assert_eq!(aggregate(&r, &t, "pai", &Reducer::Max).unwrap()[0], 6.0);
    }

    #[test]
    fn test_closure_reducer() {
        let first = aggregate(&result(), &candidates(), "agbd", &|v: &[f64]| v[0]).unwrap();
        assert_eq!(first[..2], [10.0, 40.0]);

        let count_valid = |v: &[f64]| v.iter().filter(|x| !x.is_nan()).count() as f64;
        let counts = aggregate(&result(), &candidates(), "agbd", &count_valid).unwrap();
        assert_eq!(counts, vec![3.0, 3.0, 2.0]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            aggregate(&result(), &candidates(), "rh98", &Reducer::Mean),
            Err(Error::MissingColumn(_))
        ));

        let short = candidates().select(&[0, 1]).unwrap();
        assert!(aggregate(&result(), &short, "agbd", &Reducer::Mean).is_err());
    }
}
