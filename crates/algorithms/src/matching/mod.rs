//! Nearest-neighbour matching
//!
//! A [`MatchIndex`] is built once over a candidate [`PointTable`] (typically
//! unburned shots) and answers k-NN queries for any number of query tables:
//!
//! - [`Metric::Haversine`]: great-circle distance in meters between
//!   longitude/latitude locations
//! - [`Metric::Mahalanobis`]: covariance-scaled distance between named
//!   feature columns, with a caller-supplied covariance
//!
//! The index never excludes self-matches. Query a table against itself and
//! use [`MatchResult::without_first`] to drop the trivial match.

mod aggregate;
mod kdtree;
mod metric;

use ndarray::{Array2, s};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::maybe_rayon::*;
use regen_core::{Algorithm, CRS, Error, PointTable, Result};

pub use aggregate::{Reduce, Reducer, aggregate};
pub use kdtree::{KdTree, Neighbor};
pub use metric::{
    EARTH_RADIUS_M, Whitener, chord_to_meters, covariance_matrix, haversine_distance, unit_vector,
};

/// Distance used to rank candidates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Metric {
    /// Great-circle distance; `x` is longitude and `y` latitude in degrees
    #[default]
    Haversine,
    /// Mahalanobis distance over `columns` under a fixed `d×d` covariance
    Mahalanobis {
        columns: Vec<String>,
        covariance: Array2<f64>,
    },
}

impl Metric {
    /// Mahalanobis metric whose covariance is estimated from `table` (ddof = 1)
    pub fn mahalanobis_from(table: &PointTable, columns: &[&str]) -> Result<Self> {
        let features = table.feature_matrix(columns)?;
        Ok(Metric::Mahalanobis {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            covariance: covariance_matrix(features.view())?,
        })
    }

    fn name(&self) -> &'static str {
        match self {
            Metric::Haversine => "haversine",
            Metric::Mahalanobis { .. } => "mahalanobis",
        }
    }
}

/// k-NN query output, one row per query
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// `(n_queries, k)` rows of the candidate table
    pub indices: Array2<usize>,
    /// `(n_queries, k)` distances, ascending per row.
    /// Meters for haversine, unitless for Mahalanobis.
    pub distances: Array2<f64>,
}

impl MatchResult {
    /// Number of queries
    pub fn len(&self) -> usize {
        self.indices.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matches per query
    pub fn k(&self) -> usize {
        self.indices.ncols()
    }

    /// Drop the first match of every row (the self-match when a table is
    /// queried against itself)
    pub fn without_first(&self) -> Self {
        let from = self.k().min(1);
        Self {
            indices: self.indices.slice(s![.., from..]).to_owned(),
            distances: self.distances.slice(s![.., from..]).to_owned(),
        }
    }
}

/// Immutable search structure over a candidate set
#[derive(Debug, Clone)]
pub struct MatchIndex {
    metric: Metric,
    tree: KdTree,
    whitener: Option<Whitener>,
    crs: CRS,
}

impl MatchIndex {
    /// Build an index over `candidates`.
    ///
    /// # Errors
    /// - [`Error::EmptyInput`] for an empty candidate table
    /// - [`Error::CrsMismatch`] for haversine on a projected table
    /// - [`Error::NonFiniteValue`] for NaN/infinite coordinates or features
    /// - [`Error::InvalidParameter`] / [`Error::SingularMatrix`] for a
    ///   covariance that does not fit the columns or is not positive definite
    pub fn build(candidates: &PointTable, metric: Metric) -> Result<Self> {
        if candidates.is_empty() {
            return Err(Error::EmptyInput("candidate table"));
        }

        let whitener = match &metric {
            Metric::Haversine => {
                if !candidates.crs().is_geographic() {
                    return Err(Error::CrsMismatch {
                        expected: "geographic lon/lat".into(),
                        actual: candidates.crs().identifier(),
                    });
                }
                None
            }
            Metric::Mahalanobis {
                columns,
                covariance,
            } => {
                if columns.is_empty() {
                    return Err(Error::EmptyInput("mahalanobis feature columns"));
                }
                if covariance.dim() != (columns.len(), columns.len()) {
                    let (r, c) = covariance.dim();
                    return Err(Error::invalid_param(
                        "covariance",
                        format!("{}x{}", r, c),
                        format!("expected {0}x{0} for {0} columns", columns.len()),
                    ));
                }
                Some(Whitener::new(covariance.view())?)
            }
        };

        let embedded = embed(&metric, whitener.as_ref(), candidates)?;
        let index = Self {
            metric,
            tree: KdTree::build(embedded.view()),
            whitener,
            crs: candidates.crs().clone(),
        };

        debug!(
            metric = index.metric.name(),
            candidates = index.len(),
            "built match index"
        );
        Ok(index)
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// The `k` nearest candidates of every row of `queries`.
    ///
    /// # Errors
    /// - [`Error::InvalidParameter`] if `k == 0`
    /// - [`Error::InvalidK`] if `k` exceeds the number of candidates
    /// - [`Error::CrsMismatch`] if a haversine query table uses another CRS
    /// - [`Error::MissingColumn`] / [`Error::NonFiniteValue`] for unusable features
    pub fn query(&self, queries: &PointTable, k: usize) -> Result<MatchResult> {
        if k == 0 {
            return Err(Error::invalid_param("k", k, "must be at least 1"));
        }
        if k > self.len() {
            return Err(Error::InvalidK {
                k,
                candidates: self.len(),
            });
        }
        if matches!(self.metric, Metric::Haversine) {
            self.crs.ensure_matches(queries.crs())?;
        }

        let embedded = embed(&self.metric, self.whitener.as_ref(), queries)?;
        let n = embedded.nrows();
        let neighbors: Vec<Vec<Neighbor>> = (0..n)
            .into_par_iter()
            .map(|q| {
                let point: Vec<f64> = embedded.row(q).to_vec();
                self.tree.k_nearest(&point, k)
            })
            .collect();

        let mut indices = Array2::<usize>::zeros((n, k));
        let mut distances = Array2::<f64>::zeros((n, k));
        for (q, row) in neighbors.iter().enumerate() {
            for (j, nb) in row.iter().enumerate() {
                indices[[q, j]] = nb.index;
                distances[[q, j]] = match self.metric {
                    Metric::Haversine => chord_to_meters(nb.distance()),
                    Metric::Mahalanobis { .. } => nb.distance(),
                };
            }
        }

        info!(
            metric = self.metric.name(),
            queries = n,
            candidates = self.len(),
            k,
            "matched queries"
        );
        Ok(MatchResult { indices, distances })
    }
}

/// Coordinates of a table in the Euclidean search space of `metric`
fn embed(metric: &Metric, whitener: Option<&Whitener>, table: &PointTable) -> Result<Array2<f64>> {
    match (metric, whitener) {
        (Metric::Mahalanobis { columns, .. }, Some(whitener)) => {
            let names: Vec<&str> = columns.iter().map(String::as_str).collect();
            let features = table.feature_matrix(&names)?;
            Ok(whitener.whiten_rows(features.view()))
        }
        _ => {
            table.ensure_finite_coords()?;
            let (xs, ys) = (table.xs(), table.ys());
            Ok(Array2::from_shape_fn((table.len(), 3), |(i, d)| {
                unit_vector(xs[i], ys[i])[d]
            }))
        }
    }
}

/// Build a [`MatchIndex`] over `candidates`
pub fn build_index(candidates: &PointTable, metric: Metric) -> Result<MatchIndex> {
    MatchIndex::build(candidates, metric)
}

/// Query a prebuilt index
pub fn query(index: &MatchIndex, queries: &PointTable, k: usize) -> Result<MatchResult> {
    index.query(queries, k)
}

/// Parameters for one-shot matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    pub metric: Metric,
    /// Neighbours per query
    pub k: usize,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            metric: Metric::Haversine,
            k: 1,
        }
    }
}

/// Build an index over `candidates` and query it once
pub fn nearest_neighbors(
    candidates: &PointTable,
    queries: &PointTable,
    params: &MatchParams,
) -> Result<MatchResult> {
    MatchIndex::build(candidates, params.metric.clone())?.query(queries, params.k)
}

/// Nearest-neighbour matching as an [`Algorithm`]; input is
/// `(candidates, queries)`
#[derive(Debug, Clone, Default)]
pub struct NearestNeighborMatching;

impl Algorithm for NearestNeighborMatching {
    type Input = (PointTable, PointTable);
    type Output = MatchResult;
    type Params = MatchParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "NearestNeighborMatching"
    }

    fn description(&self) -> &'static str {
        "k nearest candidates per query under haversine or Mahalanobis distance"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (candidates, queries) = input;
        nearest_neighbors(&candidates, &queries, &params)
    }
}
