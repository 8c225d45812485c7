//! Placebo / calibration split of untreated points
//!
//! Builds a placebo test set that looks like real disturbance footprints:
//! circular "fires" are dropped on random untreated points with areas drawn
//! from the historical fire-size distribution, and every untreated point
//! inside a circle moves to the placebo set. Points never captured form the
//! calibration set.
//!
//! Each draw captures at least its own centre, so a run over `N` points ends
//! after at most `N` draws.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::matching::KdTree;
use regen_core::{Algorithm, Error, PointId, PointTable, Result};

/// Parameters for the placebo split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceboParams {
    /// Minimum share of the population placed in the placebo set, in (0, 1]
    pub coverage: f64,
    /// RNG seed; `None` draws a seed from the operating system
    pub seed: Option<u64>,
}

impl Default for PlaceboParams {
    fn default() -> Self {
        Self {
            coverage: 0.2,
            seed: None,
        }
    }
}

/// One simulated disturbance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceboEvent {
    /// Id of the point the circle is centred on
    pub center: PointId,
    /// Area drawn from the historical distribution
    pub area: f64,
    /// `sqrt(area / π)`
    pub radius: f64,
    /// Points newly moved into the placebo set by this draw
    pub captured: usize,
}

/// Disjoint placebo and calibration sets covering the whole input
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceboSplit {
    /// Placebo rows of the input table, in capture order
    pub placebo: Vec<usize>,
    /// Remaining rows, ascending
    pub calibration: Vec<usize>,
    /// Draws in the order they were made
    pub events: Vec<PlaceboEvent>,
}

impl PlaceboSplit {
    /// Ids of the placebo rows
    ///
    /// # Errors
    /// [`Error::InvalidParameter`] if `points` is not the partitioned table
    /// and a row is out of range.
    pub fn placebo_ids(&self, points: &PointTable) -> Result<Vec<PointId>> {
        row_ids(points, &self.placebo)
    }

    /// Ids of the calibration rows, same errors as [`Self::placebo_ids`]
    pub fn calibration_ids(&self, points: &PointTable) -> Result<Vec<PointId>> {
        row_ids(points, &self.calibration)
    }

    /// Materialise `(placebo, calibration)` tables from the partitioned table
    pub fn tables(&self, points: &PointTable) -> Result<(PointTable, PointTable)> {
        Ok((points.select(&self.placebo)?, points.select(&self.calibration)?))
    }
}

fn row_ids(points: &PointTable, rows: &[usize]) -> Result<Vec<PointId>> {
    let ids = points.ids();
    rows.iter()
        .map(|&r| {
            ids.get(r).copied().ok_or_else(|| {
                Error::invalid_param("row", r, format!("table has {} rows", ids.len()))
            })
        })
        .collect()
}

/// Splits untreated points into placebo and calibration sets
#[derive(Debug, Clone)]
pub struct PlaceboPartitioner<'a> {
    areas: &'a [f64],
    params: PlaceboParams,
}

impl<'a> PlaceboPartitioner<'a> {
    /// `areas` are historical disturbance areas in squared CRS units.
    pub fn new(areas: &'a [f64], params: PlaceboParams) -> Self {
        Self { areas, params }
    }

    /// Partition with an RNG seeded from the parameters
    pub fn partition(&self, points: &PointTable) -> Result<PlaceboSplit> {
        let mut rng = match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        self.partition_with_rng(points, &mut rng)
    }

    /// Partition drawing centres and areas from `rng`.
    ///
    /// # Errors
    /// - [`Error::InvalidParameter`] for coverage outside (0, 1], an empty
    ///   area sample or a negative/non-finite area
    /// - [`Error::CrsMismatch`] if `points` is in a geographic CRS
    /// - [`Error::NonFiniteValue`] for NaN/infinite coordinates
    /// - [`Error::PlaceboExhausted`] if the pool empties below the target
    pub fn partition_with_rng<R: Rng>(
        &self,
        points: &PointTable,
        rng: &mut R,
    ) -> Result<PlaceboSplit> {
        self.validate(points)?;

        let n = points.len();
        let coverage = self.params.coverage;
        let target = (coverage * n as f64).ceil() as usize;
        let (xs, ys) = (points.xs(), points.ys());

        let coords = Array2::from_shape_fn((n, 2), |(i, d)| if d == 0 { xs[i] } else { ys[i] });
        let tree = KdTree::build(coords.view());

        // `remaining` is unordered; `slot[i]` is the position of row i in it
        let mut remaining: Vec<usize> = (0..n).collect();
        let mut slot: Vec<usize> = (0..n).collect();
        let mut assigned = vec![false; n];
        let mut placebo = Vec::with_capacity(target);
        let mut events = Vec::new();

        while (placebo.len() as f64) < coverage * n as f64 {
            if remaining.is_empty() {
                return Err(Error::PlaceboExhausted {
                    placebo: placebo.len(),
                    target,
                    total: n,
                });
            }
            debug!(placebo = placebo.len(), "placebo set size");

            let center = remaining[rng.random_range(0..remaining.len())];
            let area = self.areas[rng.random_range(0..self.areas.len())];
            let radius = (area / std::f64::consts::PI).sqrt();
            debug!(center = points.ids()[center], radius, "placebo draw");

            let mut captured = 0;
            for nb in tree.within_radius(&[xs[center], ys[center]], radius) {
                if assigned[nb.index] {
                    continue;
                }
                assigned[nb.index] = true;

                let pos = slot[nb.index];
                remaining.swap_remove(pos);
                if let Some(&moved) = remaining.get(pos) {
                    slot[moved] = pos;
                }
                placebo.push(nb.index);
                captured += 1;
            }

            events.push(PlaceboEvent {
                center: points.ids()[center],
                area,
                radius,
                captured,
            });
            debug!(
                captured,
                placebo = placebo.len(),
                remaining = remaining.len(),
                "placebo draw applied"
            );
        }

        remaining.sort_unstable();
        info!(
            points = n,
            placebo = placebo.len(),
            calibration = remaining.len(),
            draws = events.len(),
            "created placebo split"
        );

        Ok(PlaceboSplit {
            placebo,
            calibration: remaining,
            events,
        })
    }

    fn validate(&self, points: &PointTable) -> Result<()> {
        let coverage = self.params.coverage;
        if !(coverage > 0.0 && coverage <= 1.0) {
            return Err(Error::invalid_param(
                "coverage",
                coverage,
                "must lie in (0, 1]",
            ));
        }
        if self.areas.is_empty() {
            return Err(Error::invalid_param(
                "areas",
                "[]",
                "need at least one historical area",
            ));
        }
        if let Some(bad) = self.areas.iter().find(|a| !a.is_finite() || **a < 0.0) {
            return Err(Error::invalid_param(
                "areas",
                bad,
                "areas must be finite and non-negative",
            ));
        }
        if points.crs().is_geographic() {
            return Err(Error::CrsMismatch {
                expected: "projected CRS".into(),
                actual: points.crs().identifier(),
            });
        }
        points.ensure_finite_coords()
    }
}

/// Split `untreated` into placebo and calibration sets
pub fn create_placebo_split(
    untreated: &PointTable,
    areas: &[f64],
    params: PlaceboParams,
) -> Result<PlaceboSplit> {
    PlaceboPartitioner::new(areas, params).partition(untreated)
}

/// Placebo partitioning as an [`Algorithm`]; input is `(untreated, areas)`
#[derive(Debug, Clone, Default)]
pub struct PlaceboPartitioning;

impl Algorithm for PlaceboPartitioning {
    type Input = (PointTable, Vec<f64>);
    type Output = PlaceboSplit;
    type Params = PlaceboParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "PlaceboPartitioning"
    }

    fn description(&self) -> &'static str {
        "Split untreated points into placebo and calibration sets with simulated disturbance circles"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (untreated, areas) = input;
        create_placebo_split(&untreated, &areas, params)
    }
}
