//! End-to-end scenarios across sampling, matching and placebo partitioning.

use approx::assert_relative_eq;
use ndarray::Array2;
use regen_algorithms::evaluation::score_counterfactual;
use regen_algorithms::matching::{
    MatchParams, Metric, Reducer, aggregate, build_index, nearest_neighbors,
};
use regen_algorithms::placebo::{PlaceboParams, create_placebo_split};
use regen_algorithms::prelude::*;
use regen_algorithms::sampling::{KernelSpec, RasterSampler, SamplerParams};

/// 100 unburned shots on a 10 x 10 lon/lat lattice, ~0.001 degree apart
fn unburned_lattice() -> PointTable {
    let n = 100;
    PointTable::from_coords(
        (0..n as u64).collect(),
        (0..n).map(|i| -120.5 + (i % 10) as f64 * 0.001).collect(),
        (0..n).map(|i| 39.1 + (i / 10) as f64 * 0.001).collect(),
        CRS::wgs84(),
    )
    .unwrap()
    .with_column("agbd", vec![50.0; n])
    .unwrap()
}

#[test]
fn constant_agbd_aggregates_to_exact_value() {
    let unburned = unburned_lattice();
    let burned = PointTable::from_coords(
        vec![1000, 1001],
        vec![-120.4955, -120.51],
        vec![39.1045, 39.09],
        CRS::wgs84(),
    )
    .unwrap();

    let result = nearest_neighbors(
        &unburned,
        &burned,
        &MatchParams {
            metric: Metric::Haversine,
            k: 20,
        },
    )
    .unwrap();
    assert_eq!(result.indices.dim(), (2, 20));

    let cf = aggregate(&result, &unburned, "agbd", &Reducer::Mean).unwrap();
    assert_eq!(cf, vec![50.0, 50.0]);
}

#[test]
fn haversine_self_query_has_zero_first_distance() {
    let unburned = unburned_lattice();
    let index = build_index(&unburned, Metric::Haversine).unwrap();
    let result = index.query(&unburned, 3).unwrap();
    for q in 0..unburned.len() {
        assert_eq!(result.indices[[q, 0]], q);
        assert_eq!(result.distances[[q, 0]], 0.0);
        // lattice neighbours are roughly 86 m (east) or 111 m (north) away
        assert!(result.distances[[q, 1]] > 80.0 && result.distances[[q, 1]] < 120.0);
    }
}

#[test]
fn mahalanobis_leave_one_out_equals_nearest_other_value() {
    let table = PointTable::from_coords(
        vec![1, 2, 3, 4, 5, 6],
        vec![0.0; 6],
        vec![0.0; 6],
        CRS::california_albers(),
    )
    .unwrap()
    .with_column("elevation", vec![100.0, 110.0, 400.0, 415.0, 900.0, 880.0])
    .unwrap()
    .with_column("agbd", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
    .unwrap();

    let metric = Metric::mahalanobis_from(&table, &["elevation"]).unwrap();
    let index = build_index(&table, metric).unwrap();
    let result = index.query(&table, 2).unwrap().without_first();
    assert_eq!(result.k(), 1);

    let loo = aggregate(&result, &table, "agbd", &Reducer::Mean).unwrap();
    assert_eq!(loo, vec![2.0, 1.0, 4.0, 3.0, 6.0, 5.0]);
}

#[test]
fn sampled_covariates_feed_matching() {
    // 6 x 6 projected grid, 30 m pixels, elevation rises to the east
    let elevation = Array2::from_shape_fn((6, 6), |(_, c)| 1000.0 + 50.0 * c as f64);
    let slope = Array2::from_shape_fn((6, 6), |(r, _)| 5.0 + r as f64);
    let grid = RasterGrid::new(
        vec![Band::new("elevation", elevation), Band::new("slope", slope)],
        (0..6).map(|i| i as f64 * 30.0).collect::<Vec<_>>(),
        (0..6).map(|i| i as f64 * 30.0).collect::<Vec<_>>(),
        CRS::california_albers(),
    )
    .unwrap();

    let shots = PointTable::from_coords(
        vec![1, 2, 3, 4],
        vec![31.0, 61.0, 119.0, 0.0],
        vec![31.0, 89.0, 61.0, 150.0],
        CRS::california_albers(),
    )
    .unwrap();

    let sampler = RasterSampler::new(
        &grid,
        SamplerParams {
            kernel: KernelSpec::Square3,
            ..Default::default()
        },
    );
    let sampled = sampler.sample(&shots).unwrap();
    assert_eq!(sampled.dropped, 1);
    assert_eq!(sampled.table.ids(), &[1, 2, 3]);

    let elev = sampled.table.column("elevation_mean").unwrap();
    assert_relative_eq!(elev[0], 1050.0);
    assert_relative_eq!(elev[1], 1100.0);
    assert_relative_eq!(elev[2], 1200.0);
    assert_relative_eq!(sampled.table.column("slope_mean").unwrap()[1], 8.0);

    let metric = Metric::Mahalanobis {
        columns: vec!["elevation_mean".into(), "slope_mean".into()],
        covariance: Array2::eye(2),
    };
    let index = build_index(&sampled.table, metric).unwrap();
    let result = index.query(&sampled.table, 2).unwrap();
    assert_eq!(result.indices[[0, 1]], 1);
}

#[test]
fn placebo_split_scores_a_nearby_estimator() {
    // projected lattice: 25 x 25 shots, 30 m apart, smooth biomass gradient
    let n = 625;
    let xs: Vec<f64> = (0..n).map(|i| (i % 25) as f64 * 30.0).collect();
    let ys: Vec<f64> = (0..n).map(|i| (i / 25) as f64 * 30.0).collect();
    let agbd: Vec<f64> = xs.iter().zip(&ys).map(|(x, y)| 40.0 + x / 30.0 + y / 60.0).collect();
    let untreated = PointTable::from_coords((0..n as u64).collect(), xs, ys, CRS::california_albers())
        .unwrap()
        .with_column("agbd", agbd)
        .unwrap();

    let split = create_placebo_split(
        &untreated,
        &[10_000.0, 40_000.0],
        PlaceboParams {
            coverage: 0.2,
            seed: Some(2024),
        },
    )
    .unwrap();
    assert!(split.placebo.len() >= 125);
    assert_eq!(split.placebo.len() + split.calibration.len(), n);

    let (placebo, calibration) = split.tables(&untreated).unwrap();
    let mut placebo_ids = split.placebo_ids(&untreated).unwrap();
    placebo_ids.sort_unstable();
    let calibration_ids = split.calibration_ids(&untreated).unwrap();
    assert!(placebo_ids.iter().all(|id| calibration_ids.binary_search(id).is_err()));

    // Projected coordinates go through Mahalanobis on x/y features with an
    // identity covariance, which is plain Euclidean distance.
    let placebo = with_xy(placebo);
    let calibration = with_xy(calibration);
    let index = build_index(
        &calibration,
        Metric::Mahalanobis {
            columns: vec!["px".into(), "py".into()],
            covariance: Array2::eye(2),
        },
    )
    .unwrap();
    let result = index.query(&placebo, 4).unwrap();
    let mut scored = placebo.clone();
    scored
        .set_column("agbd_cf", aggregate(&result, &calibration, "agbd", &Reducer::Mean).unwrap())
        .unwrap();

    let score = score_counterfactual(&scored, "agbd", "agbd_cf").unwrap();
    assert_eq!(score.samples, placebo.len());
    assert!(score.rmse.is_finite());
    assert!(score.r_squared <= 1.0);
}

fn with_xy(table: PointTable) -> PointTable {
    let (px, py) = (table.xs().to_vec(), table.ys().to_vec());
    table
        .with_column("px", px)
        .unwrap()
        .with_column("py", py)
        .unwrap()
}
