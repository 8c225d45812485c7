//! # regen algorithms
//!
//! Sampling, matching and partitioning for post-fire recovery analysis.
//!
//! ## Modules
//!
//! - **sampling**: 1x1, 2x2 and 3x3 kernel sampling of raster bands at points
//! - **matching**: k-NN matching under haversine or Mahalanobis distance,
//!   with aggregation of matched values
//! - **placebo**: placebo / calibration split with simulated disturbances
//! - **counterfactual**: nearby and matching counterfactual estimators
//! - **evaluation**: MSE, RMSE and R² of counterfactuals

mod maybe_rayon;

pub mod counterfactual;
pub mod evaluation;
pub mod matching;
pub mod placebo;
pub mod sampling;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::counterfactual::{
        BalanceDiagnostic, CounterfactualEstimator, MatchingEstimator, MatchingOutcome,
        NearbyEstimator,
    };
    pub use crate::evaluation::{ControlScore, mse, r_squared, rmse, score_counterfactual};
    pub use crate::matching::{
        MatchIndex, MatchParams, MatchResult, Metric, NearestNeighborMatching, Reduce, Reducer,
        aggregate, build_index, covariance_matrix, nearest_neighbors,
    };
    pub use crate::placebo::{
        PlaceboParams, PlaceboPartitioner, PlaceboPartitioning, PlaceboSplit, create_placebo_split,
    };
    pub use crate::sampling::{
        KernelSpec, RasterSampler, RasterSampling, SampleOutput, SamplerParams, sample_1x1,
        sample_2x2, sample_3x3,
    };
    pub use regen_core::prelude::*;
}
