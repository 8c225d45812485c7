//! # regen core
//!
//! Core types shared by the raster-sampling and spatial-matching engine.
//!
//! This crate provides:
//! - `RasterGrid`: immutable multi-band raster on regular coordinate axes
//! - `PointTable`: columnar table of query/candidate points
//! - `GeoTransform`: affine georeferencing, used to derive grid axes
//! - `CRS`: coordinate reference system tag
//! - The `Algorithm` trait implemented by the engine's operations

pub mod crs;
pub mod error;
pub mod raster;
pub mod table;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{Band, CoordinateAxis, GeoTransform, RasterGrid};
pub use table::{PointId, PointTable};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{Band, GeoTransform, RasterGrid};
    pub use crate::table::{PointId, PointTable};
    pub use crate::Algorithm;
}

/// Common shape of the engine's operations.
///
/// Algorithms are pure functions of their input and parameters; the struct
/// implementing this trait carries no state.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
