//! Raster grids and their coordinate axes

mod axis;
mod geotransform;
mod grid;

pub use axis::CoordinateAxis;
pub use geotransform::GeoTransform;
pub use grid::{Band, RasterGrid};
