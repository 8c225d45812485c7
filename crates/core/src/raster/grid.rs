//! Multi-band raster grid

use ndarray::{Array2, ArrayView2};

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{CoordinateAxis, GeoTransform};

/// One named band of a [`RasterGrid`]
#[derive(Debug, Clone)]
pub struct Band {
    name: String,
    data: Array2<f64>,
}

impl Band {
    pub fn new(name: impl Into<String>, data: Array2<f64>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Band values indexed `(row, col)`
    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }
}

/// An immutable multi-band raster on a regular, axis-aligned grid.
///
/// Rows follow `y_coords` and columns follow `x_coords`; every band has shape
/// `(y_coords.len(), x_coords.len())`. Grids are built once by a loader and
/// only read afterwards, so they can be shared freely across threads.
///
/// # Example
///
/// ```ignore
/// use ndarray::Array2;
/// use regen_core::{CRS, RasterGrid};
/// use regen_core::raster::Band;
///
/// let elevation = Array2::from_elem((3, 4), 1200.0);
/// let grid = RasterGrid::new(
///     vec![Band::new("elevation", elevation)],
///     vec![0.0, 30.0, 60.0, 90.0],
///     vec![60.0, 30.0, 0.0],
///     CRS::california_albers(),
/// )?;
/// assert_eq!(grid.shape(), (3, 4));
/// ```
#[derive(Debug, Clone)]
pub struct RasterGrid {
    bands: Vec<Band>,
    x: CoordinateAxis,
    y: CoordinateAxis,
    crs: CRS,
}

impl RasterGrid {
    /// Assemble a grid from bands and per-axis coordinates.
    ///
    /// Fails if there are no bands, band names repeat, an axis is not
    /// regularly spaced, or a band's shape differs from `(rows, cols)`.
    pub fn new(
        bands: Vec<Band>,
        x_coords: impl Into<ndarray::Array1<f64>>,
        y_coords: impl Into<ndarray::Array1<f64>>,
        crs: CRS,
    ) -> Result<Self> {
        let x = CoordinateAxis::new(x_coords)?;
        let y = CoordinateAxis::new(y_coords)?;

        if bands.is_empty() {
            return Err(Error::InvalidGrid("raster has no bands".into()));
        }

        let (rows, cols) = (y.len(), x.len());
        for (i, band) in bands.iter().enumerate() {
            let (ar, ac) = band.data.dim();
            if (ar, ac) != (rows, cols) {
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar,
                    ac,
                });
            }
            if bands[..i].iter().any(|b| b.name == band.name) {
                return Err(Error::DuplicateColumn(band.name.clone()));
            }
        }

        Ok(Self { bands, x, y, crs })
    }

    /// Assemble a grid whose axes are the pixel centres of `transform`.
    ///
    /// The shape is taken from the first band. Rotated transforms have no
    /// per-axis coordinates and are rejected.
    pub fn from_transform(bands: Vec<Band>, transform: &GeoTransform, crs: CRS) -> Result<Self> {
        if !transform.is_axis_aligned() {
            return Err(Error::InvalidGrid(
                "rotated geotransforms cannot be expressed as coordinate axes".into(),
            ));
        }
        let (rows, cols) = bands
            .first()
            .map(|b| b.data.dim())
            .ok_or_else(|| Error::InvalidGrid("raster has no bands".into()))?;

        Self::new(
            bands,
            transform.x_centers(cols),
            transform.y_centers(rows),
            crs,
        )
    }

    pub fn rows(&self) -> usize {
        self.y.len()
    }

    pub fn cols(&self) -> usize {
        self.x.len()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    pub fn x_axis(&self) -> &CoordinateAxis {
        &self.x
    }

    pub fn y_axis(&self) -> &CoordinateAxis {
        &self.y
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.bands.iter().map(|b| b.name.as_str())
    }

    /// Look up a band by name
    pub fn band(&self, name: &str) -> Result<&Band> {
        self.bands
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /// Value of band `band` at `(row, col)`, or `None` when out of range
    pub fn value(&self, band: usize, row: usize, col: usize) -> Option<f64> {
        self.bands
            .get(band)
            .and_then(|b| b.data.get((row, col)))
            .copied()
    }
}
