//! Point-to-raster sampling
//!
//! Projects irregular query points (lidar shots) onto a [`RasterGrid`] and
//! summarises a small pixel neighbourhood per band:
//!
//! - **1x1**: raw value of the nearest pixel, column `<band>`
//! - **2x2 / 3x3**: `<band>_mean`, `<band>_std`, `<band>_median`, and
//!   optionally `<band>_min`, `<band>_max` and the raw windows
//!
//! Points whose 2x2 or 3x3 box leaves the grid are dropped from the output.
//! This is a filter, not an error: [`SampleOutput::dropped`] reports how many
//! rows were removed.

mod kernel;
mod stats;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::maybe_rayon::*;
use regen_core::{Algorithm, Error, PointTable, RasterGrid, Result};

pub use kernel::{KernelSpec, PixelIndexBox};
pub use stats::WindowStats;

/// Parameters for raster sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerParams {
    /// Pixel neighbourhood sampled around each point
    pub kernel: KernelSpec,
    /// Also emit `<band>_min` and `<band>_max`
    pub include_extrema: bool,
    /// Also return the raw flattened windows (2x2 and 3x3 only)
    pub keep_windows: bool,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            kernel: KernelSpec::Single,
            include_extrema: false,
            keep_windows: false,
        }
    }
}

/// Raw window values of one band
#[derive(Debug, Clone)]
pub struct BandWindows {
    /// `<band>_2x2` or `<band>_3x3`
    pub name: String,
    /// One row per output point, one column per kernel pixel
    /// (column index outer, row index inner)
    pub values: Array2<f64>,
}

/// Result of sampling a point table
#[derive(Debug, Clone)]
pub struct SampleOutput {
    /// Copy of the input rows with valid kernel boxes, plus the new columns
    pub table: PointTable,
    /// Raw windows, when requested
    pub windows: Vec<BandWindows>,
    /// Number of input points dropped because their box left the grid
    pub dropped: usize,
}

/// Samples one raster grid with a fixed configuration.
///
/// # Example
///
/// ```ignore
/// let sampler = RasterSampler::new(&terrain, SamplerParams {
///     kernel: KernelSpec::Square3,
///     ..Default::default()
/// });
/// let sampled = sampler.sample(&shots)?;
/// let slope = sampled.table.column("slope_mean")?;
/// ```
#[derive(Debug, Clone)]
pub struct RasterSampler<'a> {
    grid: &'a RasterGrid,
    params: SamplerParams,
}

impl<'a> RasterSampler<'a> {
    pub fn new(grid: &'a RasterGrid, params: SamplerParams) -> Self {
        Self { grid, params }
    }

    pub fn params(&self) -> &SamplerParams {
        &self.params
    }

    /// Locate the kernel box of every point without reading band values
    pub fn locate(&self, points: &PointTable) -> Vec<PixelIndexBox> {
        let (xs, ys) = (points.xs(), points.ys());
        let kernel = self.params.kernel;
        (0..points.len())
            .into_par_iter()
            .map(|i| PixelIndexBox::locate(self.grid, kernel, xs[i], ys[i]))
            .collect()
    }

    /// Sample every band of the grid at every point of `points`.
    ///
    /// # Errors
    /// - [`Error::CrsMismatch`] if the table's CRS differs from the grid's
    /// - [`Error::NonFiniteValue`] if any point has a NaN or infinite coordinate
    pub fn sample(&self, points: &PointTable) -> Result<SampleOutput> {
        self.grid.crs().ensure_matches(points.crs())?;
        points.ensure_finite_coords()?;

        let kernel = self.params.kernel;
        let boxes = self.locate(points);
        let kept: Vec<usize> = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.valid)
            .map(|(i, _)| i)
            .collect();
        let dropped = points.len() - kept.len();
        if dropped > 0 {
            debug!(dropped, %kernel, "dropping points whose kernel box leaves the grid");
        }

        let mut table = points.select(&kept)?;
        let mut windows = Vec::new();
        let cells = kernel.cells();

        for band in self.grid.bands() {
            let data = band.data();
            let window = Array2::from_shape_fn((kept.len(), cells), |(i, j)| {
                let (r, c) = boxes[kept[i]].cell(j);
                data[(r, c)]
            });

            if kernel == KernelSpec::Single {
                table.set_column(band.name(), window.column(0).to_vec())?;
                continue;
            }

            let stats: Vec<WindowStats> = (0..kept.len())
                .into_par_iter()
                .map(|i| WindowStats::compute(window.row(i).iter().copied()))
                .collect();

            let name = band.name();
            let column = |f: fn(&WindowStats) -> f64| stats.iter().map(f).collect::<Vec<f64>>();
            table.set_column(format!("{name}_mean"), column(|s| s.mean))?;
            table.set_column(format!("{name}_std"), column(|s| s.std))?;
            table.set_column(format!("{name}_median"), column(|s| s.median))?;
            if self.params.include_extrema {
                table.set_column(format!("{name}_min"), column(|s| s.min))?;
                table.set_column(format!("{name}_max"), column(|s| s.max))?;
            }

            if self.params.keep_windows {
                windows.push(BandWindows {
                    name: format!("{name}_{kernel}"),
                    values: window,
                });
            }
        }

        info!(
            points = points.len(),
            sampled = table.len(),
            bands = self.grid.band_count(),
            %kernel,
            "sampled raster"
        );

        Ok(SampleOutput {
            table,
            windows,
            dropped,
        })
    }
}

fn sample_with(grid: &RasterGrid, points: &PointTable, kernel: KernelSpec) -> Result<SampleOutput> {
    RasterSampler::new(
        grid,
        SamplerParams {
            kernel,
            ..Default::default()
        },
    )
    .sample(points)
}

/// Raw value of the nearest pixel of every band
pub fn sample_1x1(grid: &RasterGrid, points: &PointTable) -> Result<SampleOutput> {
    sample_with(grid, points, KernelSpec::Single)
}

/// Mean, std and median over the 2x2 box straddling each point
pub fn sample_2x2(grid: &RasterGrid, points: &PointTable) -> Result<SampleOutput> {
    sample_with(grid, points, KernelSpec::Square2)
}

/// Mean, std and median over the 3x3 box centred on each point's pixel
pub fn sample_3x3(grid: &RasterGrid, points: &PointTable) -> Result<SampleOutput> {
    sample_with(grid, points, KernelSpec::Square3)
}

/// Raster sampling as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct RasterSampling;

impl Algorithm for RasterSampling {
    type Input = (RasterGrid, PointTable);
    type Output = SampleOutput;
    type Params = SamplerParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "RasterSampling"
    }

    fn description(&self) -> &'static str {
        "Sample raster bands at query points with 1x1, 2x2 or 3x3 neighbourhood statistics"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (grid, points) = input;
        RasterSampler::new(&grid, params).sample(&points)
    }
}
