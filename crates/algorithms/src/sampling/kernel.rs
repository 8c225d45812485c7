//! Kernel boxes: which pixels a query point samples

use std::fmt;

use regen_core::{Error, RasterGrid, Result};
use serde::{Deserialize, Serialize};

/// Size of the pixel neighbourhood sampled around each query point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KernelSpec {
    /// The single nearest pixel, raw value
    #[default]
    #[serde(rename = "1x1")]
    Single,
    /// The 2x2 box straddling the point
    #[serde(rename = "2x2")]
    Square2,
    /// The nearest pixel and its 8 neighbours
    #[serde(rename = "3x3")]
    Square3,
}

impl KernelSpec {
    /// Kernel from its edge length (1, 2 or 3)
    pub fn from_size(size: usize) -> Result<Self> {
        match size {
            1 => Ok(KernelSpec::Single),
            2 => Ok(KernelSpec::Square2),
            3 => Ok(KernelSpec::Square3),
            other => Err(Error::invalid_param("kernel", other, "must be 1, 2 or 3")),
        }
    }

    /// Number of pixel indices selected per axis
    pub fn size(self) -> usize {
        match self {
            KernelSpec::Single => 1,
            KernelSpec::Square2 => 2,
            KernelSpec::Square3 => 3,
        }
    }

    /// Number of pixels in the box
    pub fn cells(self) -> usize {
        self.size() * self.size()
    }
}

impl fmt::Display for KernelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{0}x{0}", self.size())
    }
}

/// Row and column indices selected for one query point.
///
/// Indices are signed: near the grid edge the kernel can reach `-1` or
/// `rows`/`cols`, in which case the box is not `valid` and the point is
/// dropped by the sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelIndexBox {
    pub rows: Vec<isize>,
    pub cols: Vec<isize>,
    pub valid: bool,
}

impl PixelIndexBox {
    /// Resolve the kernel box of the point `(x, y)` on `grid`.
    ///
    /// Each axis is handled independently:
    /// - 1x1: the nearest coordinate
    /// - 2x2: nearest pixel centre plus the neighbour on the query's side
    /// - 3x3: nearest coordinate and one index either side
    pub fn locate(grid: &RasterGrid, kernel: KernelSpec, x: f64, y: f64) -> Self {
        let (xa, ya) = (grid.x_axis(), grid.y_axis());

        let (cols, rows): (Vec<isize>, Vec<isize>) = match kernel {
            KernelSpec::Single => (
                vec![xa.nearest_index(x) as isize],
                vec![ya.nearest_index(y) as isize],
            ),
            KernelSpec::Square2 => (
                xa.straddling_pair(x).to_vec(),
                ya.straddling_pair(y).to_vec(),
            ),
            KernelSpec::Square3 => (
                xa.centered_triple(x).to_vec(),
                ya.centered_triple(y).to_vec(),
            ),
        };

        let valid = cols.iter().all(|&c| xa.contains(c)) && rows.iter().all(|&r| ya.contains(r));

        Self { rows, cols, valid }
    }

    /// Number of pixels in the box
    pub fn len(&self) -> usize {
        self.rows.len() * self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `i`-th `(row, col)` of the flattened window.
    ///
    /// Windows are flattened column index outer, row index inner.
    /// Only meaningful on valid boxes.
    pub fn cell(&self, i: usize) -> (usize, usize) {
        let n = self.rows.len();
        (self.rows[i % n] as usize, self.cols[i / n] as usize)
    }
}
