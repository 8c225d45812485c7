//! Regularly spaced coordinate axis of a raster grid

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Relative tolerance applied to the pixel step when checking regular spacing.
const SPACING_TOLERANCE: f64 = 1e-6;

/// Monotonic, regularly spaced coordinates of one raster axis.
///
/// Values are pixel coordinates as the loader reports them (for most loaders
/// these are pixel centres). The step may be negative: north-up rasters
/// usually store y coordinates in descending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateAxis {
    values: Array1<f64>,
    step: f64,
}

impl CoordinateAxis {
    /// Validate and wrap a coordinate array.
    ///
    /// Requires at least two finite values with a constant, non-zero step.
    pub fn new(values: impl Into<Array1<f64>>) -> Result<Self> {
        let values = values.into();
        let n = values.len();
        if n < 2 {
            return Err(Error::InvalidGrid(format!(
                "coordinate axis needs at least 2 values, got {}",
                n
            )));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidGrid(format!(
                "non-finite coordinate at index {}",
                i
            )));
        }

        let step = values[1] - values[0];
        if step == 0.0 {
            return Err(Error::InvalidGrid("zero pixel size".into()));
        }

        let tolerance = step.abs() * SPACING_TOLERANCE;
        for i in 1..n {
            let d = values[i] - values[i - 1];
            if (d - step).abs() > tolerance {
                return Err(Error::InvalidGrid(format!(
                    "irregular spacing at index {}: step {} differs from {}",
                    i, d, step
                )));
            }
        }

        Ok(Self { values, step })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Signed pixel size
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    /// Index of the coordinate nearest to `value`.
    ///
    /// Equivalent to an argmin of `|values - value|` (lowest index on ties),
    /// but computed in constant time from the regular spacing: the arithmetic
    /// guess is refined by comparing it with its two neighbours directly.
    /// Values outside the axis resolve to the first or last index.
    pub fn nearest_index(&self, value: f64) -> usize {
        self.nearest_with_offset(value, 0.0)
    }

    /// Two indices whose pixels straddle `value`.
    ///
    /// The nearest index `i0` is searched over the pixel-centre array
    /// `values + step / 2`. The second index is `i0 - 1` when `value` lies
    /// below that centre and `i0 + 1` otherwise. Either may be out of range
    /// at the grid edge.
    pub fn straddling_pair(&self, value: f64) -> [isize; 2] {
        let half = self.step / 2.0;
        let i0 = self.nearest_with_offset(value, half);
        let center = self.values[i0] + half;
        let i0 = i0 as isize;
        if value < center {
            [i0, i0 - 1]
        } else {
            [i0, i0 + 1]
        }
    }

    /// The nearest index and its two neighbours, `[i - 1, i, i + 1]`.
    pub fn centered_triple(&self, value: f64) -> [isize; 3] {
        let i = self.nearest_index(value) as isize;
        [i - 1, i, i + 1]
    }

    /// Whether `index` addresses a pixel on this axis
    pub fn contains(&self, index: isize) -> bool {
        index >= 0 && (index as usize) < self.values.len()
    }

    fn nearest_with_offset(&self, value: f64, offset: f64) -> usize {
        let n = self.values.len();
        let origin = self.values[0] + offset;
        let guess = ((value - origin) / self.step).round();
        let guess = if guess.is_nan() {
            0
        } else {
            guess.clamp(0.0, (n - 1) as f64) as usize
        };

        let lo = guess.saturating_sub(1);
        let hi = (guess + 1).min(n - 1);

        let mut best = lo;
        let mut best_dist = (self.values[lo] + offset - value).abs();
        for i in (lo + 1)..=hi {
            let d = (self.values[i] + offset - value).abs();
            if d < best_dist {
                best = i;
                best_dist = d;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_nearest(values: &[f64], offset: f64, value: f64) -> usize {
        let mut best = 0;
        for i in 1..values.len() {
            if (values[i] + offset - value).abs() < (values[best] + offset - value).abs() {
                best = i;
            }
        }
        best
    }

    #[test]
    fn test_rejects_bad_axes() {
        assert!(CoordinateAxis::new(vec![1.0]).is_err());
        assert!(CoordinateAxis::new(vec![1.0, 1.0, 1.0]).is_err());
        assert!(CoordinateAxis::new(vec![0.0, 1.0, 3.0]).is_err());
        assert!(CoordinateAxis::new(vec![0.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_accepts_descending() {
        let axis = CoordinateAxis::new(vec![40.0, 39.5, 39.0, 38.5]).unwrap();
        assert_eq!(axis.step(), -0.5);
        assert_eq!(axis.nearest_index(39.4), 2);
        assert_eq!(axis.nearest_index(100.0), 0);
        assert_eq!(axis.nearest_index(-100.0), 3);
    }

    #[test]
    fn test_nearest_matches_argmin() {
        let values: Vec<f64> = (0..50).map(|i| -120.0 + i as f64 * 0.00027).collect();
        let axis = CoordinateAxis::new(values.clone()).unwrap();
        for q in 0..400 {
            let v = -120.002 + q as f64 * 0.0000397;
            assert_eq!(axis.nearest_index(v), brute_nearest(&values, 0.0, v), "v = {}", v);
        }
    }

    #[test]
    fn test_nearest_tie_takes_lower_index() {
        let axis = CoordinateAxis::new(vec![0.0, 1.0, 2.0]).unwrap();
        assert_eq!(axis.nearest_index(0.5), 0);
        assert_eq!(axis.nearest_index(1.5), 1);
    }

    #[test]
    fn test_straddling_pair() {
        // centres at 0.5, 1.5, 2.5, 3.5
        let axis = CoordinateAxis::new(vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(axis.straddling_pair(1.6), [1, 2]);
        assert_eq!(axis.straddling_pair(1.4), [1, 0]);
        assert_eq!(axis.straddling_pair(0.2), [0, -1]);
        assert_eq!(axis.straddling_pair(3.9), [3, 4]);
    }

    #[test]
    fn test_straddling_pair_descending() {
        // step -1: centres at 9.5, 8.5, 7.5
        let axis = CoordinateAxis::new(vec![10.0, 9.0, 8.0]).unwrap();
        assert_eq!(axis.straddling_pair(8.6), [1, 2]);
        assert_eq!(axis.straddling_pair(8.4), [1, 0]);
        assert_eq!(axis.straddling_pair(7.4), [2, 1]);
    }

    #[test]
    fn test_centered_triple() {
        let axis = CoordinateAxis::new(vec![0.0, 30.0, 60.0, 90.0]).unwrap();
        assert_eq!(axis.centered_triple(31.0), [0, 1, 2]);
        assert_eq!(axis.centered_triple(2.0), [-1, 0, 1]);
        assert!(!axis.contains(-1));
        assert!(axis.contains(3));
        assert!(!axis.contains(4));
    }
}
