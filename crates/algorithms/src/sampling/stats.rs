//! Summary statistics of a sampled window

/// Statistics of one flattened kernel window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub mean: f64,
    /// Population standard deviation (ddof = 0)
    pub std: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl WindowStats {
    const MISSING: WindowStats = WindowStats {
        mean: f64::NAN,
        std: f64::NAN,
        median: f64::NAN,
        min: f64::NAN,
        max: f64::NAN,
    };

    /// Compute statistics over `values`.
    ///
    /// A window holding any NaN (or no values at all) has every statistic NaN.
    pub fn compute(values: impl IntoIterator<Item = f64>) -> Self {
        let mut vals: Vec<f64> = values.into_iter().collect();
        if vals.is_empty() || vals.iter().any(|v| v.is_nan()) {
            return Self::MISSING;
        }

        let n = vals.len() as f64;
        let mean = vals.iter().sum::<f64>() / n;
        let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

        vals.sort_by(f64::total_cmp);
        let count = vals.len();
        let median = if count % 2 == 0 {
            (vals[count / 2 - 1] + vals[count / 2]) / 2.0
        } else {
            vals[count / 2]
        };

        Self {
            mean,
            std: var.sqrt(),
            median,
            min: vals[0],
            max: vals[count - 1],
        }
    }
}
