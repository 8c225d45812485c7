//! Distance metrics and the transforms that turn them into Euclidean space
//!
//! Both matching metrics are answered by a Euclidean k-d tree:
//!
//! - **Haversine**: longitude/latitude are embedded on the unit sphere. Chord
//!   length is monotonic in great-circle angle, so neighbour order is the
//!   same; chords are converted back to meters on output.
//! - **Mahalanobis**: with `Σ = L Lᵀ` (Cholesky), `d²(a, b) = ‖L⁻¹a − L⁻¹b‖²`,
//!   so whitening every row once reduces the metric to Euclidean distance.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use regen_core::{Error, Result};

/// Mean Earth radius used for great-circle distances, in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Point on the unit sphere for a longitude/latitude pair in degrees
pub fn unit_vector(lon_deg: f64, lat_deg: f64) -> [f64; 3] {
    let (lon, lat) = (lon_deg.to_radians(), lat_deg.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Great-circle distance in meters for a chord between two unit vectors
pub fn chord_to_meters(chord: f64) -> f64 {
    2.0 * (chord / 2.0).clamp(0.0, 1.0).asin() * EARTH_RADIUS_M
}

/// Haversine distance in meters between two longitude/latitude points
pub fn haversine_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = phi2 - phi1;
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * a.sqrt().clamp(0.0, 1.0).asin() * EARTH_RADIUS_M
}

/// Sample covariance (ddof = 1) of the columns of an `(n, d)` matrix.
pub fn covariance_matrix(data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    let (n, d) = data.dim();
    if n < 2 {
        return Err(Error::invalid_param(
            "rows",
            n,
            "covariance needs at least 2 rows",
        ));
    }
    if d == 0 {
        return Err(Error::EmptyInput("covariance of zero columns"));
    }

    let means = data.sum_axis(Axis(0)) / n as f64;
    let mut cov = Array2::<f64>::zeros((d, d));
    for row in data.rows() {
        for i in 0..d {
            let di = row[i] - means[i];
            for j in i..d {
                cov[[i, j]] += di * (row[j] - means[j]);
            }
        }
    }
    for i in 0..d {
        for j in i..d {
            cov[[i, j]] /= (n - 1) as f64;
            cov[[j, i]] = cov[[i, j]];
        }
    }
    Ok(cov)
}

/// Maps feature vectors into a space where Mahalanobis distance under a
/// fixed covariance becomes Euclidean distance.
#[derive(Debug, Clone, PartialEq)]
pub struct Whitener {
    /// Lower-triangular Cholesky factor of the covariance
    lower: Array2<f64>,
}

impl Whitener {
    /// Factor a covariance matrix.
    ///
    /// # Errors
    /// - [`Error::InvalidParameter`] if the matrix is not square or not symmetric
    /// - [`Error::SingularMatrix`] if it is not positive definite
    pub fn new(covariance: ArrayView2<'_, f64>) -> Result<Self> {
        let (rows, cols) = covariance.dim();
        if rows != cols || rows == 0 {
            return Err(Error::invalid_param(
                "covariance",
                format!("{}x{}", rows, cols),
                "must be a non-empty square matrix",
            ));
        }
        if covariance.iter().any(|v| !v.is_finite()) {
            return Err(Error::invalid_param(
                "covariance",
                "non-finite entry",
                "all entries must be finite",
            ));
        }

        let n = rows;
        let scale = covariance.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        for i in 0..n {
            for j in (i + 1)..n {
                if (covariance[[i, j]] - covariance[[j, i]]).abs() > 1e-9 * scale.max(1.0) {
                    return Err(Error::invalid_param(
                        "covariance",
                        format!("[{i}, {j}] != [{j}, {i}]"),
                        "must be symmetric",
                    ));
                }
            }
        }

        let mut lower = Array2::<f64>::zeros((n, n));
        for j in 0..n {
            let mut diag = covariance[[j, j]];
            for k in 0..j {
                diag -= lower[[j, k]] * lower[[j, k]];
            }
            if diag <= 1e-12 * scale.max(f64::MIN_POSITIVE) {
                return Err(Error::SingularMatrix(format!(
                    "pivot {} is {:.3e} after elimination",
                    j, diag
                )));
            }
            let pivot = diag.sqrt();
            lower[[j, j]] = pivot;

            for i in (j + 1)..n {
                let mut sum = covariance[[i, j]];
                for k in 0..j {
                    sum -= lower[[i, k]] * lower[[j, k]];
                }
                lower[[i, j]] = sum / pivot;
            }
        }

        Ok(Self { lower })
    }

    /// Number of features
    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    /// `L⁻¹ x` by forward substitution
    pub fn whiten(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = self.dim();
        let mut z = Array1::<f64>::zeros(n);
        for i in 0..n {
            let mut sum = x[i];
            for k in 0..i {
                sum -= self.lower[[i, k]] * z[k];
            }
            z[i] = sum / self.lower[[i, i]];
        }
        z
    }

    /// Whiten every row of an `(n, dim)` matrix
    pub fn whiten_rows(&self, data: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros(data.raw_dim());
        for (src, mut dst) in data.rows().into_iter().zip(out.rows_mut()) {
            dst.assign(&self.whiten(src));
        }
        out
    }

    /// Mahalanobis distance between two feature vectors
    pub fn distance(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        let diff = &a - &b;
        self.whiten(diff.view()).iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_haversine_known_distance() {
        // One degree of latitude
        let d = haversine_distance(-120.0, 38.0, -120.0, 39.0);
        assert_relative_eq!(d, EARTH_RADIUS_M * 1f64.to_radians(), epsilon = 1e-6);
        assert_eq!(haversine_distance(-120.5, 39.1, -120.5, 39.1), 0.0);
    }

    #[test]
    fn test_chord_agrees_with_haversine() {
        let pairs = [
            ((-120.0, 38.0), (-121.3, 39.4)),
            ((-118.25, 34.05), (-118.2501, 34.0502)),
            ((10.0, -45.0), (100.0, 30.0)),
        ];
        for ((lon1, lat1), (lon2, lat2)) in pairs {
            let a = unit_vector(lon1, lat1);
            let b = unit_vector(lon2, lat2);
            let chord = a.iter().zip(&b).map(|(p, q)| (p - q) * (p - q)).sum::<f64>().sqrt();
            let expected = haversine_distance(lon1, lat1, lon2, lat2);
            assert_relative_eq!(chord_to_meters(chord), expected, max_relative = 1e-9, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_covariance_matrix() {
        let data = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]];
        let cov = covariance_matrix(data.view()).unwrap();
        // var(x) = 5/3 with ddof = 1
        assert_relative_eq!(cov[[0, 0]], 5.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cov[[0, 1]], 10.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cov[[1, 0]], cov[[0, 1]]);
        assert_relative_eq!(cov[[1, 1]], 20.0 / 3.0, epsilon = 1e-12);

        assert!(covariance_matrix(array![[1.0, 2.0]].view()).is_err());
    }

    #[test]
    fn test_whitener_identity_is_euclidean() {
        let w = Whitener::new(Array2::eye(3).view()).unwrap();
        let a = array![1.0, 2.0, 3.0];
        let b = array![4.0, 6.0, 3.0];
        assert_relative_eq!(w.distance(a.view(), b.view()), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_whitener_matches_inverse_quadratic_form() {
        let cov = array![[4.0, 2.0], [2.0, 3.0]];
        let w = Whitener::new(cov.view()).unwrap();
        // Σ⁻¹ = 1/8 [[3, -2], [-2, 4]]
        let d = array![1.0, -1.0];
        let expected = (d[0] * (3.0 * d[0] - 2.0 * d[1]) + d[1] * (-2.0 * d[0] + 4.0 * d[1])) / 8.0;
        let z = w.whiten(d.view());
        assert_relative_eq!(z.dot(&z), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_whitener_rejects_bad_matrices() {
        assert!(matches!(
            Whitener::new(array![[1.0, 2.0], [2.0, 4.0]].view()),
            Err(Error::SingularMatrix(_))
        ));
        assert!(matches!(
            Whitener::new(array![[1.0, 0.5], [0.0, 1.0]].view()),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(Whitener::new(Array2::<f64>::zeros((2, 3)).view()).is_err());
    }
}
