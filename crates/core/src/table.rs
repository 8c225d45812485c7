//! Columnar point tables
//!
//! A [`PointTable`] is the batch unit for every operation: GEDI shots,
//! unburned candidates, placebo populations. Rows are independent; each has a
//! unique id, a location and any number of named `f64` feature columns.
//! Missing values are `NaN`.

use ndarray::Array2;

use crate::crs::CRS;
use crate::error::{Error, Result};

/// Unique row key of a point
pub type PointId = u64;

#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    values: Vec<f64>,
}

/// A table of points sharing one CRS.
///
/// `x`/`y` hold the location in the table's CRS (longitude/latitude degrees
/// for geographic systems). Columns keep their insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct PointTable {
    ids: Vec<PointId>,
    x: Vec<f64>,
    y: Vec<f64>,
    columns: Vec<Column>,
    crs: CRS,
}

impl PointTable {
    /// Create an empty table
    pub fn new(crs: CRS) -> Self {
        Self {
            ids: Vec::new(),
            x: Vec::new(),
            y: Vec::new(),
            columns: Vec::new(),
            crs,
        }
    }

    /// Create a table from parallel id/x/y vectors
    pub fn from_coords(ids: Vec<PointId>, x: Vec<f64>, y: Vec<f64>, crs: CRS) -> Result<Self> {
        for (name, len) in [("x", x.len()), ("y", y.len())] {
            if len != ids.len() {
                return Err(Error::ColumnLength {
                    column: name.to_string(),
                    expected: ids.len(),
                    actual: len,
                });
            }
        }

        let mut seen = std::collections::HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(Error::invalid_param("id", dup, "point ids must be unique"));
        }

        Ok(Self {
            ids,
            x,
            y,
            columns: Vec::new(),
            crs,
        })
    }

    /// Builder-style variant of [`PointTable::set_column`]
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.set_column(name, values)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    pub fn ids(&self) -> &[PointId] {
        &self.ids
    }

    pub fn xs(&self) -> &[f64] {
        &self.x
    }

    pub fn ys(&self) -> &[f64] {
        &self.y
    }

    /// Location of row `row`
    pub fn location(&self, row: usize) -> Option<(f64, f64)> {
        Some((*self.x.get(row)?, *self.y.get(row)?))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Values of a named column
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /// Add a column, replacing any existing column of the same name.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(Error::ColumnLength {
                column: name,
                expected: self.len(),
                actual: values.len(),
            });
        }

        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { name, values }),
        }
        Ok(())
    }

    /// New table with the given rows, in the given order, all columns kept.
    pub fn select(&self, rows: &[usize]) -> Result<Self> {
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.len()) {
            return Err(Error::invalid_param(
                "row",
                bad,
                format!("table has {} rows", self.len()),
            ));
        }

        let pick = |v: &[f64]| rows.iter().map(|&r| v[r]).collect::<Vec<_>>();
        let ids: Vec<PointId> = rows.iter().map(|&r| self.ids[r]).collect();

        let mut seen = std::collections::HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(Error::invalid_param("id", dup, "row selected twice"));
        }

        Ok(Self {
            ids,
            x: pick(&self.x),
            y: pick(&self.y),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: pick(&c.values),
                })
                .collect(),
            crs: self.crs.clone(),
        })
    }

    /// Indices of rows whose values in every listed column are finite.
    pub fn finite_rows(&self, columns: &[&str]) -> Result<Vec<usize>> {
        let cols = columns
            .iter()
            .map(|name| self.column(name))
            .collect::<Result<Vec<_>>>()?;

        Ok((0..self.len())
            .filter(|&r| cols.iter().all(|c| c[r].is_finite()))
            .collect())
    }

    /// Copy of the table without rows that are missing any listed column.
    pub fn drop_missing(&self, columns: &[&str]) -> Result<Self> {
        let rows = self.finite_rows(columns)?;
        self.select(&rows)
    }

    /// `(n_rows, columns.len())` matrix of the listed columns.
    ///
    /// Fails with [`Error::NonFiniteValue`] on the first NaN or infinite
    /// value, so callers never feed missing data into a metric.
    pub fn feature_matrix(&self, columns: &[&str]) -> Result<Array2<f64>> {
        let cols = columns
            .iter()
            .map(|name| self.column(name))
            .collect::<Result<Vec<_>>>()?;

        for (name, col) in columns.iter().zip(&cols) {
            if let Some(row) = col.iter().position(|v| !v.is_finite()) {
                return Err(Error::NonFiniteValue {
                    column: name.to_string(),
                    row,
                });
            }
        }

        Ok(Array2::from_shape_fn((self.len(), cols.len()), |(r, c)| {
            cols[c][r]
        }))
    }

    /// Fail with [`Error::NonFiniteValue`] if any coordinate is NaN or infinite.
    pub fn ensure_finite_coords(&self) -> Result<()> {
        for (name, values) in [("x", &self.x), ("y", &self.y)] {
            if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                return Err(Error::NonFiniteValue {
                    column: name.to_string(),
                    row,
                });
            }
        }
        Ok(())
    }
}
