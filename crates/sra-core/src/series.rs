//! Bus-indexed hourly series.
//!
//! Load and renewable injections are both stored as a dense `hours x buses`
//! table whose columns follow the network's bus order. A study horizon longer
//! than the series wraps around to hour 0.

use crate::error::{SraError, SraResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusSeries {
    pub name: String,
    width: usize,
    rows: Vec<Vec<f64>>,
}

impl BusSeries {
    /// Build from hourly rows. Every row must have `width` entries and there
    /// must be at least one hour.
    pub fn new(name: impl Into<String>, width: usize, rows: Vec<Vec<f64>>) -> SraResult<Self> {
        let name = name.into();
        if rows.is_empty() {
            return Err(SraError::Parse(format!("series '{name}' has no hours")));
        }
        if let Some((hour, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(SraError::Parse(format!(
                "series '{name}' hour {hour} has {} columns, expected {width}",
                row.len()
            )));
        }
        Ok(Self { name, width, rows })
    }

    /// The same per-bus values repeated for `hours` hours.
    pub fn constant(name: impl Into<String>, values: Vec<f64>, hours: usize) -> Self {
        Self {
            name: name.into(),
            width: values.len(),
            rows: vec![values; hours.max(1)],
        }
    }

    pub fn zeros(name: impl Into<String>, width: usize, hours: usize) -> Self {
        Self::constant(name, vec![0.0; width], hours)
    }

    pub fn hours(&self) -> usize {
        self.rows.len()
    }

    /// Number of bus columns
    pub fn width(&self) -> usize {
        self.width
    }

    /// Per-bus values at `hour`, wrapping past the end of the series.
    pub fn at(&self, hour: usize) -> &[f64] {
        &self.rows[hour % self.rows.len()]
    }

    pub fn total_at(&self, hour: usize) -> f64 {
        self.at(hour).iter().sum()
    }

    /// Largest system-wide total over the stored hours.
    pub fn peak_total(&self) -> f64 {
        self.rows
            .iter()
            .map(|row| row.iter().sum::<f64>())
            .fold(0.0, f64::max)
    }

    /// Overwrite a single entry; out-of-range indices are ignored.
    pub fn set(&mut self, hour: usize, bus: usize, value: f64) {
        if let Some(cell) = self.rows.get_mut(hour).and_then(|row| row.get_mut(bus)) {
            *cell = value;
        }
    }

    /// First negative or non-finite entry as `(hour, bus, value)`.
    pub fn find_invalid(&self) -> Option<(usize, usize, f64)> {
        self.rows.iter().enumerate().find_map(|(hour, row)| {
            row.iter()
                .enumerate()
                .find(|(_, v)| !v.is_finite() || **v < 0.0)
                .map(|(bus, v)| (hour, bus, *v))
        })
    }
}
