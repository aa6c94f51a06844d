use serde::{Deserialize, Serialize};

/// Per-cell soil and climate measurements, as read from the grid source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoilAttributes {
    /// Mean field capacity.
    pub field_capacity_mean: f64,
    /// Number of weather stations contributing to the cell.
    pub station_count: u32,
    /// Slope class (three-class scheme).
    pub slope_class: f64,
    pub porosity_mean: f64,
    /// Mean permanent wilting point.
    pub wilting_point: f64,
    pub moist_threshold: f64,
    pub intermediate_threshold: f64,
    pub dry_threshold: f64,
}

/// Number of physical fields taking part in homogeneity and distance tests.
pub const COMPARED_FIELDS: usize = 7;

impl SoilAttributes {
    /// The physical soil properties, in source column order.
    /// Station count is a sampling figure and is left out.
    #[inline]
    pub fn physical(&self) -> [f64; COMPARED_FIELDS] {
        [
            self.field_capacity_mean,
            self.slope_class,
            self.porosity_mean,
            self.wilting_point,
            self.moist_threshold,
            self.intermediate_threshold,
            self.dry_threshold,
        ]
    }

    /// Exact component-wise equality of the physical fields.
    pub fn same_physical(&self, other: &Self) -> bool {
        self.physical() == other.physical()
    }

    /// Largest absolute difference over the physical fields (Chebyshev distance).
    /// NaN in either operand yields `f64::INFINITY`.
    pub fn max_deviation(&self, other: &Self) -> f64 {
        self.physical()
            .iter()
            .zip(other.physical().iter())
            .map(|(a, b)| {
                let d = (a - b).abs();
                if d.is_nan() { f64::INFINITY } else { d }
            })
            .fold(0.0, f64::max)
    }

    /// Area-weighted mean of the physical fields; station counts are summed.
    ///
    /// Weights are the base-cell areas of the parts. Returns `None` for an
    /// empty slice or zero total area.
    pub fn weighted_mean(parts: &[(SoilAttributes, u64)]) -> Option<SoilAttributes> {
        let total: u64 = parts.iter().map(|&(_, area)| area).sum();
        if total == 0 {
            return None;
        }
        let mut acc = [0.0f64; COMPARED_FIELDS];
        let mut stations = 0u32;
        for (attrs, area) in parts {
            let w = *area as f64 / total as f64;
            for (slot, v) in acc.iter_mut().zip(attrs.physical()) {
                *slot += v * w;
            }
            stations = stations.saturating_add(attrs.station_count);
        }
        Some(SoilAttributes {
            field_capacity_mean: acc[0],
            station_count: stations,
            slope_class: acc[1],
            porosity_mean: acc[2],
            wilting_point: acc[3],
            moist_threshold: acc[4],
            intermediate_threshold: acc[5],
            dry_threshold: acc[6],
        })
    }
}
