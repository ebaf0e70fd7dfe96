//! Simplified WHO growth percentiles (3rd and 97th) by age in months.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A growth measurement with an age table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthMetric {
    /// Weight in kg.
    Weight,
    /// Height in cm.
    Height,
}

impl fmt::Display for GrowthMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weight => write!(f, "Weight"),
            Self::Height => write!(f, "Height"),
        }
    }
}

/// The normal band for one age breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileBand {
    /// 3rd percentile.
    pub p3: f64,
    /// 97th percentile.
    pub p97: f64,
}

const fn band(p3: f64, p97: f64) -> PercentileBand {
    PercentileBand { p3, p97 }
}

// (age in months, band), sorted by age.
const WEIGHT: [(f64, PercentileBand); 9] = [
    (0.0, band(2.5, 4.2)),
    (1.0, band(3.2, 5.4)),
    (2.0, band(3.9, 6.6)),
    (3.0, band(4.5, 7.5)),
    (6.0, band(5.7, 8.9)),
    (9.0, band(6.6, 10.0)),
    (12.0, band(7.3, 11.0)),
    (18.0, band(8.1, 12.2)),
    (24.0, band(8.8, 13.2)),
];
const WEIGHT_FALLBACK: PercentileBand = band(2.5, 15.0);

const HEIGHT: [(f64, PercentileBand); 9] = [
    (0.0, band(46.0, 54.0)),
    (1.0, band(50.0, 58.0)),
    (2.0, band(54.0, 62.0)),
    (3.0, band(57.0, 65.0)),
    (6.0, band(61.0, 70.0)),
    (9.0, band(64.0, 73.0)),
    (12.0, band(67.0, 76.0)),
    (18.0, band(71.0, 80.0)),
    (24.0, band(75.0, 84.0)),
];
const HEIGHT_FALLBACK: PercentileBand = band(46.0, 100.0);

impl GrowthMetric {
    fn table(self) -> (&'static [(f64, PercentileBand)], PercentileBand) {
        match self {
            Self::Weight => (&WEIGHT, WEIGHT_FALLBACK),
            Self::Height => (&HEIGHT, HEIGHT_FALLBACK),
        }
    }

    /// Band for `age_months`: the greatest breakpoint at or below the age.
    ///
    /// Ages below the first breakpoint use the first one. Ages past the last
    /// breakpoint use the wide fallback band.
    #[must_use]
    pub fn band_for(self, age_months: f64) -> PercentileBand {
        let (table, fallback) = self.table();
        let Some(&(last_age, _)) = table.last() else {
            return fallback;
        };
        if age_months > last_age {
            return fallback;
        }
        table
            .iter()
            .take_while(|(age, _)| *age <= age_months)
            .last()
            .or_else(|| table.first())
            .map_or(fallback, |&(_, b)| b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_breakpoint() {
        assert_eq!(GrowthMetric::Weight.band_for(12.0), band(7.3, 11.0));
        assert_eq!(GrowthMetric::Height.band_for(0.0), band(46.0, 54.0));
    }

    #[test]
    fn test_between_breakpoints_rounds_down() {
        assert_eq!(GrowthMetric::Weight.band_for(8.0), band(5.7, 8.9));
        assert_eq!(GrowthMetric::Height.band_for(23.9), band(71.0, 80.0));
    }

    #[test]
    fn test_below_first_breakpoint() {
        assert_eq!(GrowthMetric::Weight.band_for(-1.0), band(2.5, 4.2));
    }

    #[test]
    fn test_past_last_breakpoint_uses_fallback() {
        assert_eq!(GrowthMetric::Weight.band_for(24.0), band(8.8, 13.2));
        assert_eq!(GrowthMetric::Weight.band_for(30.0), WEIGHT_FALLBACK);
        assert_eq!(GrowthMetric::Height.band_for(36.0), HEIGHT_FALLBACK);
    }
}
