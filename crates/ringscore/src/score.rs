//! Distance-to-ring mapping and impact angles.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side of the canonical frame the presets are expressed in.
pub const REFERENCE_SIZE: f64 = 500.0;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ScoreTableError {
    #[error("ring bounds must be finite and non-negative")]
    NotFinite,
    #[error("ring 10 lower bound {inner_min} exceeds its upper bound {first}")]
    InnerAboveFirst { inner_min: f64, first: f64 },
    #[error("ring bound {index} ({value}) is not above the previous bound")]
    NotIncreasing { index: usize, value: f64 },
    #[error("unknown calibration preset `{0}` (expected `uniform` or `measured`)")]
    UnknownPreset(String),
}

/// Ten contiguous distance bands, ring 10 innermost.
///
/// Ring 10 covers `[inner_min, upper_bounds[0]]`, ring `10 - k` covers
/// `(upper_bounds[k - 1], upper_bounds[k]]`; anything else scores 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawScoreTable")]
pub struct ScoreTable {
    inner_min: f64,
    upper_bounds: [f64; 10],
}

#[derive(Deserialize)]
struct RawScoreTable {
    inner_min: f64,
    upper_bounds: [f64; 10],
}

impl TryFrom<RawScoreTable> for ScoreTable {
    type Error = ScoreTableError;

    fn try_from(raw: RawScoreTable) -> Result<Self, Self::Error> {
        Self::new(raw.inner_min, raw.upper_bounds)
    }
}

impl ScoreTable {
    pub fn new(inner_min: f64, upper_bounds: [f64; 10]) -> Result<Self, ScoreTableError> {
        if !inner_min.is_finite()
            || inner_min < 0.0
            || upper_bounds.iter().any(|b| !b.is_finite())
        {
            return Err(ScoreTableError::NotFinite);
        }
        if inner_min > upper_bounds[0] {
            return Err(ScoreTableError::InnerAboveFirst {
                inner_min,
                first: upper_bounds[0],
            });
        }
        for (index, pair) in upper_bounds.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(ScoreTableError::NotIncreasing {
                    index: index + 1,
                    value: pair[1],
                });
            }
        }
        Ok(Self {
            inner_min,
            upper_bounds,
        })
    }

    pub fn inner_min(&self) -> f64 {
        self.inner_min
    }

    pub fn upper_bounds(&self) -> &[f64; 10] {
        &self.upper_bounds
    }

    /// Ring value `1..=10`, or 0 outside the table.
    pub fn ring_for_distance(&self, distance: f64) -> u8 {
        if distance.is_nan() || distance < self.inner_min {
            return 0;
        }
        self.upper_bounds
            .iter()
            .position(|&ub| distance <= ub)
            .map_or(0, |k| 10 - k as u8)
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            inner_min: self.inner_min * factor,
            upper_bounds: self.upper_bounds.map(|b| b * factor),
        }
    }
}

/// Named calibrations measured for the 500-unit canonical frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationPreset {
    /// Centered target, 24-unit rings from a 12-unit bullseye.
    Uniform,
    /// Off-center target with hand-measured ring edges.
    Measured,
}

impl FromStr for CalibrationPreset {
    type Err = ScoreTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(Self::Uniform),
            "measured" => Ok(Self::Measured),
            other => Err(ScoreTableError::UnknownPreset(other.to_string())),
        }
    }
}

impl fmt::Display for CalibrationPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uniform => "uniform",
            Self::Measured => "measured",
        })
    }
}

/// Target center and ring table in canonical coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoringCalibration {
    pub center: Point2<f64>,
    pub table: ScoreTable,
}

impl ScoringCalibration {
    pub fn preset(preset: CalibrationPreset) -> Self {
        match preset {
            CalibrationPreset::Uniform => Self {
                center: Point2::new(250.0, 250.0),
                table: ScoreTable {
                    inner_min: 0.0,
                    upper_bounds: std::array::from_fn(|k| 12.0 + 24.0 * k as f64),
                },
            },
            CalibrationPreset::Measured => Self {
                center: Point2::new(255.0, 244.0),
                table: ScoreTable {
                    inner_min: 10.0,
                    upper_bounds: [
                        23.0, 53.0, 79.0, 105.0, 135.0, 162.0, 188.0, 215.0, 242.0, 268.0,
                    ],
                },
            },
        }
    }

    /// Rescale from the 500-unit reference frame to `canonical_size`.
    pub fn scaled_to(&self, canonical_size: u32) -> Self {
        let factor = canonical_size as f64 / REFERENCE_SIZE;
        Self {
            center: Point2::new(self.center.x * factor, self.center.y * factor),
            table: self.table.scaled(factor),
        }
    }
}

impl Default for ScoringCalibration {
    fn default() -> Self {
        Self::preset(CalibrationPreset::Measured)
    }
}

/// Ring and direction of one impact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub ring: u8,
    /// Degrees in `[-180, 180]`, image y axis pointing down.
    pub angle: i32,
}

#[derive(Clone, Debug, Default)]
pub struct ScoreMapper {
    calibration: ScoringCalibration,
}

impl ScoreMapper {
    pub fn new(calibration: ScoringCalibration) -> Self {
        Self { calibration }
    }

    pub fn calibration(&self) -> &ScoringCalibration {
        &self.calibration
    }

    pub fn score(&self, point: Point2<f64>) -> Score {
        let c = self.calibration.center;
        let distance = (point - c).norm();
        Score {
            ring: self.calibration.table.ring_for_distance(distance),
            angle: angle_deg(point.x - c.x, point.y - c.y),
        }
    }
}

/// `atan2` in whole degrees, ties to even. A zero `dx` always reads -90,
/// also below the center.
pub fn angle_deg(dx: f64, dy: f64) -> i32 {
    if dx == 0.0 {
        return -90;
    }
    dy.atan2(dx).to_degrees().round_ties_even() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured() -> ScoreMapper {
        ScoreMapper::new(ScoringCalibration::preset(CalibrationPreset::Measured))
    }

    #[test]
    fn uniform_ring_edges_are_inclusive_above() {
        let table = ScoringCalibration::preset(CalibrationPreset::Uniform).table;
        assert_eq!(table.ring_for_distance(0.0), 10);
        assert_eq!(table.ring_for_distance(12.0), 10);
        assert_eq!(table.ring_for_distance(12.0001), 9);
        assert_eq!(table.ring_for_distance(36.0), 9);
        assert_eq!(table.ring_for_distance(204.5), 1);
        assert_eq!(table.ring_for_distance(228.0), 1);
        assert_eq!(table.ring_for_distance(228.01), 0);
        assert_eq!(table.ring_for_distance(f64::NAN), 0);
    }

    #[test]
    fn measured_table_has_a_dead_center() {
        let mapper = measured();
        assert_eq!(mapper.score(Point2::new(255.0, 244.0)).ring, 0);
        assert_eq!(mapper.score(Point2::new(265.0, 244.0)).ring, 10);
        assert_eq!(mapper.score(Point2::new(278.0, 244.0)).ring, 10);
        assert_eq!(mapper.score(Point2::new(279.0, 244.0)).ring, 9);
        assert_eq!(mapper.score(Point2::new(255.0, 244.0 + 268.0)).ring, 1);
        assert_eq!(mapper.score(Point2::new(255.0, 244.0 + 269.0)).ring, 0);
    }

    #[test]
    fn every_distance_falls_in_exactly_one_band() {
        let table = ScoringCalibration::preset(CalibrationPreset::Measured).table;
        let mut prev = 0u8;
        let mut d = 0.0;
        while d < 300.0 {
            let ring = table.ring_for_distance(d);
            assert!(ring <= 10);
            if d >= 10.0 && prev != 0 {
                // Rings only decrease outwards.
                assert!(ring <= prev, "d={d} ring={ring} prev={prev}");
            }
            prev = ring;
            d += 0.25;
        }
    }

    #[test]
    fn angles_follow_image_axes() {
        assert_eq!(angle_deg(10.0, 0.0), 0);
        assert_eq!(angle_deg(10.0, 10.0), 45);
        assert_eq!(angle_deg(-10.0, 0.0), 180);
        assert_eq!(angle_deg(-10.0, -10.0), -135);
        assert_eq!(angle_deg(0.0, 25.0), -90);
        assert_eq!(angle_deg(0.0, -25.0), -90);
    }

    #[test]
    fn angle_depends_only_on_direction() {
        for k in 1..20 {
            let s = k as f64 * 3.7;
            assert_eq!(angle_deg(3.0 * s, -2.0 * s), angle_deg(3.0, -2.0));
        }
    }

    #[test]
    fn validation_rejects_bad_tables() {
        let mut bounds = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0];
        assert!(ScoreTable::new(0.0, bounds).is_ok());
        assert!(matches!(
            ScoreTable::new(15.0, bounds),
            Err(ScoreTableError::InnerAboveFirst { .. })
        ));
        bounds[4] = 40.0;
        assert_eq!(
            ScoreTable::new(0.0, bounds),
            Err(ScoreTableError::NotIncreasing {
                index: 4,
                value: 40.0
            })
        );
        bounds[4] = f64::INFINITY;
        assert_eq!(ScoreTable::new(0.0, bounds), Err(ScoreTableError::NotFinite));
    }

    #[test]
    fn table_json_is_validated() {
        let ok: ScoreTable = serde_json::from_str(
            r#"{"inner_min": 0, "upper_bounds": [1,2,3,4,5,6,7,8,9,10]}"#,
        )
        .expect("valid");
        assert_eq!(ok.ring_for_distance(5.5), 5);
        let bad = serde_json::from_str::<ScoreTable>(
            r#"{"inner_min": 0, "upper_bounds": [1,2,3,4,5,5,7,8,9,10]}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn scaling_keeps_relative_geometry() {
        let base = ScoringCalibration::preset(CalibrationPreset::Measured);
        let big = base.scaled_to(1000);
        assert_eq!(big.center, Point2::new(510.0, 488.0));
        assert_eq!(big.table.upper_bounds()[9], 536.0);
        let p = Point2::new(300.0, 200.0);
        let q = Point2::new(600.0, 400.0);
        assert_eq!(
            ScoreMapper::new(base).score(p),
            ScoreMapper::new(big).score(q)
        );
    }

    #[test]
    fn preset_names_parse() {
        assert_eq!("uniform".parse(), Ok(CalibrationPreset::Uniform));
        assert_eq!("measured".parse(), Ok(CalibrationPreset::Measured));
        assert!("other".parse::<CalibrationPreset>().is_err());
        assert_eq!(CalibrationPreset::Measured.to_string(), "measured");
    }
}
