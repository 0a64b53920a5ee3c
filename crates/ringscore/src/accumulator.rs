//! Session-wide score state.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Rings in reporting order.
pub const RINGS_DESC: [u8; 10] = [10, 9, 8, 7, 6, 5, 4, 3, 2, 1];

#[inline]
fn slot(ring: u8) -> Option<usize> {
    (1..=10).contains(&ring).then(|| ring as usize - 1)
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AngleStateError {
    #[error("`{0}` is not a ring label between 1 and 10")]
    InvalidRing(String),
}

/// Angles recorded per ring, as exchanged with the scoring service.
///
/// Serializes as `{"10": [...], "9": [...], ..., "1": [...]}` with every ring
/// present. Deserialization rejects labels outside `1..=10`; missing rings
/// are empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, Vec<i32>>")]
pub struct AngleState {
    rings: [Vec<i32>; 10],
}

impl AngleState {
    pub fn angles(&self, ring: u8) -> &[i32] {
        slot(ring)
            .map(|i| self.rings[i].as_slice())
            .unwrap_or_default()
    }

    /// Points represented by the stored angles: `Σ ring × count`.
    pub fn points(&self) -> u64 {
        RINGS_DESC
            .iter()
            .map(|&r| r as u64 * self.angles(r).len() as u64)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.iter().all(Vec::is_empty)
    }

    fn push(&mut self, ring: u8, angle: i32) {
        if let Some(i) = slot(ring) {
            self.rings[i].push(angle);
        }
    }
}

impl TryFrom<BTreeMap<String, Vec<i32>>> for AngleState {
    type Error = AngleStateError;

    fn try_from(map: BTreeMap<String, Vec<i32>>) -> Result<Self, Self::Error> {
        let mut state = Self::default();
        for (label, angles) in map {
            let i = label
                .trim()
                .parse::<u8>()
                .ok()
                .and_then(slot)
                .ok_or(AngleStateError::InvalidRing(label))?;
            state.rings[i].extend(angles);
        }
        Ok(state)
    }
}

impl Serialize for AngleState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(10))?;
        for ring in RINGS_DESC {
            map.serialize_entry(&ring.to_string(), self.angles(ring))?;
        }
        map.end()
    }
}

/// Counts, angles and total at one instant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScoreSnapshot {
    /// Recorded impacts per ring, index `ring - 1`.
    pub counts: [usize; 10],
    pub angles: AngleState,
    pub total: u64,
}

impl ScoreSnapshot {
    pub fn count(&self, ring: u8) -> usize {
        slot(ring).map_or(0, |i| self.counts[i])
    }
}

/// Append-only score state owned by the pipeline driver.
///
/// Seeded entries carry an angle but no coordinate, so coordinate lists can be
/// shorter than angle lists.
#[derive(Clone, Debug, Default)]
pub struct AccumulatedScore {
    points: [Vec<(i32, i32)>; 10],
    angles: AngleState,
    total: u64,
}

impl AccumulatedScore {
    pub fn new() -> Self {
        Self::default()
    }

    /// State restored from a previous session.
    pub fn seeded(previous: &AngleState) -> Self {
        let mut acc = Self::new();
        acc.seed(previous);
        acc
    }

    /// Append a previous session's angles and add their points to the total.
    pub fn seed(&mut self, previous: &AngleState) {
        for ring in RINGS_DESC {
            for &angle in previous.angles(ring) {
                self.angles.push(ring, angle);
            }
        }
        self.total += previous.points();
    }

    /// Record one scored impact. Ring 0 (and anything above 10) is ignored;
    /// returns whether the impact was recorded.
    pub fn record(&mut self, ring: u8, point: (i32, i32), angle: i32) -> bool {
        let Some(i) = slot(ring) else {
            return false;
        };
        self.points[i].push(point);
        self.angles.push(ring, angle);
        self.total += ring as u64;
        true
    }

    pub fn points(&self, ring: u8) -> &[(i32, i32)] {
        slot(ring)
            .map(|i| self.points[i].as_slice())
            .unwrap_or_default()
    }

    pub fn angles(&self) -> &AngleState {
        &self.angles
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn snapshot(&self) -> ScoreSnapshot {
        ScoreSnapshot {
            counts: std::array::from_fn(|i| self.angles.rings[i].len()),
            angles: self.angles.clone(),
            total: self.total,
        }
    }

    /// `"<ring>:<count>"` for rings 10 down to 1.
    pub fn hud_lines(&self) -> Vec<String> {
        RINGS_DESC
            .iter()
            .map(|&r| format!("{r}:{}", self.angles.angles(r).len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_zero_is_a_no_op() {
        let mut acc = AccumulatedScore::new();
        acc.record(7, (1, 2), 30);
        let before = acc.snapshot();
        for _ in 0..5 {
            assert!(!acc.record(0, (3, 4), 10));
        }
        assert!(!acc.record(11, (3, 4), 10));
        assert_eq!(acc.snapshot(), before);
    }

    #[test]
    fn n_records_add_n_times_ring() {
        let mut acc = AccumulatedScore::new();
        acc.record(3, (0, 0), 0);
        let start = acc.snapshot();
        for k in 0..6 {
            assert!(acc.record(8, (k, k), -k));
        }
        let snap = acc.snapshot();
        assert_eq!(snap.count(8), 6);
        assert_eq!(snap.total, start.total + 6 * 8);
        assert_eq!(snap.angles.angles(8), &[0, -1, -2, -3, -4, -5]);
        assert_eq!(acc.points(8).len(), 6);
    }

    #[test]
    fn seeding_adds_angles_and_points() {
        let state: AngleState = serde_json::from_str(r#"{"5": [10, -10]}"#).expect("json");
        let mut acc = AccumulatedScore::seeded(&state);
        assert_eq!(acc.total(), 10);
        assert_eq!(acc.snapshot().count(5), 2);
        assert!(acc.points(5).is_empty());

        acc.record(5, (100, 100), 45);
        assert_eq!(acc.total(), 15);
        assert_eq!(acc.angles().angles(5), &[10, -10, 45]);
    }

    #[test]
    fn angle_state_json_lists_every_ring_descending() {
        let mut acc = AccumulatedScore::new();
        acc.record(10, (0, 0), 7);
        acc.record(1, (0, 0), -170);
        let json = serde_json::to_string(acc.angles()).expect("json");
        assert_eq!(
            json,
            r#"{"10":[7],"9":[],"8":[],"7":[],"6":[],"5":[],"4":[],"3":[],"2":[],"1":[-170]}"#
        );
    }

    #[test]
    fn angle_state_rejects_unknown_rings() {
        assert!(serde_json::from_str::<AngleState>(r#"{"11": [1]}"#).is_err());
        assert!(serde_json::from_str::<AngleState>(r#"{"x": []}"#).is_err());
        assert!(serde_json::from_str::<AngleState>(r#"{"3": [1.5]}"#).is_err());
        let empty: AngleState = serde_json::from_str("{}").expect("json");
        assert!(empty.is_empty());
    }

    #[test]
    fn hud_lines_count_per_ring() {
        let mut acc = AccumulatedScore::new();
        acc.record(9, (0, 0), 0);
        acc.record(9, (1, 0), 0);
        let lines = acc.hud_lines();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "10:0");
        assert_eq!(lines[1], "9:2");
        assert_eq!(lines[9], "1:0");
    }
}
