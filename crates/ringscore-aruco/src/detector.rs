//! Full-frame marker detection.

use crate::builtins::builtin_dictionary;
use crate::{
    adaptive_threshold_inv, decode_marker_in_quad, find_quad_candidates, DecodeConfig, Matcher,
    QuadParams,
};
use log::{debug, warn};
use nalgebra::Point2;
use ringscore_core::GrayImageView;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Detector configuration. Defaults follow the usual ArUco detector setup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerDetectorParams {
    /// Built-in dictionary name.
    pub dictionary: String,
    /// Half window of the adaptive threshold.
    pub threshold_radius: u32,
    /// How much darker than the local mean a pixel must be.
    pub threshold_offset: u8,
    pub max_hamming: u8,
    pub quads: QuadParams,
    pub decode: DecodeConfig,
}

impl Default for MarkerDetectorParams {
    fn default() -> Self {
        Self {
            dictionary: "DICT_4X4_50".to_string(),
            threshold_radius: 7,
            threshold_offset: 7,
            max_hamming: 0,
            quads: QuadParams::default(),
            decode: DecodeConfig::default(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DetectorError {
    #[error("unknown marker dictionary `{0}`")]
    UnknownDictionary(String),
    #[error("dictionary `{0}` has more than 64 bits per marker")]
    UnsupportedDictionary(String),
}

/// One identified marker in image coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerDetection {
    pub id: u32,
    /// Top-left, top-right, bottom-right, bottom-left of the printed marker.
    pub corners: [Point2<f32>; 4],
    pub rotation: u8,
    pub hamming: u8,
    pub score: f32,
}

impl MarkerDetection {
    pub fn center(&self) -> Point2<f32> {
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2::new(sx / 4.0, sy / 4.0)
    }
}

#[derive(Clone, Debug)]
pub struct MarkerDetector {
    params: MarkerDetectorParams,
    matcher: Matcher,
}

impl MarkerDetector {
    pub fn new(params: MarkerDetectorParams) -> Result<Self, DetectorError> {
        let dict = builtin_dictionary(&params.dictionary)
            .ok_or_else(|| DetectorError::UnknownDictionary(params.dictionary.clone()))?;
        let max_hamming = params.max_hamming.min(dict.max_correction_bits);
        if max_hamming < params.max_hamming {
            warn!(
                "max_hamming {} exceeds what {} can correct, using {}",
                params.max_hamming, dict.name, max_hamming
            );
        }
        let matcher = Matcher::new(dict, max_hamming)
            .ok_or_else(|| DetectorError::UnsupportedDictionary(params.dictionary.clone()))?;
        Ok(Self { params, matcher })
    }

    /// Hamming budget in effect, capped by the dictionary's correction bits.
    pub fn max_hamming(&self) -> u8 {
        self.matcher.max_hamming()
    }

    pub fn params(&self) -> &MarkerDetectorParams {
        &self.params
    }

    /// Detect every decodable marker. Repeated ids are all reported.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, gray), fields(width = gray.width, height = gray.height))
    )]
    pub fn detect_markers(&self, gray: &GrayImageView<'_>) -> Vec<MarkerDetection> {
        let Some(buf) =
            image::GrayImage::from_raw(gray.width as u32, gray.height as u32, gray.data.to_vec())
        else {
            return Vec::new();
        };
        let binary = adaptive_threshold_inv(
            &buf,
            self.params.threshold_radius,
            self.params.threshold_offset,
        );
        let quads = find_quad_candidates(&binary, &self.params.quads);

        let markers: Vec<MarkerDetection> = quads
            .iter()
            .filter_map(|quad| {
                decode_marker_in_quad(gray, quad, &self.params.decode, &self.matcher)
            })
            .map(|d| MarkerDetection {
                id: d.id,
                corners: d.corners,
                rotation: d.rotation,
                hamming: d.hamming,
                score: d.score,
            })
            .collect();

        debug!(
            "{} quad candidates, {} markers {:?}",
            quads.len(),
            markers.len(),
            markers.iter().map(|m| m.id).collect::<Vec<_>>()
        );
        markers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_dictionary_is_an_error() {
        let params = MarkerDetectorParams {
            dictionary: "DICT_ARUCO_MIP_36h12".to_string(),
            ..MarkerDetectorParams::default()
        };
        assert!(matches!(
            MarkerDetector::new(params),
            Err(DetectorError::UnknownDictionary(_))
        ));
    }

    #[test]
    fn hamming_budget_is_capped_by_dictionary() {
        let greedy = MarkerDetectorParams {
            max_hamming: 5,
            ..MarkerDetectorParams::default()
        };
        let detector = MarkerDetector::new(greedy).expect("detector");
        assert_eq!(detector.max_hamming(), 1);
        assert_eq!(detector.params().max_hamming, 5);

        let strict = MarkerDetector::new(MarkerDetectorParams::default()).expect("detector");
        assert_eq!(strict.max_hamming(), 0);
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: MarkerDetectorParams =
            serde_json::from_str(r#"{ "max_hamming": 1 }"#).expect("json");
        assert_eq!(params.max_hamming, 1);
        assert_eq!(params.threshold_radius, 7);
        assert_eq!(params.dictionary, "DICT_4X4_50");
    }

    #[test]
    fn center_is_corner_mean() {
        let det = MarkerDetection {
            id: 0,
            corners: [
                Point2::new(0.0, 0.0),
                Point2::new(4.0, 0.0),
                Point2::new(4.0, 2.0),
                Point2::new(0.0, 2.0),
            ],
            rotation: 0,
            hamming: 0,
            score: 1.0,
        };
        assert_eq!(det.center(), Point2::new(2.0, 1.0));
    }
}
