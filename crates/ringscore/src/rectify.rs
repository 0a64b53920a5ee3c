//! Four-marker perspective rectification into the canonical frame.

use crate::frame::{to_gray, warp_perspective_rgb};
use image::RgbImage;
use log::debug;
use nalgebra::Point2;
use ringscore_aruco::{DetectorError, MarkerDetection, MarkerDetector, MarkerDetectorParams};
use ringscore_core::{homography_from_4pt, GrayImageView, Homography};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Which image point each corner marker contributes to the correspondence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CornerSource {
    /// Marker `k` uses its own corner `k` (0 = top-left, clockwise), pushed
    /// `offset_px` outwards along both axes.
    OuterCorners { offset_px: f32 },
    /// Marker centroids.
    Centroid,
}

impl Default for CornerSource {
    fn default() -> Self {
        Self::OuterCorners { offset_px: 10.0 }
    }
}

impl CornerSource {
    fn point_for(&self, marker: &MarkerDetection) -> Point2<f32> {
        match *self {
            Self::Centroid => marker.center(),
            Self::OuterCorners { offset_px: o } => {
                let k = marker.id as usize % 4;
                let (sx, sy) = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)][k];
                let c = marker.corners[k];
                Point2::new(c.x + sx * o, c.y + sy * o)
            }
        }
    }
}

/// Result of one rectification attempt.
#[derive(Clone, Debug)]
pub struct Rectification {
    /// Canonical frame when `found`, otherwise a copy of the input.
    pub frame: RgbImage,
    pub found: bool,
    /// Canonical to image mapping when `found`.
    pub homography: Option<Homography>,
    pub markers: Vec<MarkerDetection>,
}

#[derive(Clone, Debug)]
pub struct MarkerRectifier {
    detector: MarkerDetector,
    canonical_size: u32,
    corner_source: CornerSource,
}

impl MarkerRectifier {
    pub fn new(
        params: MarkerDetectorParams,
        canonical_size: u32,
        corner_source: CornerSource,
    ) -> Result<Self, DetectorError> {
        Ok(Self {
            detector: MarkerDetector::new(params)?,
            canonical_size,
            corner_source,
        })
    }

    pub fn canonical_size(&self) -> u32 {
        self.canonical_size
    }

    /// Image points for canonical top-left, top-right, bottom-right and
    /// bottom-left, or `None` unless the detections are exactly ids 0..=3.
    pub fn marker_set(&self, markers: &[MarkerDetection]) -> Option<[Point2<f32>; 4]> {
        if markers.len() != 4 {
            return None;
        }
        let mut slots: [Option<Point2<f32>>; 4] = [None; 4];
        for m in markers {
            let slot = slots.get_mut(m.id as usize)?;
            if slot.is_some() {
                return None;
            }
            *slot = Some(self.corner_source.point_for(m));
        }
        Some([slots[0]?, slots[1]?, slots[2]?, slots[3]?])
    }

    /// Detect the corner markers and warp `frame` into the canonical square.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(width = frame.width(), height = frame.height()))
    )]
    pub fn rectify(&self, frame: &RgbImage) -> Rectification {
        let gray = to_gray(frame);
        let markers = match GrayImageView::new(
            gray.width() as usize,
            gray.height() as usize,
            gray.as_raw(),
        ) {
            Some(view) => self.detector.detect_markers(&view),
            None => Vec::new(),
        };

        let homography = self
            .marker_set(&markers)
            .and_then(|img_pts| homography_from_4pt(&self.canonical_corners(), &img_pts));

        match homography {
            Some(h) => {
                let s = self.canonical_size;
                Rectification {
                    frame: warp_perspective_rgb(frame, &h, s, s),
                    found: true,
                    homography: Some(h),
                    markers,
                }
            }
            None => {
                debug!(
                    "no valid marker set, ids {:?}",
                    markers.iter().map(|m| m.id).collect::<Vec<_>>()
                );
                Rectification {
                    frame: frame.clone(),
                    found: false,
                    homography: None,
                    markers,
                }
            }
        }
    }

    fn canonical_corners(&self) -> [Point2<f32>; 4] {
        let s = self.canonical_size as f32;
        [
            Point2::new(0.0, 0.0),
            Point2::new(s, 0.0),
            Point2::new(s, s),
            Point2::new(0.0, s),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(id: u32, x0: f32, y0: f32) -> MarkerDetection {
        MarkerDetection {
            id,
            corners: [
                Point2::new(x0, y0),
                Point2::new(x0 + 60.0, y0),
                Point2::new(x0 + 60.0, y0 + 60.0),
                Point2::new(x0, y0 + 60.0),
            ],
            rotation: 0,
            hamming: 0,
            score: 1.0,
        }
    }

    fn rectifier(source: CornerSource) -> MarkerRectifier {
        MarkerRectifier::new(MarkerDetectorParams::default(), 500, source).expect("rectifier")
    }

    #[test]
    fn outer_corners_are_offset_outwards() {
        let r = rectifier(CornerSource::default());
        let set = r
            .marker_set(&[
                marker(2, 500.0, 500.0),
                marker(0, 20.0, 20.0),
                marker(3, 20.0, 500.0),
                marker(1, 500.0, 20.0),
            ])
            .expect("set");
        assert_eq!(set[0], Point2::new(10.0, 10.0));
        assert_eq!(set[1], Point2::new(570.0, 10.0));
        assert_eq!(set[2], Point2::new(570.0, 570.0));
        assert_eq!(set[3], Point2::new(10.0, 570.0));
    }

    #[test]
    fn centroid_source_uses_marker_centers() {
        let r = rectifier(CornerSource::Centroid);
        let set = r
            .marker_set(&[
                marker(0, 0.0, 0.0),
                marker(1, 100.0, 0.0),
                marker(2, 100.0, 100.0),
                marker(3, 0.0, 100.0),
            ])
            .expect("set");
        assert_eq!(set[0], Point2::new(30.0, 30.0));
        assert_eq!(set[2], Point2::new(130.0, 130.0));
    }

    #[test]
    fn invalid_marker_sets_are_rejected() {
        let r = rectifier(CornerSource::default());
        let three = [marker(0, 0.0, 0.0), marker(1, 100.0, 0.0), marker(2, 100.0, 100.0)];
        assert!(r.marker_set(&three).is_none());

        let duplicate = [
            marker(0, 0.0, 0.0),
            marker(1, 100.0, 0.0),
            marker(1, 100.0, 100.0),
            marker(3, 0.0, 100.0),
        ];
        assert!(r.marker_set(&duplicate).is_none());

        let foreign = [
            marker(0, 0.0, 0.0),
            marker(1, 100.0, 0.0),
            marker(7, 100.0, 100.0),
            marker(3, 0.0, 100.0),
        ];
        assert!(r.marker_set(&foreign).is_none());

        let mut five = three.to_vec();
        five.extend([marker(3, 0.0, 100.0), marker(4, 50.0, 50.0)]);
        assert!(r.marker_set(&five).is_none());
    }

    #[test]
    fn blank_frame_is_returned_unchanged() {
        let r = rectifier(CornerSource::default());
        let frame = RgbImage::from_pixel(64, 48, image::Rgb([200, 10, 10]));
        let out = r.rectify(&frame);
        assert!(!out.found);
        assert!(out.homography.is_none());
        assert_eq!(out.frame, frame);
    }
}
