//! Frame-differencing impact detection on canonical frames.

use crate::frame::{abs_diff, blur5, to_gray};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::find_contours;
use imageproc::geometry::contour_area;
use log::debug;
use nalgebra::Point2;
use ringscore_core::min_enclosing_circle;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactParams {
    /// Blurred difference intensity that counts as change (strictly greater).
    pub diff_threshold: u8,
    /// Contours with a smaller polygon area are ignored. Zero keeps all.
    pub min_contour_area: f64,
}

impl Default for ImpactParams {
    fn default() -> Self {
        Self {
            diff_threshold: 50,
            min_contour_area: 0.0,
        }
    }
}

/// A new mark in canonical coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImpactPoint {
    pub x: i32,
    pub y: i32,
    /// Enclosing circle radius, for drawing only.
    pub radius: f32,
}

impl ImpactPoint {
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x as f64, self.y as f64)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImpactError {
    #[error("frame size mismatch: previous {previous:?}, current {current:?}")]
    SizeMismatch {
        previous: (u32, u32),
        current: (u32, u32),
    },
}

#[derive(Clone, Debug, Default)]
pub struct ImpactDetector {
    params: ImpactParams,
}

impl ImpactDetector {
    pub fn new(params: ImpactParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ImpactParams {
        &self.params
    }

    /// Binary mask (0/255) of the pixels that changed between the frames.
    pub fn change_mask(
        &self,
        previous: &RgbImage,
        current: &RgbImage,
    ) -> Result<GrayImage, ImpactError> {
        let diff = abs_diff(previous, current).ok_or(ImpactError::SizeMismatch {
            previous: previous.dimensions(),
            current: current.dimensions(),
        })?;
        let mut mask = blur5(&to_gray(&diff));
        let t = self.params.diff_threshold;
        for px in mask.pixels_mut() {
            *px = Luma([if px[0] > t { 255 } else { 0 }]);
        }
        Ok(mask)
    }

    /// One impact per contour border (outer and hole) of the change mask.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, previous, current), fields(width = current.width(), height = current.height()))
    )]
    pub fn detect_impacts(
        &self,
        previous: &RgbImage,
        current: &RgbImage,
    ) -> Result<Vec<ImpactPoint>, ImpactError> {
        let mask = self.change_mask(previous, current)?;

        let mut impacts = Vec::new();
        for contour in find_contours::<i32>(&mask) {
            // Hole borders run the other way round; compare magnitudes.
            if contour_area(&contour.points).abs() < self.params.min_contour_area {
                continue;
            }
            let pts: Vec<Point2<f32>> = contour
                .points
                .iter()
                .map(|p| Point2::new(p.x as f32, p.y as f32))
                .collect();
            let Some(circle) = min_enclosing_circle(&pts) else {
                continue;
            };
            impacts.push(ImpactPoint {
                x: circle.center.x.round() as i32,
                y: circle.center.y.round() as i32,
                radius: circle.radius,
            });
        }

        debug!("{} impacts {:?}", impacts.len(), impacts);
        Ok(impacts)
    }
}
