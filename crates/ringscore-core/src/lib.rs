//! Geometry shared by the ringscore crates.
//!
//! Plain row-major gray buffers ([`GrayImageView`]), four-point homographies,
//! contour geometry and the logger setup. No image library types cross this
//! crate's API.

mod geometry;
mod homography;
mod image;
mod logger;

pub use geometry::{
    approx_poly_closed, is_convex, min_edge_length, min_enclosing_circle,
    perimeter, Circle,
};
pub use homography::{homography_from_4pt, Homography};
pub use image::{GrayImage, GrayImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
