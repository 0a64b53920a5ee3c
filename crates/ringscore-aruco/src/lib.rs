//! Fiducial marker detection for target rectification.
//!
//! This crate covers:
//! - the embedded `DICT_4X4_50` dictionary,
//! - matching observed codes against the dictionary in all four rotations,
//! - quad candidate extraction from a raw gray frame,
//! - per-quad bit decoding,
//! - rendering printable markers.

pub mod builtins;
mod decode;
mod detector;
mod dictionary;
mod draw;
mod matcher;
mod quads;
mod threshold;

pub use decode::{decode_marker_in_quad, DecodeConfig, MarkerDecode};
pub use detector::{DetectorError, MarkerDetection, MarkerDetector, MarkerDetectorParams};
pub use dictionary::Dictionary;
pub use draw::draw_marker;
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use quads::{find_quad_candidates, QuadParams};
pub use threshold::adaptive_threshold_inv;
