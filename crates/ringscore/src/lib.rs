//! Scoring of shots on a ring target watched by a camera.
//!
//! Each cycle rectifies the camera frame through four ArUco markers (ids 0-3,
//! one per target corner), detects new impacts by differencing consecutive
//! rectified frames, maps every impact to a ring and an angle, and keeps a
//! running score. At the end of a session the annotated frame and the angles
//! are posted to the scoring service.
//!
//! ## Quickstart
//!
//! ```no_run
//! use ringscore::{DirectorySource, PipelineDriver, RingscoreConfig};
//! use std::sync::atomic::AtomicBool;
//!
//! let config = RingscoreConfig::default();
//! let mut driver = PipelineDriver::new(&config)?;
//! let mut frames = DirectorySource::open("session/")?;
//! driver.run(&mut frames, &AtomicBool::new(false), None);
//! let summary = driver.finish(&mut frames, None);
//! println!("total {}", summary.snapshot.total);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//! - [`rectify`]: marker set selection and perspective rectification.
//! - [`impact`]: frame differencing and impact extraction.
//! - [`score`]: ring tables, calibration presets and angle computation.
//! - [`accumulator`]: per-ring points and angles across a session.
//! - [`driver`]: the rate-limited control loop.
//! - [`source`], [`remote`]: frame acquisition and the scoring service client.

pub mod accumulator;
pub mod config;
pub mod driver;
pub mod frame;
pub mod impact;
pub mod overlay;
pub mod rectify;
pub mod remote;
pub mod score;
pub mod source;

pub use ringscore_aruco as aruco;
pub use ringscore_core as core;

pub use accumulator::{AccumulatedScore, AngleState, AngleStateError, ScoreSnapshot, RINGS_DESC};
pub use config::{
    CalibrationConfig, ConfigError, RingscoreConfig, ServiceConfig, StreamConfig,
};
pub use driver::{
    CycleOutcome, PipelineDriver, PipelineError, PipelineState, ScoredImpact, SessionSummary,
    StopReason,
};
pub use impact::{ImpactDetector, ImpactError, ImpactParams, ImpactPoint};
pub use rectify::{CornerSource, MarkerRectifier, Rectification};
pub use remote::{HttpScoreService, RemoteError, ScoreReport, ScoreService};
pub use score::{
    angle_deg, CalibrationPreset, Score, ScoreMapper, ScoreTable, ScoreTableError,
    ScoringCalibration,
};
pub use source::{DirectorySource, FrameSource, FrameSourceError, MjpegSource};
