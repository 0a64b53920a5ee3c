//! Rate-limited control loop tying rectification, detection and scoring together.

use crate::accumulator::{AccumulatedScore, ScoreSnapshot};
use crate::config::{ConfigError, RingscoreConfig};
use crate::frame::blur5;
use crate::impact::{ImpactDetector, ImpactPoint};
use crate::overlay::{draw_hud, draw_impacts};
use crate::rectify::MarkerRectifier;
use crate::remote::{ScoreReport, ScoreService};
use crate::score::{Score, ScoreMapper};
use crate::source::FrameSource;
use image::RgbImage;
use log::{debug, error, info, warn};
use ringscore_aruco::DetectorError;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Detector(#[from] DetectorError),
}

/// Stage the driver is in, or the last stage a cycle reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    AwaitingFrame,
    Rectifying,
    Rectified,
    Unrectified,
    Detecting,
    Scoring,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Signal,
    FrameLimit,
    SourceExhausted,
    SourceFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScoredImpact {
    pub point: ImpactPoint,
    pub score: Score,
    /// False for ring 0.
    pub recorded: bool,
}

/// What one processed cycle did.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CycleOutcome {
    pub rectified: bool,
    pub impacts: Vec<ImpactPoint>,
    pub scored: Vec<ScoredImpact>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSummary {
    pub frames_read: u64,
    pub cycles_processed: u64,
    pub cycles_rectified: u64,
    pub impacts_detected: u64,
    pub impacts_recorded: u64,
    pub stop_reason: Option<StopReason>,
    /// HTTP status of the final report, when one was delivered.
    pub report_status: Option<u16>,
    pub snapshot: ScoreSnapshot,
}

#[derive(Clone, Copy, Debug, Default)]
struct Counters {
    frames_read: u64,
    cycles_processed: u64,
    cycles_rectified: u64,
    impacts_detected: u64,
    impacts_recorded: u64,
}

pub struct PipelineDriver {
    rectifier: MarkerRectifier,
    detector: ImpactDetector,
    mapper: ScoreMapper,
    accumulator: AccumulatedScore,
    interval: Duration,
    state: PipelineState,
    /// Last blurred canonical frame, without annotations.
    previous: Option<RgbImage>,
    visualization: Option<RgbImage>,
    last_raw: Option<RgbImage>,
    last_cycle: Option<Instant>,
    counters: Counters,
    stop_reason: Option<StopReason>,
    report_status: Option<u16>,
}

impl PipelineDriver {
    pub fn new(config: &RingscoreConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let rectifier = MarkerRectifier::new(
            config.marker.clone(),
            config.canonical_size,
            config.corner_source,
        )?;
        Ok(Self {
            rectifier,
            detector: ImpactDetector::new(config.impact.clone()),
            mapper: ScoreMapper::new(config.scoring_calibration()),
            accumulator: AccumulatedScore::new(),
            interval: config.cycle_interval(),
            state: PipelineState::AwaitingFrame,
            previous: None,
            visualization: None,
            last_raw: None,
            last_cycle: None,
            counters: Counters::default(),
            stop_reason: None,
            report_status: None,
        })
    }

    pub fn with_accumulator(mut self, accumulator: AccumulatedScore) -> Self {
        self.accumulator = accumulator;
        self
    }

    /// Seed the accumulator with the service's previous angles, if any.
    pub fn seed_from(&mut self, service: &dyn ScoreService) -> bool {
        match service.fetch_angles() {
            Some(previous) => {
                self.accumulator.seed(&previous);
                info!(
                    "resuming with {} points from the previous session",
                    previous.points()
                );
                true
            }
            None => {
                info!("starting with an empty score");
                false
            }
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn accumulator(&self) -> &AccumulatedScore {
        &self.accumulator
    }

    pub fn previous_rectified(&self) -> Option<&RgbImage> {
        self.previous.as_ref()
    }

    pub fn visualization(&self) -> Option<&RgbImage> {
        self.visualization.as_ref()
    }

    pub fn mapper(&self) -> &ScoreMapper {
        &self.mapper
    }

    /// One full cycle on `frame`, regardless of timing.
    pub fn process_frame(&mut self, frame: &RgbImage) -> CycleOutcome {
        self.counters.cycles_processed += 1;
        self.state = PipelineState::Rectifying;
        let rect = self.rectifier.rectify(frame);
        let blurred = blur5(&rect.frame);

        let mut outcome = CycleOutcome {
            rectified: rect.found,
            ..CycleOutcome::default()
        };
        if !rect.found {
            self.state = PipelineState::Unrectified;
            self.visualization = Some(blurred);
            return outcome;
        }

        self.counters.cycles_rectified += 1;
        self.state = PipelineState::Rectified;
        let mut vis = blurred.clone();

        if let Some(prev) = self.previous.as_ref() {
            self.state = PipelineState::Detecting;
            match self.detector.detect_impacts(prev, &blurred) {
                Ok(points) => {
                    self.state = PipelineState::Scoring;
                    draw_impacts(&mut vis, &points);
                    for p in &points {
                        let score = self.mapper.score(p.position());
                        let recorded = self.accumulator.record(score.ring, (p.x, p.y), score.angle);
                        self.counters.impacts_recorded += recorded as u64;
                        outcome.scored.push(ScoredImpact {
                            point: *p,
                            score,
                            recorded,
                        });
                    }
                    self.counters.impacts_detected += points.len() as u64;
                    outcome.impacts = points;
                }
                Err(e) => warn!("impact detection skipped: {e}"),
            }
        }

        draw_hud(&mut vis, &self.accumulator.hud_lines());
        self.previous = Some(blurred);
        self.visualization = Some(vis);
        debug!(
            "cycle {}: {} impacts, total {}",
            self.counters.cycles_processed,
            outcome.impacts.len(),
            self.accumulator.total()
        );
        outcome
    }

    /// Pull frames until `stop` is set, `max_frames` frames were read or the
    /// source ends. A frame is read on every iteration; cycles run at most
    /// once per configured interval.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        stop: &AtomicBool,
        max_frames: Option<u64>,
    ) -> StopReason {
        let reason = loop {
            if stop.load(Ordering::Relaxed) {
                info!("stop requested");
                break StopReason::Signal;
            }
            if max_frames.is_some_and(|m| self.counters.frames_read >= m) {
                break StopReason::FrameLimit;
            }

            self.state = PipelineState::AwaitingFrame;
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("frame source exhausted");
                    break StopReason::SourceExhausted;
                }
                Err(e) => {
                    error!("frame acquisition failed: {e}");
                    break StopReason::SourceFailed;
                }
            };
            self.counters.frames_read += 1;

            if self.last_cycle.is_none_or(|t| t.elapsed() >= self.interval) {
                self.process_frame(&frame);
                self.last_cycle = Some(Instant::now());
            }
            self.last_raw = Some(frame);
        };

        self.state = PipelineState::Stopped;
        self.stop_reason = Some(reason);
        reason
    }

    /// Frame the final report carries: the latest visualization, else the
    /// latest raw frame.
    pub fn report_frame(&self) -> Option<&RgbImage> {
        self.visualization.as_ref().or(self.last_raw.as_ref())
    }

    /// Send the final report (best effort) and release the source.
    pub fn finish(
        &mut self,
        source: &mut dyn FrameSource,
        service: Option<&dyn ScoreService>,
    ) -> SessionSummary {
        self.state = PipelineState::Stopped;
        if let Some(service) = service {
            self.report_status = self.send_report(service);
        }
        source.release();
        self.summary()
    }

    fn send_report(&self, service: &dyn ScoreService) -> Option<u16> {
        let Some(frame) = self.report_frame() else {
            warn!("no frame was acquired, skipping the final report");
            return None;
        };
        let report = match ScoreReport::from_frame(frame, self.accumulator.angles().clone()) {
            Ok(report) => report,
            Err(e) => {
                warn!("could not build the final report: {e}");
                return None;
            }
        };
        match service.post_report(&report) {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("final report failed: {e}");
                None
            }
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let c = self.counters;
        SessionSummary {
            frames_read: c.frames_read,
            cycles_processed: c.cycles_processed,
            cycles_rectified: c.cycles_rectified,
            impacts_detected: c.impacts_detected,
            impacts_recorded: c.impacts_recorded,
            stop_reason: self.stop_reason,
            report_status: self.report_status,
            snapshot: self.accumulator.snapshot(),
        }
    }
}
