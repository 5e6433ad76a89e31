//! Contracts for the external native services this crate drives: the
//! device/playback SDK and the body-tracking inference runtime. The
//! pipeline only ever talks to these traits; [`mock`] provides
//! deterministic implementations so everything runs without hardware.

pub mod mock;

use std::time::Duration;

use crate::{
    error::SensorError,
    source::{DeviceConfig, PlaybackConfig},
    tracking::{ProcessingMode, TrackerConfig},
    types::{BodyFrame, Calibration, Capture},
};

/// Live sensor access. `open` starts the cameras; `poll_capture` blocks up
/// to `timeout` for the next synchronized frame pair and returns
/// [`SensorError::Timeout`] when none arrives.
pub trait DeviceBackend: Send {
    fn open(&mut self, config: &DeviceConfig) -> Result<(), SensorError>;

    /// Calibration computed by the SDK; available after a successful open.
    fn calibration(&self) -> Option<Calibration>;

    fn poll_capture(&mut self, timeout: Duration) -> Result<Capture, SensorError>;

    /// Stops the cameras and releases the handle. Idempotent.
    fn close(&mut self);
}

/// Recorded-video access. `seek_and_read` positions the playback cursor at
/// `target` and returns the capture at or after that timestamp, or `None`
/// when the seek or read fails.
pub trait PlaybackBackend: Send {
    fn open(&mut self, config: &PlaybackConfig) -> Result<(), SensorError>;

    fn calibration(&self) -> Option<Calibration>;

    /// Total length of the recording.
    fn duration(&self) -> Duration;

    fn seek_and_read(&mut self, target: Duration) -> Option<Capture>;

    fn close(&mut self);
}

/// Body-tracking inference service. The internal queue is a black box with
/// its own synchronization; submission and retrieval are non-blocking.
pub trait TrackerBackend: Send {
    /// Returns the one-shot runtime initialization step, run once on a
    /// background thread before any capture is accepted. The `Err` message
    /// is surfaced verbatim to the caller.
    fn runtime_probe(&self, mode: ProcessingMode) -> Box<dyn FnOnce() -> Result<(), String> + Send>;

    /// Builds the tracker from the session calibration. Called once, on
    /// the first capture-ready notification.
    fn create_tracker(
        &mut self,
        calibration: &Calibration,
        config: &TrackerConfig,
    ) -> Result<(), SensorError>;

    /// Best-effort submission; `false` means the backlog was full and the
    /// capture was dropped.
    fn try_enqueue(&mut self, capture: &Capture) -> bool;

    /// Retrieves a completed inference result without waiting.
    fn try_pop(&mut self) -> Option<BodyFrame>;
}
