//! Serializes captures into the external body-tracking service and
//! surfaces the first tracked skeleton per result, once per tick.

use std::{
    sync::{Arc, Mutex},
    thread,
};

use crossbeam_channel::{Receiver, TryRecvError, bounded};

use crate::{
    backend::TrackerBackend,
    event::{EventHub, SubscriptionHandle},
    source::CaptureSource,
    types::{Calibration, Capture, Skeleton},
};

/// Where the inference runtime executes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessingMode {
    Cpu,
    Gpu,
}

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub processing_mode: ProcessingMode,
    /// Select the lightweight DNN model over the full one.
    pub lite_model: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            processing_mode: ProcessingMode::Gpu,
            lite_model: false,
        }
    }
}

/// Per-tick tracking outcome: the first tracked body's skeleton, or empty
/// when the result held no bodies.
#[derive(Clone, Debug)]
pub enum SkeletonEvent {
    Tracked(Skeleton),
    Empty,
}

enum RuntimeState {
    /// Probe not started yet; no capture is accepted in this state.
    Idle,
    Probing(Receiver<Result<(), String>>),
    Available,
    /// Permanently off for this session; the message is the backend's.
    Disabled(String),
}

/// Consumes capture-ready notifications, feeds the inference backlog, and
/// polls results on the consumer tick without ever blocking it.
pub struct BodyTrackingStage<B: TrackerBackend> {
    backend: B,
    config: TrackerConfig,
    runtime: RuntimeState,
    tracker_ready: bool,
    skeleton_updated: EventHub<SkeletonEvent>,
}

impl<B: TrackerBackend> BodyTrackingStage<B> {
    pub fn new(config: TrackerConfig, backend: B) -> Self {
        BodyTrackingStage {
            backend,
            config,
            runtime: RuntimeState::Idle,
            tracker_ready: false,
            skeleton_updated: EventHub::new(),
        }
    }

    /// Kicks off the one-shot runtime initialization on a background
    /// thread. Idempotent; the outcome is picked up on later ticks.
    pub fn start_runtime_probe(&mut self) {
        if !matches!(self.runtime, RuntimeState::Idle) {
            return;
        }
        let probe = self.backend.runtime_probe(self.config.processing_mode);
        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            let _ = tx.send(probe());
        });
        self.runtime = RuntimeState::Probing(rx);
    }

    fn poll_runtime(&mut self) {
        let RuntimeState::Probing(rx) = &self.runtime else {
            return;
        };
        let outcome = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                Err("runtime probe thread exited without a result".to_string())
            }
        };
        match outcome {
            Ok(()) => {
                log::info!("body tracking runtime ready");
                self.runtime = RuntimeState::Available;
            }
            Err(message) => {
                log::error!("body tracking disabled for this session: {message}");
                self.runtime = RuntimeState::Disabled(message);
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.runtime, RuntimeState::Available)
    }

    pub fn disabled_reason(&self) -> Option<&str> {
        match &self.runtime {
            RuntimeState::Disabled(message) => Some(message),
            _ => None,
        }
    }

    /// Capture-ready handler. Builds the tracker from `calibration` on the
    /// first complete capture (calibration is only known once the source
    /// is open), then submits best-effort.
    pub fn on_capture_ready(&mut self, calibration: &Calibration, payload: &Option<Capture>) {
        self.poll_runtime();
        if !self.is_available() {
            return;
        }
        let Some(capture) = payload else {
            return;
        };

        if !self.tracker_ready {
            match self.backend.create_tracker(calibration, &self.config) {
                Ok(()) => self.tracker_ready = true,
                Err(err) => {
                    log::error!("tracker construction failed: {err}");
                    self.runtime = RuntimeState::Disabled(err.to_string());
                    return;
                }
            }
        }

        if !self.backend.try_enqueue(capture) {
            log::debug!("tracker backlog full, dropping capture");
        }
    }

    /// Tick-side result poll. Try-pop semantics; never stalls the frame
    /// tick. Emits the event on the `skeleton_updated` hub as well as
    /// returning it.
    pub fn poll_result(&mut self) -> Option<SkeletonEvent> {
        self.poll_runtime();
        if !self.is_available() || !self.tracker_ready {
            return None;
        }

        let frame = self.backend.try_pop()?;
        let event = match frame.bodies.first() {
            Some(body) => SkeletonEvent::Tracked(body.skeleton.clone()),
            None => SkeletonEvent::Empty,
        };
        self.skeleton_updated.emit(&event);
        Some(event)
    }

    pub fn skeleton_updated(&self) -> &EventHub<SkeletonEvent> {
        &self.skeleton_updated
    }

    /// Wires a shared stage to a capture source's notification stream.
    pub fn attach(
        stage: Arc<Mutex<BodyTrackingStage<B>>>,
        source: &CaptureSource,
    ) -> SubscriptionHandle
    where
        B: 'static,
    {
        let calibration = source.calibration().clone();
        source.capture_ready().subscribe(move |payload| {
            stage
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .on_capture_ready(&calibration, payload);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockTracker, sample_skeleton, synthetic_capture, test_calibration};
    use crate::types::{JointType, PixelFormat};
    use std::time::Duration;

    fn wait_for_probe<B: TrackerBackend>(stage: &mut BodyTrackingStage<B>) {
        for _ in 0..200 {
            stage.poll_runtime();
            if !matches!(stage.runtime, RuntimeState::Probing(_)) {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("runtime probe never resolved");
    }

    #[test]
    fn failed_probe_disables_the_stage_with_the_message() {
        let mut stage = BodyTrackingStage::new(
            TrackerConfig::default(),
            MockTracker::failing_runtime("no gpu runtime installed"),
        );
        stage.start_runtime_probe();
        wait_for_probe(&mut stage);

        assert!(!stage.is_available());
        assert_eq!(stage.disabled_reason(), Some("no gpu runtime installed"));

        // No capture is ever accepted afterwards.
        let calibration = test_calibration();
        let capture =
            synthetic_capture(&calibration, PixelFormat::Bgra32, Duration::ZERO, 0);
        stage.on_capture_ready(&calibration, &Some(capture));
        assert!(!stage.backend.tracker_created());
        assert!(stage.poll_result().is_none());
    }

    #[test]
    fn tracker_is_built_lazily_and_once() {
        let mut stage = BodyTrackingStage::new(
            TrackerConfig::default(),
            MockTracker::responding_with(Some(sample_skeleton())),
        );
        stage.start_runtime_probe();
        wait_for_probe(&mut stage);

        let calibration = test_calibration();
        assert!(!stage.backend.tracker_created());

        let capture =
            synthetic_capture(&calibration, PixelFormat::Bgra32, Duration::ZERO, 0);
        stage.on_capture_ready(&calibration, &Some(capture.clone()));
        assert!(stage.backend.tracker_created());
        stage.on_capture_ready(&calibration, &Some(capture));

        match stage.poll_result() {
            Some(SkeletonEvent::Tracked(skeleton)) => {
                assert!(skeleton[JointType::Pelvis].position_mm.z > 0.0);
            }
            other => panic!("expected a tracked skeleton, got {other:?}"),
        }
    }

    #[test]
    fn zero_body_result_is_empty() {
        let mut stage =
            BodyTrackingStage::new(TrackerConfig::default(), MockTracker::responding_with(None));
        stage.start_runtime_probe();
        wait_for_probe(&mut stage);

        let calibration = test_calibration();
        let capture =
            synthetic_capture(&calibration, PixelFormat::Bgra32, Duration::ZERO, 0);
        stage.on_capture_ready(&calibration, &Some(capture));

        assert!(matches!(stage.poll_result(), Some(SkeletonEvent::Empty)));
        assert!(stage.poll_result().is_none(), "one result per enqueue");
    }

    #[test]
    fn empty_payload_never_reaches_the_backend() {
        let mut stage = BodyTrackingStage::new(
            TrackerConfig::default(),
            MockTracker::responding_with(Some(sample_skeleton())),
        );
        stage.start_runtime_probe();
        wait_for_probe(&mut stage);

        stage.on_capture_ready(&test_calibration(), &None);
        assert!(!stage.backend.tracker_created());
    }

    #[test]
    fn events_reach_hub_subscribers() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut stage = BodyTrackingStage::new(
            TrackerConfig::default(),
            MockTracker::responding_with(Some(sample_skeleton())),
        );
        stage.start_runtime_probe();
        wait_for_probe(&mut stage);

        let tracked = Arc::new(AtomicUsize::new(0));
        {
            let tracked = tracked.clone();
            stage.skeleton_updated().subscribe(move |event| {
                if matches!(event, SkeletonEvent::Tracked(_)) {
                    tracked.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        let calibration = test_calibration();
        let capture =
            synthetic_capture(&calibration, PixelFormat::Bgra32, Duration::ZERO, 0);
        stage.on_capture_ready(&calibration, &Some(capture));
        stage.poll_result();

        assert_eq!(tracked.load(Ordering::SeqCst), 1);
    }
}
