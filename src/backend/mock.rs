//! Deterministic in-memory backends for tests, CI, and the demo binary.

use std::{collections::VecDeque, time::Duration};

use glam::Vec3;

use crate::{
    error::SensorError,
    source::{DeviceConfig, PlaybackConfig},
    tracking::{ProcessingMode, TrackerConfig},
    types::{
        Body, BodyFrame, Calibration, Capture, Image, Intrinsics, Joint, JointConfidence,
        JointType, PixelFormat, Skeleton,
    },
};

use super::{DeviceBackend, PlaybackBackend, TrackerBackend};

/// Calibration for a small synthetic camera, kept tiny so test captures
/// stay cheap to fill.
pub fn test_calibration() -> Calibration {
    Calibration {
        color_width: 64,
        color_height: 48,
        depth_mode: crate::types::DepthMode::NarrowViewUnbinned,
        color_intrinsics: Intrinsics {
            fx: 60.0,
            fy: 60.0,
            cx: 32.0,
            cy: 24.0,
        },
    }
}

/// Builds a complete capture matching `calibration`, with the color plane
/// filled with `fill` and the depth plane mid-range.
pub fn synthetic_capture(
    calibration: &Calibration,
    format: PixelFormat,
    timestamp: Duration,
    fill: u8,
) -> Capture {
    let (cw, ch) = calibration.color_dimensions();
    let color_len = cw as usize * ch as usize * format.bytes_per_pixel();

    let (dw, dh) = calibration.depth_mode.dimensions();
    let mid_mm: u16 = calibration
        .depth_mode
        .operating_range_mm()
        .map(|(near, far)| near + (far - near) / 2)
        .unwrap_or(0);
    let mut depth = Vec::with_capacity(dw as usize * dh as usize * 2);
    for _ in 0..(dw * dh) {
        depth.extend_from_slice(&mid_mm.to_le_bytes());
    }

    Capture {
        color: Some(Image::new(cw, ch, format, vec![fill; color_len])),
        depth: Some(Image::new(dw, dh, PixelFormat::Depth16, depth)),
        timestamp,
    }
}

/// A body pose roughly shaped like a standing person, in sensor
/// coordinates (millimeters, Y pointing down).
pub fn sample_skeleton() -> Skeleton {
    let mut skeleton = Skeleton::default();
    // Pelvis ~1.8m in front of the camera, torso rising (negative Y is up
    // in sensor space).
    let set = |s: &mut Skeleton, jt: JointType, x: f32, y: f32, z: f32| {
        s.set_joint(
            jt,
            Joint {
                position_mm: Vec3::new(x, y, z),
                orientation: glam::Quat::IDENTITY,
                confidence: JointConfidence::Medium,
            },
        );
    };

    set(&mut skeleton, JointType::Pelvis, 0.0, 0.0, 1800.0);
    set(&mut skeleton, JointType::SpineNavel, 0.0, -150.0, 1800.0);
    set(&mut skeleton, JointType::SpineChest, 0.0, -300.0, 1800.0);
    set(&mut skeleton, JointType::Neck, 0.0, -450.0, 1800.0);
    set(&mut skeleton, JointType::Head, 0.0, -550.0, 1800.0);
    set(&mut skeleton, JointType::Nose, 0.0, -560.0, 1720.0);
    set(&mut skeleton, JointType::EyeLeft, -30.0, -580.0, 1740.0);
    set(&mut skeleton, JointType::EyeRight, 30.0, -580.0, 1740.0);
    set(&mut skeleton, JointType::EarLeft, -80.0, -560.0, 1800.0);
    set(&mut skeleton, JointType::EarRight, 80.0, -560.0, 1800.0);

    set(&mut skeleton, JointType::ClavicleLeft, -40.0, -430.0, 1800.0);
    set(&mut skeleton, JointType::ShoulderLeft, -180.0, -420.0, 1800.0);
    set(&mut skeleton, JointType::ElbowLeft, -230.0, -180.0, 1800.0);
    set(&mut skeleton, JointType::WristLeft, -250.0, 40.0, 1790.0);
    set(&mut skeleton, JointType::HandLeft, -255.0, 90.0, 1785.0);
    set(&mut skeleton, JointType::HandTipLeft, -258.0, 160.0, 1780.0);
    set(&mut skeleton, JointType::ThumbLeft, -225.0, 90.0, 1770.0);

    set(&mut skeleton, JointType::ClavicleRight, 40.0, -430.0, 1800.0);
    set(&mut skeleton, JointType::ShoulderRight, 180.0, -420.0, 1800.0);
    set(&mut skeleton, JointType::ElbowRight, 230.0, -180.0, 1800.0);
    set(&mut skeleton, JointType::WristRight, 250.0, 40.0, 1790.0);
    set(&mut skeleton, JointType::HandRight, 255.0, 90.0, 1785.0);
    set(&mut skeleton, JointType::HandTipRight, 258.0, 160.0, 1780.0);
    set(&mut skeleton, JointType::ThumbRight, 225.0, 90.0, 1770.0);

    set(&mut skeleton, JointType::HipLeft, -90.0, 20.0, 1800.0);
    set(&mut skeleton, JointType::KneeLeft, -95.0, 450.0, 1810.0);
    set(&mut skeleton, JointType::AnkleLeft, -100.0, 850.0, 1820.0);
    set(&mut skeleton, JointType::FootLeft, -100.0, 900.0, 1700.0);

    set(&mut skeleton, JointType::HipRight, 90.0, 20.0, 1800.0);
    set(&mut skeleton, JointType::KneeRight, 95.0, 450.0, 1810.0);
    set(&mut skeleton, JointType::AnkleRight, 100.0, 850.0, 1820.0);
    set(&mut skeleton, JointType::FootRight, 100.0, 900.0, 1700.0);

    skeleton
}

/// Live-device stand-in serving a fixed capture list, then timeouts.
pub struct MockDevice {
    calibration: Calibration,
    captures: VecDeque<Capture>,
    fail_open: Option<String>,
    opened: bool,
}

impl MockDevice {
    pub fn new(captures: Vec<Capture>) -> Self {
        MockDevice {
            calibration: test_calibration(),
            captures: captures.into(),
            fail_open: None,
            opened: false,
        }
    }

    /// A device whose `open` fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        MockDevice {
            calibration: test_calibration(),
            captures: VecDeque::new(),
            fail_open: Some(reason.into()),
            opened: false,
        }
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }
}

impl DeviceBackend for MockDevice {
    fn open(&mut self, _config: &DeviceConfig) -> Result<(), SensorError> {
        if let Some(reason) = &self.fail_open {
            return Err(SensorError::device_unavailable(reason.clone()));
        }
        self.opened = true;
        Ok(())
    }

    fn calibration(&self) -> Option<Calibration> {
        self.opened.then(|| self.calibration.clone())
    }

    fn poll_capture(&mut self, _timeout: Duration) -> Result<Capture, SensorError> {
        self.captures.pop_front().ok_or(SensorError::Timeout)
    }

    fn close(&mut self) {
        self.opened = false;
    }
}

/// Recorded-video stand-in: captures at a fixed interval across a known
/// duration, seekable by timestamp.
pub struct MockPlayback {
    calibration: Calibration,
    frames: Vec<Capture>,
    duration: Duration,
    fail_open: Option<String>,
    opened: bool,
}

impl MockPlayback {
    /// A recording of `duration` with one capture every `interval`, color
    /// fill derived from the frame index so frames are distinguishable.
    pub fn recorded(duration: Duration, interval: Duration, format: PixelFormat) -> Self {
        let calibration = test_calibration();
        let mut frames = Vec::new();
        let mut ts = Duration::ZERO;
        let mut index = 0u8;
        while ts < duration {
            frames.push(synthetic_capture(&calibration, format, ts, index));
            ts += interval;
            index = index.wrapping_add(1);
        }
        MockPlayback {
            calibration,
            frames,
            duration,
            fail_open: None,
            opened: false,
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        MockPlayback {
            calibration: test_calibration(),
            frames: Vec::new(),
            duration: Duration::ZERO,
            fail_open: Some(reason.into()),
            opened: false,
        }
    }
}

impl PlaybackBackend for MockPlayback {
    fn open(&mut self, config: &PlaybackConfig) -> Result<(), SensorError> {
        if let Some(reason) = &self.fail_open {
            return Err(SensorError::invalid_recording(
                config.path.clone(),
                reason.clone(),
            ));
        }
        self.opened = true;
        Ok(())
    }

    fn calibration(&self) -> Option<Calibration> {
        self.opened.then(|| self.calibration.clone())
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn seek_and_read(&mut self, target: Duration) -> Option<Capture> {
        if target > self.duration {
            return None;
        }
        self.frames
            .iter()
            .find(|frame| frame.timestamp >= target)
            .cloned()
    }

    fn close(&mut self) {
        self.opened = false;
    }
}

/// Inference stand-in with a bounded backlog. Each queued capture turns
/// into one result carrying either the configured skeleton or no bodies.
pub struct MockTracker {
    init_result: Result<(), String>,
    response: Option<Skeleton>,
    queue: VecDeque<Capture>,
    capacity: usize,
    tracker_created: bool,
}

impl MockTracker {
    /// A tracker that reports `skeleton` for every capture (`None` for a
    /// zero-body result).
    pub fn responding_with(response: Option<Skeleton>) -> Self {
        MockTracker {
            init_result: Ok(()),
            response,
            queue: VecDeque::new(),
            capacity: 2,
            tracker_created: false,
        }
    }

    /// A tracker whose runtime initialization fails with `message`.
    pub fn failing_runtime(message: impl Into<String>) -> Self {
        MockTracker {
            init_result: Err(message.into()),
            response: None,
            queue: VecDeque::new(),
            capacity: 2,
            tracker_created: false,
        }
    }

    pub fn tracker_created(&self) -> bool {
        self.tracker_created
    }
}

impl TrackerBackend for MockTracker {
    fn runtime_probe(
        &self,
        _mode: ProcessingMode,
    ) -> Box<dyn FnOnce() -> Result<(), String> + Send> {
        let result = self.init_result.clone();
        Box::new(move || result)
    }

    fn create_tracker(
        &mut self,
        _calibration: &Calibration,
        _config: &TrackerConfig,
    ) -> Result<(), SensorError> {
        self.tracker_created = true;
        Ok(())
    }

    fn try_enqueue(&mut self, capture: &Capture) -> bool {
        if self.queue.len() >= self.capacity {
            return false;
        }
        self.queue.push_back(capture.clone());
        true
    }

    fn try_pop(&mut self) -> Option<BodyFrame> {
        let capture = self.queue.pop_front()?;
        let bodies = match &self.response {
            Some(skeleton) => vec![Body {
                id: 1,
                skeleton: skeleton.clone(),
            }],
            None => Vec::new(),
        };
        Some(BodyFrame {
            bodies,
            timestamp: capture.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_device_times_out_when_drained() {
        let calibration = test_calibration();
        let capture =
            synthetic_capture(&calibration, PixelFormat::Bgra32, Duration::ZERO, 0x20);
        let mut device = MockDevice::new(vec![capture]);
        device.open(&DeviceConfig::default()).unwrap();

        assert!(device.poll_capture(Duration::from_millis(1)).is_ok());
        assert!(matches!(
            device.poll_capture(Duration::from_millis(1)),
            Err(SensorError::Timeout)
        ));
    }

    #[test]
    fn mock_playback_seeks_to_the_covering_frame() {
        let mut playback = MockPlayback::recorded(
            Duration::from_secs(1),
            Duration::from_millis(100),
            PixelFormat::Bgra32,
        );
        playback
            .open(&PlaybackConfig {
                path: "test.mkv".into(),
                loop_playback: false,
            })
            .unwrap();

        let frame = playback.seek_and_read(Duration::from_millis(250)).unwrap();
        assert_eq!(frame.timestamp, Duration::from_millis(300));
        assert!(playback.seek_and_read(Duration::from_millis(1500)).is_none());
    }

    #[test]
    fn mock_tracker_drops_when_backlog_full() {
        let calibration = test_calibration();
        let capture =
            synthetic_capture(&calibration, PixelFormat::Bgra32, Duration::ZERO, 0);
        let mut tracker = MockTracker::responding_with(Some(sample_skeleton()));

        assert!(tracker.try_enqueue(&capture));
        assert!(tracker.try_enqueue(&capture));
        assert!(!tracker.try_enqueue(&capture));

        assert_eq!(tracker.try_pop().unwrap().body_count(), 1);
    }
}
