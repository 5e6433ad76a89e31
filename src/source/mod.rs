//! The capture source: one polling contract over a live device or a
//! recorded video, acquired on a dedicated background loop and handed to
//! consumers through a single-slot, latest-wins mailbox.

pub mod flow;

use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    backend::{DeviceBackend, PlaybackBackend},
    error::SensorError,
    event::EventHub,
    relay::{RelayPoster, TickRelay},
    types::{Calibration, Capture, ColorResolution, DepthMode, FrameRate, PixelFormat},
};

/// Per-poll timeout for the live device, enforced here rather than by
/// consumers.
const LIVE_POLL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Live device configuration.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub pixel_format: PixelFormat,
    pub color_resolution: ColorResolution,
    pub depth_mode: DepthMode,
    pub fps: FrameRate,
    pub synchronized_images_only: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            pixel_format: PixelFormat::Bgra32,
            color_resolution: ColorResolution::R720p,
            depth_mode: DepthMode::NarrowViewUnbinned,
            fps: FrameRate::Thirty,
            synchronized_images_only: true,
        }
    }
}

/// Recorded-video configuration.
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    pub path: PathBuf,
    pub loop_playback: bool,
}

/// Sensor lifecycle notifications, delivered on the consumer tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorLifecycle {
    Opened,
    Closed,
}

#[derive(Default)]
struct SlotState {
    capture: Option<Capture>,
    dirty: bool,
}

/// The shared mailbox between the acquisition loop and the consumer tick.
/// Writes overwrite, never queue; staleness is the policy.
#[derive(Default)]
struct CaptureSlot {
    inner: Mutex<SlotState>,
}

impl CaptureSlot {
    fn store(&self, capture: Capture) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.capture = Some(capture);
        state.dirty = true;
    }

    /// Takes the pending capture if one landed since the last call.
    fn take_dirty(&self) -> Option<Capture> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if state.dirty {
            state.dirty = false;
            state.capture.clone()
        } else {
            None
        }
    }
}

/// Target playback timestamp for the given wall-clock elapsed time.
/// Looping wraps past the end of the recording, so elapsed 1.5s into a 1s
/// recording reads the same capture as 0.5s. `None` means the recording is
/// over.
fn playback_target(elapsed: Duration, duration: Duration, looping: bool) -> Option<Duration> {
    if looping {
        if duration.is_zero() {
            return Some(Duration::ZERO);
        }
        let wrapped = elapsed.as_nanos() % duration.as_nanos();
        Some(Duration::from_nanos(wrapped as u64))
    } else if elapsed > duration {
        None
    } else {
        Some(elapsed)
    }
}

/// Unifies the two acquisition modes behind one pull call for the loop.
enum Acquirer {
    Device(Box<dyn DeviceBackend>),
    Playback {
        backend: Box<dyn PlaybackBackend>,
        looping: bool,
        started: Instant,
    },
}

impl Acquirer {
    /// One acquisition attempt. `Ok(None)` is a quiet iteration (poll
    /// timeout, playback between frames); `Err` ends the loop.
    fn try_next(&mut self) -> Result<Option<Capture>, SensorError> {
        match self {
            Acquirer::Device(backend) => match backend.poll_capture(LIVE_POLL_TIMEOUT) {
                Ok(capture) => Ok(Some(capture)),
                Err(SensorError::Timeout) => Ok(None),
                Err(err) => Err(err),
            },
            Acquirer::Playback {
                backend,
                looping,
                started,
            } => {
                let duration = backend.duration();
                let Some(target) = playback_target(started.elapsed(), duration, *looping) else {
                    return Err(SensorError::EndOfStream);
                };
                match backend.seek_and_read(target) {
                    Some(capture) => Ok(Some(capture)),
                    None if *looping => {
                        // Seek or read failed inside the recording; rewind
                        // to time zero and restart the elapsed clock.
                        *started = Instant::now();
                        Ok(backend.seek_and_read(Duration::ZERO))
                    }
                    None => Err(SensorError::EndOfStream),
                }
            }
        }
    }

    fn close(&mut self) {
        match self {
            Acquirer::Device(backend) => backend.close(),
            Acquirer::Playback { backend, .. } => backend.close(),
        }
    }
}

fn run_acquisition(
    mut acquirer: Acquirer,
    slot: Arc<CaptureSlot>,
    stop: Arc<AtomicBool>,
    poster: RelayPoster,
    lifecycle: EventHub<SensorLifecycle>,
) {
    while !stop.load(Ordering::Relaxed) {
        match acquirer.try_next() {
            Ok(Some(capture)) => slot.store(capture),
            Ok(None) => {}
            Err(SensorError::EndOfStream) => {
                log::info!("playback reached end of stream");
                break;
            }
            Err(err) => {
                log::warn!("capture acquisition failed: {err}");
                break;
            }
        }
        thread::yield_now();
    }

    acquirer.close();
    poster.post(move || lifecycle.emit(&SensorLifecycle::Closed));
}

/// Owns the acquisition thread and the capture mailbox, and dispatches the
/// per-tick `capture_ready` notification.
pub struct CaptureSource {
    slot: Arc<CaptureSlot>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    calibration: Calibration,
    capture_ready: EventHub<Option<Capture>>,
    lifecycle: EventHub<SensorLifecycle>,
    relay: TickRelay,
    closed: bool,
}

impl CaptureSource {
    /// Opens the live device and starts acquiring. Calibration is computed
    /// here, once, and is read-only afterwards.
    pub fn open_device(
        config: DeviceConfig,
        mut backend: Box<dyn DeviceBackend>,
    ) -> Result<Self, SensorError> {
        backend.open(&config)?;
        let calibration = backend.calibration().ok_or_else(|| {
            SensorError::device_unavailable("backend reported no calibration after open")
        })?;
        log::info!(
            "device open: color {}x{}, depth {:?}",
            calibration.color_width,
            calibration.color_height,
            calibration.depth_mode
        );
        Ok(Self::start(Acquirer::Device(backend), calibration))
    }

    /// Opens a recorded video for timed playback.
    pub fn open_playback(
        config: PlaybackConfig,
        mut backend: Box<dyn PlaybackBackend>,
    ) -> Result<Self, SensorError> {
        backend.open(&config)?;
        let calibration = backend.calibration().ok_or_else(|| {
            SensorError::invalid_recording(config.path.clone(), "recording carries no calibration")
        })?;
        log::info!(
            "playback open: {} ({:?} long, loop={})",
            config.path.display(),
            backend.duration(),
            config.loop_playback
        );
        Ok(Self::start(
            Acquirer::Playback {
                backend,
                looping: config.loop_playback,
                started: Instant::now(),
            },
            calibration,
        ))
    }

    fn start(acquirer: Acquirer, calibration: Calibration) -> Self {
        let slot = Arc::new(CaptureSlot::default());
        let stop = Arc::new(AtomicBool::new(false));
        let relay = TickRelay::new();
        let capture_ready = EventHub::new();
        let lifecycle = EventHub::new();

        // Opened is observed on the first tick, not on whichever thread
        // opened the backend.
        {
            let lifecycle = lifecycle.clone();
            relay
                .poster()
                .post(move || lifecycle.emit(&SensorLifecycle::Opened));
        }

        let handle = thread::spawn({
            let slot = slot.clone();
            let stop = stop.clone();
            let poster = relay.poster();
            let lifecycle = lifecycle.clone();
            move || run_acquisition(acquirer, slot, stop, poster, lifecycle)
        });

        CaptureSource {
            slot,
            stop,
            handle: Some(handle),
            calibration,
            capture_ready,
            lifecycle,
            relay,
            closed: false,
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Per-tick capture notification: `Some` for a complete capture,
    /// `None` when the latest capture was missing a plane.
    pub fn capture_ready(&self) -> &EventHub<Option<Capture>> {
        &self.capture_ready
    }

    pub fn lifecycle(&self) -> &EventHub<SensorLifecycle> {
        &self.lifecycle
    }

    /// Consumer-thread tick: drains the mailbox and notifies listeners.
    /// Notification happens outside the slot lock so listener work never
    /// delays the acquisition loop. At most one notification fires per
    /// distinct slot write, however many overwrites happened in between.
    pub fn tick(&self) {
        if let Some(capture) = self.slot.take_dirty() {
            let payload = if capture.is_complete() {
                Some(capture)
            } else {
                None
            };
            self.capture_ready.emit(&payload);
        }
        self.relay.drain();
    }

    /// Requests loop termination, joins the acquisition thread, then
    /// delivers the `Closed` notification. Idempotent. No acquisition work
    /// races the caller-visible close.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.relay.drain();
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.close();
    }
}
