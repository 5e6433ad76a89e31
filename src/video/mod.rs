//! Pull-based frame extraction, decoupled from acquisition: the stage
//! remembers the latest raw capture and decodes on demand.

mod frame;

pub use frame::{Frame, FramePixelFormat};

use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use crate::{
    error::SensorError,
    event::SubscriptionHandle,
    source::CaptureSource,
    types::{Calibration, Capture},
};

use frame::FrameDecoder;

/// How long `next_frame` waits for the first capture before the stage
/// gives up and disables itself.
const STARTUP_GRACE: Duration = Duration::from_millis(2000);

const POLL_INTERVAL: Duration = Duration::from_millis(1);

struct ExtractorState {
    decoder: Option<FrameDecoder>,
    latest: Option<Capture>,
    disabled: Option<String>,
}

/// Frame extraction stage. Feed it captures via [`attach`] (or
/// [`handle_capture`] directly) and pull frames with [`next_frame`]; the
/// decoder is built lazily from the first capture's pixel format.
///
/// [`attach`]: FrameExtractor::attach
/// [`handle_capture`]: FrameExtractor::handle_capture
/// [`next_frame`]: FrameExtractor::next_frame
pub struct FrameExtractor {
    state: Arc<Mutex<ExtractorState>>,
    grace: Duration,
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameExtractor {
    pub fn new() -> Self {
        Self::with_grace(STARTUP_GRACE)
    }

    /// An extractor with a custom startup grace window.
    pub fn with_grace(grace: Duration) -> Self {
        FrameExtractor {
            state: Arc::new(Mutex::new(ExtractorState {
                decoder: None,
                latest: None,
                disabled: None,
            })),
            grace,
        }
    }

    /// Subscribes to the source's capture stream. Empty notifications are
    /// ignored; complete captures replace the stored one.
    pub fn attach(&self, source: &CaptureSource) -> SubscriptionHandle {
        let state = self.state.clone();
        let calibration = source.calibration().clone();
        source.capture_ready().subscribe(move |payload| {
            if let Some(capture) = payload {
                store_capture(&state, &calibration, capture);
            }
        })
    }

    /// Direct capture-ready entry point for hosts that dispatch events
    /// themselves.
    pub fn handle_capture(&self, calibration: &Calibration, capture: &Capture) {
        store_capture(&self.state, calibration, capture);
    }

    /// Decodes the latest capture's color plane into a fresh frame,
    /// busy-polling until a capture is available. If none ever arrives
    /// within the grace window the stage logs, disables itself, and every
    /// later pull fails fast with `StageDisabled`.
    pub fn next_frame(&self) -> Result<Frame, SensorError> {
        self.pull(|decoder, capture| {
            let color = capture.color.as_ref().ok_or_else(|| {
                SensorError::MalformedImage {
                    reason: "capture has no color plane".into(),
                }
            })?;
            decoder.decode_color(color)
        })
    }

    /// Same contract as [`next_frame`], producing a colorized preview of
    /// the depth plane instead.
    ///
    /// [`next_frame`]: FrameExtractor::next_frame
    pub fn next_depth_frame(&self) -> Result<Frame, SensorError> {
        self.pull(|decoder, capture| {
            let depth = capture.depth.as_ref().ok_or_else(|| {
                SensorError::MalformedImage {
                    reason: "capture has no depth plane".into(),
                }
            })?;
            decoder.decode_depth(depth)
        })
    }

    pub fn is_disabled(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .disabled
            .is_some()
    }

    fn pull(
        &self,
        decode: impl Fn(&FrameDecoder, &Capture) -> Result<Frame, SensorError>,
    ) -> Result<Frame, SensorError> {
        let deadline = Instant::now() + self.grace;
        loop {
            {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(reason) = &state.disabled {
                    return Err(SensorError::stage_disabled(reason.clone()));
                }
                if let (Some(decoder), Some(capture)) = (&state.decoder, &state.latest) {
                    return decode(decoder, capture);
                }
                if Instant::now() >= deadline {
                    let reason =
                        format!("no capture arrived within {:?} of enabling", self.grace);
                    log::error!("frame extraction disabled: {reason}");
                    state.disabled = Some(reason.clone());
                    return Err(SensorError::stage_disabled(reason));
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn store_capture(
    state: &Arc<Mutex<ExtractorState>>,
    calibration: &Calibration,
    capture: &Capture,
) {
    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
    if state.disabled.is_some() {
        return;
    }
    if state.decoder.is_none() {
        let Some(color) = &capture.color else {
            return;
        };
        match FrameDecoder::new(calibration, color.format) {
            Ok(decoder) => state.decoder = Some(decoder),
            Err(err) => {
                log::error!("frame extraction disabled: {err}");
                state.disabled = Some(err.to_string());
                return;
            }
        }
    }
    state.latest = Some(capture.clone());
}
