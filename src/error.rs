use std::path::PathBuf;

use crate::types::PixelFormat;

/// Errors surfaced by the capture pipeline and its stages.
///
/// Open failures (`DeviceUnavailable`, `InvalidRecording`) are fatal to the
/// session. `Timeout` is per-poll and non-fatal. Stage faults
/// (`InferenceInitFailed`, recurring `SizeMismatch`, the startup grace
/// window expiring) disable the stage rather than propagating into the
/// consumer's per-frame update.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SensorError {
    /// Opening the live device failed.
    #[error("device unavailable: {reason}")]
    DeviceUnavailable { reason: String },

    /// The recording could not be opened or is malformed.
    #[error("invalid recording {path:?}: {reason}")]
    InvalidRecording { path: PathBuf, reason: String },

    /// The body tracking runtime could not be initialized. Tracking stays
    /// disabled for the remainder of the session.
    #[error("body tracking initialization failed: {message}")]
    InferenceInitFailed { message: String },

    /// The source pixel format has no frame decoder.
    #[error("unsupported pixel format {format:?}")]
    UnsupportedFormat { format: PixelFormat },

    /// Capture image dimensions differ from the decoder's configured
    /// dimensions.
    #[error("image size {got:?} does not match configured size {expected:?}")]
    SizeMismatch { got: (u32, u32), expected: (u32, u32) },

    /// No capture arrived within the poll timeout. Yields no capture this
    /// tick; the loop keeps polling.
    #[error("timed out waiting for capture")]
    Timeout,

    /// Non-looping playback ran out of captures.
    #[error("end of recording reached")]
    EndOfStream,

    /// An image plane's payload does not match its declared layout.
    #[error("malformed image: {reason}")]
    MalformedImage { reason: String },

    /// The stage disabled itself after an earlier fault.
    #[error("stage disabled: {reason}")]
    StageDisabled { reason: String },
}

impl SensorError {
    pub fn device_unavailable(reason: impl Into<String>) -> Self {
        SensorError::DeviceUnavailable {
            reason: reason.into(),
        }
    }

    pub fn invalid_recording(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SensorError::InvalidRecording {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn stage_disabled(reason: impl Into<String>) -> Self {
        SensorError::StageDisabled {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_the_reason() {
        let err = SensorError::device_unavailable("no usb device");
        assert_eq!(err.to_string(), "device unavailable: no usb device");
    }

    #[test]
    fn size_mismatch_reports_both_sizes() {
        let err = SensorError::SizeMismatch {
            got: (640, 480),
            expected: (1280, 720),
        };
        let text = err.to_string();
        assert!(text.contains("(640, 480)"));
        assert!(text.contains("(1280, 720)"));
    }
}
