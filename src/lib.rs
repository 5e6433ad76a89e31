//! Azure Kinect body tracking bridged to a scene graph.
//!
//! Two loosely coupled pipelines share one capture source: body tracking
//! drives a skeletal rig of collision proxies, and frame extraction serves
//! color/depth frames for display. Sensor I/O and inference live behind
//! the [`backend`] traits; [`backend::mock`] runs everything without
//! hardware.

pub mod backend;
pub mod error;
pub mod event;
pub mod relay;
pub mod rig;
pub mod scene;
pub mod source;
pub mod tracking;
pub mod types;
pub mod video;

// Re-exports for convenience
pub use error::SensorError;
pub use event::{EventHub, SubscriptionHandle};
pub use rig::RigMapper;
pub use scene::{Collider, NodeId, SceneGraph, TransformGraph};
pub use source::{CaptureSource, DeviceConfig, PlaybackConfig, SensorLifecycle};
pub use tracking::{BodyTrackingStage, ProcessingMode, SkeletonEvent, TrackerConfig};
pub use types::{Calibration, Capture, Image, JointType, PixelFormat, Skeleton};
pub use video::{Frame, FrameExtractor, FramePixelFormat};
