use std::{ops::Index, sync::Arc, time::Duration};

use glam::{Quat, Vec3};

/// Pixel layout of an image plane as produced by the sensor backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 32-bit blue/green/red/alpha.
    Bgra32,
    /// Packed YUV 4:2:2 (luma/chroma interleaved, 2 bytes per pixel).
    Yuy2,
    /// 16-bit depth in millimeters, little endian.
    Depth16,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra32 => 4,
            PixelFormat::Yuy2 => 2,
            PixelFormat::Depth16 => 2,
        }
    }
}

/// One image plane of a capture. The payload is shared, so cloning an
/// image (or a whole capture) never copies pixels.
#[derive(Clone, Debug)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Arc<[u8]>,
}

impl Image {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Image {
            width,
            height,
            format,
            data: data.into(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A color+depth sample pair sharing one device timestamp.
///
/// Captures are immutable once produced; the acquisition loop retires the
/// previous one as each new one lands.
#[derive(Clone, Debug)]
pub struct Capture {
    pub color: Option<Image>,
    pub depth: Option<Image>,
    pub timestamp: Duration,
}

impl Capture {
    /// Both planes present. Incomplete captures are surfaced to listeners
    /// as an empty notification rather than a partial sample.
    pub fn is_complete(&self) -> bool {
        self.color.is_some() && self.depth.is_some()
    }
}

/// Color camera resolutions supported by the sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorResolution {
    R720p,
    R1080p,
    R1440p,
    R1536p,
    R2160p,
    R3072p,
}

impl ColorResolution {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ColorResolution::R720p => (1280, 720),
            ColorResolution::R1080p => (1920, 1080),
            ColorResolution::R1440p => (2560, 1440),
            ColorResolution::R1536p => (2048, 1536),
            ColorResolution::R2160p => (3840, 2160),
            ColorResolution::R3072p => (4096, 3072),
        }
    }
}

/// Depth camera operating modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthMode {
    NarrowViewBinned,
    NarrowViewUnbinned,
    WideViewBinned,
    WideViewUnbinned,
    PassiveIr,
}

impl DepthMode {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            DepthMode::NarrowViewBinned => (320, 288),
            DepthMode::NarrowViewUnbinned => (640, 576),
            DepthMode::WideViewBinned => (512, 512),
            DepthMode::WideViewUnbinned => (1024, 1024),
            DepthMode::PassiveIr => (1024, 1024),
        }
    }

    /// Valid depth range in millimeters for this mode. `None` for modes
    /// that produce no depth plane.
    pub fn operating_range_mm(self) -> Option<(u16, u16)> {
        match self {
            DepthMode::NarrowViewBinned => Some((500, 5460)),
            DepthMode::NarrowViewUnbinned => Some((500, 3860)),
            DepthMode::WideViewBinned => Some((250, 2880)),
            DepthMode::WideViewUnbinned => Some((250, 2210)),
            DepthMode::PassiveIr => None,
        }
    }
}

/// Capture frame rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameRate {
    Five,
    Fifteen,
    Thirty,
}

impl FrameRate {
    pub fn per_second(self) -> u32 {
        match self {
            FrameRate::Five => 5,
            FrameRate::Fifteen => 15,
            FrameRate::Thirty => 30,
        }
    }
}

/// Color camera intrinsics, carried for downstream consumers. The core
/// never interprets these beyond passing them through.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

/// Camera parameters computed once at source-open time and read-only
/// thereafter.
#[derive(Clone, Debug)]
pub struct Calibration {
    pub color_width: u32,
    pub color_height: u32,
    pub depth_mode: DepthMode,
    pub color_intrinsics: Intrinsics,
}

impl Calibration {
    pub fn color_dimensions(&self) -> (u32, u32) {
        (self.color_width, self.color_height)
    }
}

/// The 32 landmarks of the Azure Kinect body model, in sensor order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum JointType {
    Pelvis = 0,
    SpineNavel,
    SpineChest,
    Neck,
    ClavicleLeft,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    HandTipLeft,
    ThumbLeft,
    ClavicleRight,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HandTipRight,
    ThumbRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
    Head,
    Nose,
    EyeLeft,
    EarLeft,
    EyeRight,
    EarRight,
}

impl JointType {
    pub const COUNT: usize = 32;

    pub const ALL: [JointType; JointType::COUNT] = [
        JointType::Pelvis,
        JointType::SpineNavel,
        JointType::SpineChest,
        JointType::Neck,
        JointType::ClavicleLeft,
        JointType::ShoulderLeft,
        JointType::ElbowLeft,
        JointType::WristLeft,
        JointType::HandLeft,
        JointType::HandTipLeft,
        JointType::ThumbLeft,
        JointType::ClavicleRight,
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HandTipRight,
        JointType::ThumbRight,
        JointType::HipLeft,
        JointType::KneeLeft,
        JointType::AnkleLeft,
        JointType::FootLeft,
        JointType::HipRight,
        JointType::KneeRight,
        JointType::AnkleRight,
        JointType::FootRight,
        JointType::Head,
        JointType::Nose,
        JointType::EyeLeft,
        JointType::EarLeft,
        JointType::EyeRight,
        JointType::EarRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Fixed parent of each joint in the skeletal topology. The pelvis is
    /// the root and is its own parent.
    pub fn parent(self) -> JointType {
        match self {
            JointType::Pelvis => JointType::Pelvis,
            JointType::SpineNavel => JointType::Pelvis,
            JointType::SpineChest => JointType::SpineNavel,
            JointType::Neck => JointType::SpineChest,
            JointType::ClavicleLeft => JointType::SpineChest,
            JointType::ShoulderLeft => JointType::ClavicleLeft,
            JointType::ElbowLeft => JointType::ShoulderLeft,
            JointType::WristLeft => JointType::ElbowLeft,
            JointType::HandLeft => JointType::WristLeft,
            JointType::HandTipLeft => JointType::HandLeft,
            JointType::ThumbLeft => JointType::WristLeft,
            JointType::ClavicleRight => JointType::SpineChest,
            JointType::ShoulderRight => JointType::ClavicleRight,
            JointType::ElbowRight => JointType::ShoulderRight,
            JointType::WristRight => JointType::ElbowRight,
            JointType::HandRight => JointType::WristRight,
            JointType::HandTipRight => JointType::HandRight,
            JointType::ThumbRight => JointType::WristRight,
            JointType::HipLeft => JointType::Pelvis,
            JointType::KneeLeft => JointType::HipLeft,
            JointType::AnkleLeft => JointType::KneeLeft,
            JointType::FootLeft => JointType::AnkleLeft,
            JointType::HipRight => JointType::Pelvis,
            JointType::KneeRight => JointType::HipRight,
            JointType::AnkleRight => JointType::KneeRight,
            JointType::FootRight => JointType::AnkleRight,
            JointType::Head => JointType::Neck,
            JointType::Nose => JointType::Head,
            JointType::EyeLeft => JointType::Head,
            JointType::EarLeft => JointType::Head,
            JointType::EyeRight => JointType::Head,
            JointType::EarRight => JointType::Head,
        }
    }

    pub fn is_root(self) -> bool {
        self == JointType::Pelvis
    }
}

/// Tracker confidence for one joint estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum JointConfidence {
    None,
    Low,
    Medium,
    High,
}

/// One joint estimate: position in millimeters (sensor coordinates,
/// Y pointing down), orientation, confidence.
#[derive(Clone, Copy, Debug)]
pub struct Joint {
    pub position_mm: Vec3,
    pub orientation: Quat,
    pub confidence: JointConfidence,
}

impl Default for Joint {
    fn default() -> Self {
        Joint {
            position_mm: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            confidence: JointConfidence::None,
        }
    }
}

/// Per-joint pose estimate for one tracked body at one tick.
#[derive(Clone, Debug)]
pub struct Skeleton {
    joints: [Joint; JointType::COUNT],
}

impl Skeleton {
    pub fn new(joints: [Joint; JointType::COUNT]) -> Self {
        Skeleton { joints }
    }

    pub fn joint(&self, joint_type: JointType) -> &Joint {
        &self.joints[joint_type.index()]
    }

    pub fn set_joint(&mut self, joint_type: JointType, joint: Joint) {
        self.joints[joint_type.index()] = joint;
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointType, &Joint)> {
        JointType::ALL.iter().map(|&jt| (jt, self.joint(jt)))
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Skeleton {
            joints: [Joint::default(); JointType::COUNT],
        }
    }
}

impl Index<JointType> for Skeleton {
    type Output = Joint;

    fn index(&self, joint_type: JointType) -> &Joint {
        self.joint(joint_type)
    }
}

/// One tracked body inside an inference result.
#[derive(Clone, Debug)]
pub struct Body {
    pub id: u32,
    pub skeleton: Skeleton,
}

/// A completed inference result: zero or more tracked bodies.
#[derive(Clone, Debug)]
pub struct BodyFrame {
    pub bodies: Vec<Body>,
    pub timestamp: Duration,
}

impl BodyFrame {
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }
}
