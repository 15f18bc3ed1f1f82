use std::{collections::HashMap, ops::BitOr, time::Instant};

/// Pixel encoding of a color frame as delivered by the sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorImageFormat {
    Bgra,
    Rgba,
    Yuy2,
    Nv12,
    Mjpeg,
    Rgb,
    Bgr,
    Gray,
}

impl ColorImageFormat {
    pub fn label(&self) -> &'static str {
        match self {
            ColorImageFormat::Bgra => "BGRA",
            ColorImageFormat::Rgba => "RGBA",
            ColorImageFormat::Yuy2 => "YUY2",
            ColorImageFormat::Nv12 => "NV12",
            ColorImageFormat::Mjpeg => "MJPEG",
            ColorImageFormat::Rgb => "RGB",
            ColorImageFormat::Bgr => "BGR",
            ColorImageFormat::Gray => "GRAY",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub raw_format: ColorImageFormat,
    pub data: Vec<u8>,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

impl ColorFrame {
    /// Length in bytes of a 32-bit interleaved copy of this frame.
    pub fn bgra_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Opaque handle correlating one body across consecutive body frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct TrackingId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Body {
    pub is_tracked: bool,
    pub tracking_id: TrackingId,
}

#[derive(Clone, Debug)]
pub struct BodyFrame {
    pub bodies: Vec<Body>,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

impl BodyFrame {
    /// Overwrites every slot of `bodies`; slots past the frame's own data become untracked.
    pub fn refresh_body_data(&self, bodies: &mut [Body]) {
        for (idx, slot) in bodies.iter_mut().enumerate() {
            *slot = self.bodies.get(idx).copied().unwrap_or_default();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RectI {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FacePointType {
    EyeLeft,
    EyeRight,
    Nose,
    MouthCornerLeft,
    MouthCornerRight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaceProperty {
    Happy,
    Engaged,
    WearingGlasses,
    LeftEyeClosed,
    RightEyeClosed,
    MouthOpen,
    MouthMoved,
    LookingAway,
}

impl FaceProperty {
    pub fn label(&self) -> &'static str {
        match self {
            FaceProperty::Happy => "Happy",
            FaceProperty::Engaged => "Engaged",
            FaceProperty::WearingGlasses => "Glasses",
            FaceProperty::LeftEyeClosed => "Left eye closed",
            FaceProperty::RightEyeClosed => "Right eye closed",
            FaceProperty::MouthOpen => "Mouth open",
            FaceProperty::MouthMoved => "Mouth moved",
            FaceProperty::LookingAway => "Looking away",
        }
    }

    /// Feature bit that has to be requested for the property to be reported.
    pub fn feature(&self) -> FaceFrameFeatures {
        match self {
            FaceProperty::Happy => FaceFrameFeatures::HAPPY,
            FaceProperty::Engaged => FaceFrameFeatures::FACE_ENGAGEMENT,
            FaceProperty::WearingGlasses => FaceFrameFeatures::GLASSES,
            FaceProperty::LeftEyeClosed => FaceFrameFeatures::LEFT_EYE_CLOSED,
            FaceProperty::RightEyeClosed => FaceFrameFeatures::RIGHT_EYE_CLOSED,
            FaceProperty::MouthOpen => FaceFrameFeatures::MOUTH_OPEN,
            FaceProperty::MouthMoved => FaceFrameFeatures::MOUTH_MOVED,
            FaceProperty::LookingAway => FaceFrameFeatures::LOOKING_AWAY,
        }
    }
}

/// Tri-state confidence of a binary facial state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionResult {
    No,
    Maybe,
    Yes,
}

impl DetectionResult {
    /// `Maybe` counts as detected.
    pub fn is_likely(&self) -> bool {
        matches!(self, DetectionResult::Yes | DetectionResult::Maybe)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DetectionResult::No => "No",
            DetectionResult::Maybe => "Maybe",
            DetectionResult::Yes => "Yes",
        }
    }
}

/// Bitmask selecting what the face tracker computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FaceFrameFeatures(u32);

impl FaceFrameFeatures {
    pub const NONE: Self = Self(0);
    pub const BOUNDING_BOX_IN_COLOR_SPACE: Self = Self(1 << 0);
    pub const POINTS_IN_COLOR_SPACE: Self = Self(1 << 1);
    pub const ROTATION_ORIENTATION: Self = Self(1 << 2);
    pub const HAPPY: Self = Self(1 << 3);
    pub const RIGHT_EYE_CLOSED: Self = Self(1 << 4);
    pub const LEFT_EYE_CLOSED: Self = Self(1 << 5);
    pub const MOUTH_OPEN: Self = Self(1 << 6);
    pub const MOUTH_MOVED: Self = Self(1 << 7);
    pub const LOOKING_AWAY: Self = Self(1 << 8);
    pub const GLASSES: Self = Self(1 << 9);
    pub const FACE_ENGAGEMENT: Self = Self(1 << 10);
    pub const ALL: Self = Self((1 << 11) - 1);

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FaceFrameFeatures {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct FaceFrameResult {
    pub tracking_id: TrackingId,
    pub bounding_box: Option<RectI>,
    pub points: HashMap<FacePointType, PointF>,
    pub properties: HashMap<FaceProperty, DetectionResult>,
}

impl FaceFrameResult {
    pub fn point(&self, kind: FacePointType) -> Option<PointF> {
        self.points.get(&kind).copied()
    }

    pub fn property(&self, kind: FaceProperty) -> Option<DetectionResult> {
        self.properties.get(&kind).copied()
    }
}

#[derive(Clone, Debug)]
pub struct FaceFrame {
    pub tracking_id: TrackingId,
    pub result: Option<FaceFrameResult>,
    #[allow(dead_code)]
    pub timestamp: Instant,
}
