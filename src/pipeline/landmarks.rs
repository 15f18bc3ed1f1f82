use crate::types::{DetectionResult, FaceFrameResult, FacePointType, FaceProperty, PointF, RectI};

pub const EYE_MARKER_SIZE: f32 = 20.0;
pub const NOSE_MARKER_SIZE: f32 = 20.0;
pub const MOUTH_OPEN_HEIGHT: f32 = 50.0;
pub const MOUTH_CLOSED_HEIGHT: f32 = 20.0;

/// Position, size and visibility of one overlay shape, in color image coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeDescriptor {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub visible: bool,
}

impl ShapeDescriptor {
    pub const HIDDEN: Self = Self {
        left: 0.0,
        top: 0.0,
        width: 0.0,
        height: 0.0,
        visible: false,
    };

    pub fn centered_on(center: PointF, width: f32, height: f32, visible: bool) -> Self {
        Self {
            left: center.x - width / 2.0,
            top: center.y - height / 2.0,
            width,
            height,
            visible,
        }
    }

    pub fn from_rect(rect: RectI) -> Self {
        Self {
            left: rect.left as f32,
            top: rect.top as f32,
            width: (rect.right - rect.left).max(0) as f32,
            height: (rect.bottom - rect.top).max(0) as f32,
            visible: true,
        }
    }

    #[cfg(test)]
    pub fn center(&self) -> PointF {
        PointF::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// Secondary face properties shown as text next to the overlay.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FaceStatus {
    pub happy: Option<DetectionResult>,
    pub engaged: Option<DetectionResult>,
    pub wearing_glasses: Option<DetectionResult>,
    pub looking_away: Option<DetectionResult>,
}

impl FaceStatus {
    fn from_result(result: &FaceFrameResult) -> Self {
        Self {
            happy: result.property(FaceProperty::Happy),
            engaged: result.property(FaceProperty::Engaged),
            wearing_glasses: result.property(FaceProperty::WearingGlasses),
            looking_away: result.property(FaceProperty::LookingAway),
        }
    }

    pub fn entries(&self) -> Vec<(&'static str, DetectionResult)> {
        [
            (FaceProperty::Happy, self.happy),
            (FaceProperty::Engaged, self.engaged),
            (FaceProperty::WearingGlasses, self.wearing_glasses),
            (FaceProperty::LookingAway, self.looking_away),
        ]
        .into_iter()
        .filter_map(|(property, value)| value.map(|v| (property.label(), v)))
        .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FaceOverlay {
    pub eye_left: ShapeDescriptor,
    pub eye_right: ShapeDescriptor,
    pub nose: ShapeDescriptor,
    pub mouth: ShapeDescriptor,
    pub face_box: ShapeDescriptor,
    pub status: FaceStatus,
}

impl Default for FaceOverlay {
    fn default() -> Self {
        Self {
            eye_left: ShapeDescriptor::HIDDEN,
            eye_right: ShapeDescriptor::HIDDEN,
            nose: ShapeDescriptor::HIDDEN,
            mouth: ShapeDescriptor::HIDDEN,
            face_box: ShapeDescriptor::HIDDEN,
            status: FaceStatus::default(),
        }
    }
}

impl FaceOverlay {
    /// Maps a face result onto the overlay shapes. `None` when any of the five landmarks is
    /// missing from the result.
    pub fn project(result: &FaceFrameResult) -> Option<Self> {
        let eye_left = result.point(FacePointType::EyeLeft)?;
        let eye_right = result.point(FacePointType::EyeRight)?;
        let nose = result.point(FacePointType::Nose)?;
        let mouth_left = result.point(FacePointType::MouthCornerLeft)?;
        let mouth_right = result.point(FacePointType::MouthCornerRight)?;

        let detected = |property: FaceProperty| {
            result
                .property(property)
                .is_some_and(|value| value.is_likely())
        };
        let mouth_open = detected(FaceProperty::MouthOpen);

        let mouth_center = PointF::new(
            (mouth_left.x + mouth_right.x) / 2.0,
            (mouth_left.y + mouth_right.y) / 2.0,
        );
        let mouth_width = (mouth_right.x - mouth_left.x).abs();
        let mouth_height = if mouth_open {
            MOUTH_OPEN_HEIGHT
        } else {
            MOUTH_CLOSED_HEIGHT
        };

        Some(Self {
            eye_left: ShapeDescriptor::centered_on(
                eye_left,
                EYE_MARKER_SIZE,
                EYE_MARKER_SIZE,
                !detected(FaceProperty::LeftEyeClosed),
            ),
            eye_right: ShapeDescriptor::centered_on(
                eye_right,
                EYE_MARKER_SIZE,
                EYE_MARKER_SIZE,
                !detected(FaceProperty::RightEyeClosed),
            ),
            nose: ShapeDescriptor::centered_on(nose, NOSE_MARKER_SIZE, NOSE_MARKER_SIZE, true),
            mouth: ShapeDescriptor::centered_on(mouth_center, mouth_width, mouth_height, true),
            face_box: result
                .bounding_box
                .map(ShapeDescriptor::from_rect)
                .unwrap_or(ShapeDescriptor::HIDDEN),
            status: FaceStatus::from_result(result),
        })
    }

    /// Replaces every shape from `result`. Leaves the overlay untouched and returns `false`
    /// when there is nothing to project.
    pub fn apply(&mut self, result: Option<&FaceFrameResult>) -> bool {
        match result.and_then(Self::project) {
            Some(projected) => {
                *self = projected;
                true
            }
            None => false,
        }
    }

    pub fn shapes(&self) -> [(OverlayShape, &ShapeDescriptor); 5] {
        [
            (OverlayShape::FaceBox, &self.face_box),
            (OverlayShape::EyeLeft, &self.eye_left),
            (OverlayShape::EyeRight, &self.eye_right),
            (OverlayShape::Nose, &self.nose),
            (OverlayShape::Mouth, &self.mouth),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayShape {
    FaceBox,
    EyeLeft,
    EyeRight,
    Nose,
    Mouth,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrackingId;

    fn result(
        left_eye_closed: DetectionResult,
        right_eye_closed: DetectionResult,
        mouth_open: DetectionResult,
    ) -> FaceFrameResult {
        let mut result = FaceFrameResult {
            tracking_id: TrackingId(1),
            bounding_box: Some(RectI {
                left: 60,
                top: 80,
                right: 180,
                bottom: 240,
            }),
            ..Default::default()
        };
        result.points.insert(FacePointType::EyeLeft, PointF::new(90.0, 120.0));
        result.points.insert(FacePointType::EyeRight, PointF::new(150.0, 122.0));
        result.points.insert(FacePointType::Nose, PointF::new(120.0, 160.0));
        result
            .points
            .insert(FacePointType::MouthCornerLeft, PointF::new(100.0, 200.0));
        result
            .points
            .insert(FacePointType::MouthCornerRight, PointF::new(140.0, 200.0));
        result
            .properties
            .insert(FaceProperty::LeftEyeClosed, left_eye_closed);
        result
            .properties
            .insert(FaceProperty::RightEyeClosed, right_eye_closed);
        result.properties.insert(FaceProperty::MouthOpen, mouth_open);
        result
    }

    #[test]
    fn mouth_height_follows_open_flag() {
        use DetectionResult::*;

        let open = FaceOverlay::project(&result(No, No, Yes)).unwrap();
        assert_eq!(open.mouth.height, 50.0);

        let maybe = FaceOverlay::project(&result(No, No, Maybe)).unwrap();
        assert_eq!(maybe.mouth.height, 50.0);

        let closed = FaceOverlay::project(&result(No, No, No)).unwrap();
        assert_eq!(closed.mouth.height, 20.0);
    }

    #[test]
    fn closed_eyes_are_hidden() {
        use DetectionResult::*;

        let maybe = FaceOverlay::project(&result(Maybe, No, No)).unwrap();
        assert!(!maybe.eye_left.visible);
        assert!(maybe.eye_right.visible);

        let open = FaceOverlay::project(&result(No, Yes, No)).unwrap();
        assert!(open.eye_left.visible);
        assert!(!open.eye_right.visible);
    }

    #[test]
    fn mouth_spans_the_corners() {
        let all_no = result(DetectionResult::No, DetectionResult::No, DetectionResult::No);
        let overlay = FaceOverlay::project(&all_no).unwrap();

        assert_eq!(overlay.mouth.width, 40.0);
        assert_eq!(overlay.mouth.center(), PointF::new(120.0, 200.0));
        assert_eq!(overlay.mouth.left, 100.0);
    }

    #[test]
    fn markers_are_centered_on_points() {
        let all_no = result(DetectionResult::No, DetectionResult::No, DetectionResult::No);
        let overlay = FaceOverlay::project(&all_no).unwrap();

        assert_eq!(overlay.eye_left.left, 80.0);
        assert_eq!(overlay.eye_left.top, 110.0);
        assert_eq!(overlay.nose.center(), PointF::new(120.0, 160.0));
        assert_eq!(overlay.face_box.width, 120.0);
        assert!(overlay.face_box.visible);
    }

    #[test]
    fn projecting_twice_is_identical() {
        let input = result(DetectionResult::Maybe, DetectionResult::No, DetectionResult::Yes);
        let mut overlay = FaceOverlay::default();

        assert!(overlay.apply(Some(&input)));
        let first = overlay.clone();
        assert!(overlay.apply(Some(&input)));

        assert_eq!(first, overlay);
    }

    #[test]
    fn missing_result_keeps_previous_state() {
        let input = result(DetectionResult::No, DetectionResult::No, DetectionResult::Yes);
        let mut overlay = FaceOverlay::default();
        overlay.apply(Some(&input));
        let before = overlay.clone();

        assert!(!overlay.apply(None));

        let mut partial = input.clone();
        partial.points.remove(&FacePointType::Nose);
        assert!(!overlay.apply(Some(&partial)));

        assert_eq!(before, overlay);
    }

    #[test]
    fn status_lists_reported_properties() {
        let mut input = result(DetectionResult::No, DetectionResult::No, DetectionResult::No);
        input
            .properties
            .insert(FaceProperty::Happy, DetectionResult::Maybe);

        let overlay = FaceOverlay::project(&input).unwrap();

        assert_eq!(overlay.status.entries(), vec![("Happy", DetectionResult::Maybe)]);
    }
}
