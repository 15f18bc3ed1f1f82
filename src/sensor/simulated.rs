//! Scripted sensor: a moving YUY2 test pattern plus a single person who walks in and out
//! of view, blinks and opens their mouth on a fixed schedule.

use std::{
    sync::{
        Arc, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::Result;
use crossbeam_channel::Sender;

use super::{ColorGeometry, FaceTrackingSlot, SharedFaceRegistration, Worker};
use crate::types::{
    Body, BodyFrame, ColorFrame, ColorImageFormat, DetectionResult, FaceFrame, FaceFrameFeatures,
    FaceFrameResult, FacePointType, FaceProperty, PointF, RectI, TrackingId,
};

pub const SIMULATED_COLOR_SIZE: (u32, u32) = (640, 480);

const SIMULATED_FPS: u64 = 30;
const FRAME_INTERVAL: Duration = Duration::from_millis(1_000 / SIMULATED_FPS);

// One visit lasts PRESENT_STEPS frames, followed by ABSENT_STEPS frames with nobody in view.
const PRESENT_STEPS: u64 = 300;
const ABSENT_STEPS: u64 = 60;
const CYCLE_STEPS: u64 = PRESENT_STEPS + ABSENT_STEPS;
const FIRST_TRACKING_ID: u64 = 72_057_594_037_928_000;

// Slot the scripted person occupies; a bystander appears in a later slot now and then.
const PERSON_SLOT: usize = 1;
const BYSTANDER_SLOT: usize = 4;

/// What the script shows at one step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneSample {
    pub person: Option<TrackingId>,
    pub bystander: Option<TrackingId>,
    pub step: u64,
}

pub fn scene_at(step: u64) -> SceneSample {
    let cycle = step / CYCLE_STEPS;
    let phase = step % CYCLE_STEPS;
    let present = phase < PRESENT_STEPS;

    let person = present.then(|| TrackingId(FIRST_TRACKING_ID + cycle * 2));
    let bystander = (present && phase > 120 && phase < 200)
        .then(|| TrackingId(FIRST_TRACKING_ID + cycle * 2 + 1));

    SceneSample {
        person,
        bystander,
        step,
    }
}

pub fn body_frame_for(sample: &SceneSample, body_count: usize) -> BodyFrame {
    let mut bodies = vec![Body::default(); body_count];
    let slots = [(PERSON_SLOT, sample.person), (BYSTANDER_SLOT, sample.bystander)];
    for (slot, id) in slots {
        if let (Some(body), Some(id)) = (bodies.get_mut(slot), id) {
            *body = Body {
                is_tracked: true,
                tracking_id: id,
            };
        }
    }

    BodyFrame {
        bodies,
        timestamp: Instant::now(),
    }
}

fn blink_state(step: u64, offset: u64) -> DetectionResult {
    match (step + offset) % 90 {
        0..=5 => DetectionResult::Yes,
        6..=7 => DetectionResult::Maybe,
        _ => DetectionResult::No,
    }
}

fn mouth_state(step: u64) -> DetectionResult {
    match (step / 30) % 4 {
        0 => DetectionResult::Yes,
        1 => DetectionResult::Maybe,
        _ => DetectionResult::No,
    }
}

/// Face of the tracked person for `step`, laid out inside a `width`×`height` color image and
/// restricted to the requested `features`.
pub fn face_result_for(
    tracking_id: TrackingId,
    step: u64,
    width: u32,
    height: u32,
    features: FaceFrameFeatures,
) -> FaceFrameResult {
    let (w, h) = (width as f32, height as f32);
    let t = step as f32 / SIMULATED_FPS as f32;
    let center = PointF::new(
        w * (0.5 + 0.2 * (t * 0.7).sin()),
        h * (0.5 + 0.12 * (t * 1.1).cos()),
    );
    let scale = h / 480.0;

    let mut result = FaceFrameResult {
        tracking_id,
        ..Default::default()
    };

    if features.contains(FaceFrameFeatures::BOUNDING_BOX_IN_COLOR_SPACE) {
        result.bounding_box = Some(RectI {
            left: (center.x - 90.0 * scale) as i32,
            top: (center.y - 120.0 * scale) as i32,
            right: (center.x + 90.0 * scale) as i32,
            bottom: (center.y + 120.0 * scale) as i32,
        });
    }

    if features.contains(FaceFrameFeatures::POINTS_IN_COLOR_SPACE) {
        let mouth_half_width = scale * if mouth_state(step).is_likely() { 34.0 } else { 26.0 };
        let points = [
            (FacePointType::EyeLeft, -40.0 * scale, -40.0 * scale),
            (FacePointType::EyeRight, 40.0 * scale, -40.0 * scale),
            (FacePointType::Nose, 0.0, 5.0 * scale),
            (FacePointType::MouthCornerLeft, -mouth_half_width, 55.0 * scale),
            (FacePointType::MouthCornerRight, mouth_half_width, 55.0 * scale),
        ];
        for (kind, dx, dy) in points {
            result
                .points
                .insert(kind, PointF::new(center.x + dx, center.y + dy));
        }
    }

    let properties = [
        (FaceProperty::LeftEyeClosed, blink_state(step, 0)),
        (FaceProperty::RightEyeClosed, blink_state(step, 45)),
        (FaceProperty::MouthOpen, mouth_state(step)),
        (FaceProperty::MouthMoved, mouth_state(step + 15)),
        (
            FaceProperty::Happy,
            if mouth_state(step) == DetectionResult::Yes {
                DetectionResult::Yes
            } else {
                DetectionResult::No
            },
        ),
        (FaceProperty::Engaged, DetectionResult::Yes),
        (FaceProperty::WearingGlasses, DetectionResult::No),
        (
            FaceProperty::LookingAway,
            if (t * 0.7).sin().abs() > 0.95 {
                DetectionResult::Maybe
            } else {
                DetectionResult::No
            },
        ),
    ];
    for (property, value) in properties {
        if features.contains(property.feature()) {
            result.properties.insert(property, value);
        }
    }

    result
}

/// Produces the face frame for one tracker step, or `None` when nothing is attached. A slot
/// pointing at a body that is no longer tracked gets invalidated. Body frames queued before
/// the invalidation still list that body, so consumers should only latch from the newest one.
pub(crate) fn face_frame_for(
    body_frame: &BodyFrame,
    slot: &FaceTrackingSlot,
    features: FaceFrameFeatures,
    step: u64,
    (width, height): (u32, u32),
) -> Option<FaceFrame> {
    if slot.is_closed() || !slot.is_valid() {
        return None;
    }

    let tracking_id = slot.tracking_id();
    let still_tracked = body_frame
        .bodies
        .iter()
        .any(|b| b.is_tracked && b.tracking_id == tracking_id);
    let result = if still_tracked {
        Some(face_result_for(tracking_id, step, width, height, features))
    } else {
        log::debug!("body {} lost, releasing face tracking id", tracking_id.0);
        slot.invalidate();
        None
    };

    Some(FaceFrame {
        tracking_id,
        result,
        timestamp: Instant::now(),
    })
}

pub(crate) fn spawn_tracking_worker(
    body_tx: Sender<BodyFrame>,
    registration: SharedFaceRegistration,
    geometry: Arc<ColorGeometry>,
    body_count: usize,
) -> Result<Worker> {
    Worker::spawn("body-tracker", move |stop: Arc<AtomicBool>| {
        let mut step = 0u64;
        while !stop.load(Ordering::Relaxed) {
            let tick = Instant::now();
            let sample = scene_at(step);
            let body_frame = body_frame_for(&sample, body_count);
            // Published before the face step so a frame without the lost body is already
            // queued when the slot gets invalidated.
            let _ = body_tx.try_send(body_frame.clone());

            {
                let registration = registration.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(registration) = registration.as_ref() {
                    if let Some(face_frame) = face_frame_for(
                        &body_frame,
                        &registration.slot,
                        registration.features,
                        step,
                        geometry.get(),
                    ) {
                        // Drop when the reader is behind, like a sensor recycling its buffer.
                        let _ = registration.tx.try_send(face_frame);
                    }
                }
            }

            step += 1;
            thread::sleep(FRAME_INTERVAL.saturating_sub(tick.elapsed()));
        }
        log::debug!("body tracker stopped after {step} steps");
    })
}

/// A YUY2 frame with horizontal luma bars drifting over time.
pub fn test_pattern_frame(width: u32, height: u32, step: u64) -> ColorFrame {
    let mut data = Vec::with_capacity(width as usize * height as usize * 2);
    for y in 0..height {
        for x in (0..width).step_by(2) {
            let luma = |x: u32| (((x + y / 4 + step as u32 * 2) % 256) as u8) / 2 + 48;
            let u = (96 + (y * 64 / height.max(1))) as u8;
            let v = (160 - (x * 64 / width.max(1))) as u8;
            data.extend_from_slice(&[luma(x), u, luma(x + 1), v]);
        }
    }

    ColorFrame {
        width,
        height,
        raw_format: ColorImageFormat::Yuy2,
        data,
        timestamp: Instant::now(),
    }
}

pub(crate) fn spawn_color_worker(
    color_tx: Sender<ColorFrame>,
    geometry: Arc<ColorGeometry>,
) -> Result<Worker> {
    let (width, height) = SIMULATED_COLOR_SIZE;
    geometry.set(width, height);

    Worker::spawn("color-pattern", move |stop: Arc<AtomicBool>| {
        let mut step = 0u64;
        while !stop.load(Ordering::Relaxed) {
            let tick = Instant::now();
            let _ = color_tx.try_send(test_pattern_frame(width, height, step));
            step += 1;
            thread::sleep(FRAME_INTERVAL.saturating_sub(tick.elapsed()));
        }
    })
}
