use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    pipeline::{
        bitmap::{ColorBitmapGenerator, WriteableBitmap},
        landmarks::FaceOverlay,
        tracking::{FaceSlot, FaceTrackingCoordinator, FaceTrackingTarget},
    },
    sensor::{FaceFrameSource, FrameReader, Sensor, SensorBackend},
    types::{
        BodyFrame, ColorFrame, ColorImageFormat, FaceFrame, FaceFrameFeatures, TrackingId,
    },
};

/// Everything the overlay needs from the face tracker.
pub fn requested_face_features() -> FaceFrameFeatures {
    FaceFrameFeatures::BOUNDING_BOX_IN_COLOR_SPACE
        | FaceFrameFeatures::FACE_ENGAGEMENT
        | FaceFrameFeatures::GLASSES
        | FaceFrameFeatures::HAPPY
        | FaceFrameFeatures::LEFT_EYE_CLOSED
        | FaceFrameFeatures::MOUTH_OPEN
        | FaceFrameFeatures::POINTS_IN_COLOR_SPACE
        | FaceFrameFeatures::RIGHT_EYE_CLOSED
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub color_frames: u64,
    pub body_frames: u64,
    pub face_frames: u64,
    pub face_results: u64,
    pub conversion_failures: u64,
    pub tracked_bodies: usize,
    pub last_color_format: Option<ColorImageFormat>,
}

/// State touched by the frame handlers, kept apart from the readers so a reader can be
/// drained while its handler mutates this.
#[derive(Debug)]
pub struct FrameHandlers {
    bitmap_generator: ColorBitmapGenerator,
    coordinator: FaceTrackingCoordinator,
    overlay: FaceOverlay,
    stats: SessionStats,
}

impl FrameHandlers {
    pub fn new(body_count: usize) -> Self {
        Self {
            bitmap_generator: ColorBitmapGenerator::new(),
            coordinator: FaceTrackingCoordinator::new(body_count),
            overlay: FaceOverlay::default(),
            stats: SessionStats::default(),
        }
    }

    pub fn on_color_frame(&mut self, frame: &ColorFrame) {
        self.stats.color_frames += 1;
        self.stats.last_color_format = Some(frame.raw_format);
        if let Err(err) = self.bitmap_generator.update(frame) {
            self.stats.conversion_failures += 1;
            log::warn!("dropping color frame: {err:#}");
        }
    }

    pub fn on_body_frame<T: FaceTrackingTarget>(
        &mut self,
        frame: &BodyFrame,
        target: Option<&mut T>,
    ) {
        self.stats.body_frames += 1;
        match target {
            Some(target) => {
                self.coordinator.on_body_frame(frame, target);
                self.stats.tracked_bodies = self.coordinator.tracked_body_count();
            }
            None => {
                self.stats.tracked_bodies = frame.bodies.iter().filter(|b| b.is_tracked).count();
            }
        }
    }

    pub fn on_face_frame(&mut self, frame: &FaceFrame) {
        self.stats.face_frames += 1;
        if self.overlay.apply(frame.result.as_ref()) {
            self.stats.face_results += 1;
        } else {
            log::trace!("face frame for {} carried no usable result", frame.tracking_id.0);
        }
    }

    pub fn bitmap(&self) -> Option<&Arc<WriteableBitmap>> {
        self.bitmap_generator.bitmap()
    }

    pub fn overlay(&self) -> &FaceOverlay {
        &self.overlay
    }

    pub fn face_slot(&self) -> FaceSlot {
        self.coordinator.slot()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}

/// One running sensor with its readers, face source and frame handlers.
#[derive(Debug)]
pub struct FaceSession {
    sensor_label: String,
    sensor: Option<Sensor>,
    color_reader: Option<FrameReader<ColorFrame>>,
    body_reader: Option<FrameReader<BodyFrame>>,
    face_reader: Option<FrameReader<FaceFrame>>,
    face_source: Option<FaceFrameSource>,
    handlers: FrameHandlers,
}

impl FaceSession {
    /// Opens the default sensor for `backend`. `Ok(None)` when no sensor is attached.
    pub fn start(backend: &SensorBackend) -> Result<Option<Self>> {
        let Some(sensor) = Sensor::get_default(backend)? else {
            return Ok(None);
        };
        Self::from_sensor(sensor).map(Some)
    }

    pub fn from_sensor(mut sensor: Sensor) -> Result<Self> {
        sensor.open()?;

        let color_reader = sensor.open_color_reader()?;
        let body_reader = sensor.open_body_reader()?;
        let mut face_source =
            FaceFrameSource::new(&mut sensor, TrackingId::default(), requested_face_features())
                .context("failed to register face frame source")?;
        let face_reader = face_source.open_reader()?;
        log::debug!(
            "opened {}, {} and {} readers with face features {:?}",
            color_reader.stream(),
            body_reader.stream(),
            face_reader.stream(),
            face_source.features()
        );

        Ok(Self {
            sensor_label: sensor.description(),
            handlers: FrameHandlers::new(sensor.body_count()),
            sensor: Some(sensor),
            color_reader: Some(color_reader),
            body_reader: Some(body_reader),
            face_reader: Some(face_reader),
            face_source: Some(face_source),
        })
    }

    pub fn sensor_label(&self) -> &str {
        &self.sensor_label
    }

    pub fn is_running(&self) -> bool {
        self.sensor.as_ref().is_some_and(Sensor::is_open)
    }

    /// Delivers every color and face frame that arrived since the last call, color first.
    /// Only the newest body frame reaches the coordinator. Returns the number of frames taken.
    pub fn dispatch_pending(&mut self) -> usize {
        let Self {
            color_reader,
            body_reader,
            face_reader,
            face_source,
            handlers,
            ..
        } = self;

        let mut delivered = 0;
        if let Some(reader) = color_reader {
            delivered += reader.drain(|frame| handlers.on_color_frame(frame));
        }
        if let Some(reader) = body_reader {
            // Older queued body frames can still list a body the tracker already released.
            delivered +=
                reader.drain_latest(|frame| handlers.on_body_frame(frame, face_source.as_mut()));
        }
        if let Some(reader) = face_reader {
            delivered += reader.drain(|frame| handlers.on_face_frame(frame));
        }
        delivered
    }

    pub fn handlers(&self) -> &FrameHandlers {
        &self.handlers
    }

    pub fn bitmap(&self) -> Option<&Arc<WriteableBitmap>> {
        self.handlers.bitmap()
    }

    pub fn overlay(&self) -> &FaceOverlay {
        self.handlers.overlay()
    }

    pub fn stats(&self) -> SessionStats {
        self.handlers.stats()
    }

    /// Releases readers, the face source and the sensor, in that order. Repeated calls are
    /// no-ops.
    pub fn shutdown(&mut self) {
        if let Some(mut reader) = self.color_reader.take() {
            reader.dispose();
        }
        if let Some(mut reader) = self.body_reader.take() {
            reader.dispose();
        }
        if let Some(mut reader) = self.face_reader.take() {
            reader.dispose();
        }
        if let Some(mut source) = self.face_source.take() {
            source.dispose();
        }
        if let Some(mut sensor) = self.sensor.take() {
            sensor.close();
            log::info!("session for {} shut down", self.sensor_label);
        }
    }
}

impl Drop for FaceSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
