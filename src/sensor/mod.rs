use std::{
    env, fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    },
    thread,
};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, bounded};
use thiserror::Error;

use crate::{
    pipeline::tracking::FaceTrackingTarget,
    types::{BodyFrame, ColorFrame, FaceFrame, FaceFrameFeatures, TrackingId},
};

#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod simulated;

/// Number of body slots reported in every body frame.
pub const BODY_COUNT: usize = 6;

const SENSOR_ENV_VAR: &str = "FACE_BASICS_SENSOR";
const COLOR_QUEUE_DEPTH: usize = 2;
const BODY_QUEUE_DEPTH: usize = 4;
const FACE_QUEUE_DEPTH: usize = 4;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor is not open")]
    NotOpen,
    #[error("{0} reader is already open")]
    ReaderAlreadyOpen(&'static str),
    #[error("a face frame source is already registered with this sensor")]
    FaceSourceAlreadyRegistered,
    #[error("face frame source has been disposed")]
    FaceSourceDisposed,
}

/// Where frames come from. The camera backend pairs webcam color frames with the scripted
/// tracker, so it is opt-in through `FACE_BASICS_SENSOR=camera`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SensorBackend {
    #[default]
    Simulated,
    #[cfg(feature = "camera-nokhwa")]
    Camera,
}

impl SensorBackend {
    /// Reads `FACE_BASICS_SENSOR`, falling back to the default for unknown or missing values.
    pub fn from_env() -> Self {
        match env::var(SENSOR_ENV_VAR) {
            Ok(value) => Self::from_name(&value).unwrap_or_else(|| {
                log::warn!("unknown {SENSOR_ENV_VAR} value {value:?}, using default backend");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "simulated" | "sim" => Some(SensorBackend::Simulated),
            #[cfg(feature = "camera-nokhwa")]
            "camera" | "webcam" => Some(SensorBackend::Camera),
            _ => None,
        }
    }
}

/// Latest color resolution, read by the tracker to place faces inside the image.
#[derive(Debug)]
pub(crate) struct ColorGeometry {
    width: AtomicU32,
    height: AtomicU32,
}

impl ColorGeometry {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width: AtomicU32::new(width),
            height: AtomicU32::new(height),
        }
    }

    pub(crate) fn set(&self, width: u32, height: u32) {
        self.width.store(width, Ordering::Relaxed);
        self.height.store(height, Ordering::Relaxed);
    }

    pub(crate) fn get(&self) -> (u32, u32) {
        (
            self.width.load(Ordering::Relaxed),
            self.height.load(Ordering::Relaxed),
        )
    }
}

/// Tracking id shared between a face source and the tracker serving it. Id `0` means
/// "nothing attached".
#[derive(Debug, Default)]
pub(crate) struct FaceTrackingSlot {
    tracking_id: AtomicU64,
    valid: AtomicBool,
    closed: AtomicBool,
}

impl FaceTrackingSlot {
    pub(crate) fn tracking_id(&self) -> TrackingId {
        TrackingId(self.tracking_id.load(Ordering::SeqCst))
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    pub(crate) fn assign(&self, id: TrackingId) {
        self.tracking_id.store(id.0, Ordering::SeqCst);
        self.valid.store(id.0 != 0, Ordering::SeqCst);
    }

    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.invalidate();
    }
}

#[derive(Debug)]
pub(crate) struct FaceRegistration {
    pub(crate) slot: Arc<FaceTrackingSlot>,
    pub(crate) features: FaceFrameFeatures,
    pub(crate) tx: Sender<FaceFrame>,
}

pub(crate) type SharedFaceRegistration = Arc<Mutex<Option<FaceRegistration>>>;

/// Background producer thread owned by the sensor.
#[derive(Debug)]
pub(crate) struct Worker {
    name: &'static str,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn<F>(name: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(stop_flag))
            .with_context(|| format!("failed to spawn {name} worker"))?;

        Ok(Self {
            name,
            stop,
            handle: Some(handle),
        })
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{} worker panicked", self.name);
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Receiving end of one frame stream. Frames are handed to a handler by reference and
/// released as soon as the handler returns.
pub struct FrameReader<F> {
    stream: &'static str,
    rx: Option<Receiver<F>>,
}

impl<F> FrameReader<F> {
    pub(crate) fn new(stream: &'static str, rx: Receiver<F>) -> Self {
        Self {
            stream,
            rx: Some(rx),
        }
    }

    pub fn stream(&self) -> &'static str {
        self.stream
    }

    /// Invokes `handler` once per frame that arrived since the last call.
    pub fn drain(&self, mut handler: impl FnMut(&F)) -> usize {
        let Some(rx) = self.rx.as_ref() else {
            return 0;
        };

        let mut delivered = 0;
        while let Ok(frame) = rx.try_recv() {
            handler(&frame);
            delivered += 1;
        }
        delivered
    }

    /// Empties the queue and hands only the newest frame to `handler`. Returns how many
    /// frames were taken.
    pub fn drain_latest(&self, handler: impl FnOnce(&F)) -> usize {
        let Some(rx) = self.rx.as_ref() else {
            return 0;
        };

        let mut taken = 0;
        let mut latest = None;
        while let Ok(frame) = rx.try_recv() {
            latest = Some(frame);
            taken += 1;
        }
        if let Some(frame) = latest {
            handler(&frame);
        }
        taken
    }

    pub fn is_disposed(&self) -> bool {
        self.rx.is_none()
    }

    pub fn dispose(&mut self) {
        if self.rx.take().is_some() {
            log::debug!("{} reader disposed", self.stream);
        }
    }
}

impl<F> fmt::Debug for FrameReader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameReader")
            .field("stream", &self.stream)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[derive(Debug)]
enum ColorSource {
    Simulated,
    #[cfg(feature = "camera-nokhwa")]
    Camera(camera::CameraDevice),
}

/// Handle to the frame producer: a color stream, a body stream and at most one face
/// tracking source.
#[derive(Debug)]
pub struct Sensor {
    color_source: ColorSource,
    body_count: usize,
    workers: Vec<Worker>,
    color_rx: Option<Receiver<ColorFrame>>,
    body_rx: Option<Receiver<BodyFrame>>,
    face_registration: SharedFaceRegistration,
    geometry: Arc<ColorGeometry>,
    is_open: bool,
}

impl Sensor {
    /// Finds the sensor for `backend`. `Ok(None)` means no device is attached.
    pub fn get_default(backend: &SensorBackend) -> Result<Option<Sensor>> {
        let color_source = match backend {
            SensorBackend::Simulated => ColorSource::Simulated,
            #[cfg(feature = "camera-nokhwa")]
            SensorBackend::Camera => {
                let mut cameras = camera::available_cameras()?;
                if cameras.is_empty() {
                    log::info!("no camera attached");
                    return Ok(None);
                }
                ColorSource::Camera(cameras.remove(0))
            }
        };

        let (width, height) = simulated::SIMULATED_COLOR_SIZE;
        Ok(Some(Sensor {
            color_source,
            body_count: BODY_COUNT,
            workers: Vec::new(),
            color_rx: None,
            body_rx: None,
            face_registration: Arc::new(Mutex::new(None)),
            geometry: Arc::new(ColorGeometry::new(width, height)),
            is_open: false,
        }))
    }

    pub fn description(&self) -> String {
        match &self.color_source {
            ColorSource::Simulated => "Simulated sensor".to_string(),
            #[cfg(feature = "camera-nokhwa")]
            ColorSource::Camera(device) => device.label.clone(),
        }
    }

    pub fn body_count(&self) -> usize {
        self.body_count
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Starts the color and tracking producers. Opening an open sensor does nothing.
    pub fn open(&mut self) -> Result<()> {
        if self.is_open {
            return Ok(());
        }

        let (color_tx, color_rx) = bounded(COLOR_QUEUE_DEPTH);
        let (body_tx, body_rx) = bounded(BODY_QUEUE_DEPTH);

        let color_worker = match &self.color_source {
            ColorSource::Simulated => {
                simulated::spawn_color_worker(color_tx, self.geometry.clone())?
            }
            #[cfg(feature = "camera-nokhwa")]
            ColorSource::Camera(device) => {
                camera::spawn_color_worker(device.index.clone(), color_tx, self.geometry.clone())?
            }
        };
        let tracking_worker = simulated::spawn_tracking_worker(
            body_tx,
            self.face_registration.clone(),
            self.geometry.clone(),
            self.body_count,
        )?;

        self.workers = vec![color_worker, tracking_worker];
        self.color_rx = Some(color_rx);
        self.body_rx = Some(body_rx);
        self.is_open = true;
        log::info!("{} opened", self.description());
        Ok(())
    }

    /// Stops all producers. Safe to call repeatedly.
    pub fn close(&mut self) {
        if !self.is_open {
            return;
        }

        if let Some(registration) = self.registration().take() {
            registration.slot.close();
        }
        for mut worker in self.workers.drain(..) {
            worker.shutdown();
        }
        self.color_rx = None;
        self.body_rx = None;
        self.is_open = false;
        log::info!("{} closed", self.description());
    }

    pub fn open_color_reader(&mut self) -> Result<FrameReader<ColorFrame>, SensorError> {
        if !self.is_open {
            return Err(SensorError::NotOpen);
        }
        let rx = self
            .color_rx
            .take()
            .ok_or(SensorError::ReaderAlreadyOpen("color"))?;
        Ok(FrameReader::new("color", rx))
    }

    pub fn open_body_reader(&mut self) -> Result<FrameReader<BodyFrame>, SensorError> {
        if !self.is_open {
            return Err(SensorError::NotOpen);
        }
        let rx = self
            .body_rx
            .take()
            .ok_or(SensorError::ReaderAlreadyOpen("body"))?;
        Ok(FrameReader::new("body", rx))
    }

    fn registration(&self) -> std::sync::MutexGuard<'_, Option<FaceRegistration>> {
        self.face_registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn register_face_source(
        &mut self,
        features: FaceFrameFeatures,
    ) -> Result<(Arc<FaceTrackingSlot>, Receiver<FaceFrame>), SensorError> {
        if !self.is_open {
            return Err(SensorError::NotOpen);
        }

        let mut registration = self.registration();
        if registration
            .as_ref()
            .is_some_and(|existing| !existing.slot.is_closed())
        {
            return Err(SensorError::FaceSourceAlreadyRegistered);
        }

        let (tx, rx) = bounded(FACE_QUEUE_DEPTH);
        let slot = Arc::new(FaceTrackingSlot::default());
        *registration = Some(FaceRegistration {
            slot: slot.clone(),
            features,
            tx,
        });
        Ok((slot, rx))
    }
}

impl Drop for Sensor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Face tracking request bound to one sensor. Holds at most one tracking id; the tracker
/// invalidates it when the body is lost.
#[derive(Debug)]
pub struct FaceFrameSource {
    features: FaceFrameFeatures,
    slot: Arc<FaceTrackingSlot>,
    face_rx: Option<Receiver<FaceFrame>>,
}

impl FaceFrameSource {
    pub fn new(
        sensor: &mut Sensor,
        initial_tracking_id: TrackingId,
        features: FaceFrameFeatures,
    ) -> Result<Self, SensorError> {
        let (slot, face_rx) = sensor.register_face_source(features)?;
        slot.assign(initial_tracking_id);
        Ok(Self {
            features,
            slot,
            face_rx: Some(face_rx),
        })
    }

    pub fn features(&self) -> FaceFrameFeatures {
        self.features
    }

    #[cfg(test)]
    pub fn tracking_id(&self) -> TrackingId {
        self.slot.tracking_id()
    }

    pub fn open_reader(&mut self) -> Result<FrameReader<FaceFrame>, SensorError> {
        if self.slot.is_closed() {
            return Err(SensorError::FaceSourceDisposed);
        }
        let rx = self
            .face_rx
            .take()
            .ok_or(SensorError::ReaderAlreadyOpen("face"))?;
        Ok(FrameReader::new("face", rx))
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.is_closed()
    }

    /// Detaches from the tracker. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if !self.slot.is_closed() {
            self.slot.close();
            log::debug!("face source disposed");
        }
        self.face_rx = None;
    }
}

impl FaceTrackingTarget for FaceFrameSource {
    fn is_tracking_id_valid(&self) -> bool {
        self.slot.is_valid()
    }

    fn set_tracking_id(&mut self, id: TrackingId) {
        self.slot.assign(id);
    }
}

impl Drop for FaceFrameSource {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn scripted_backend_is_the_default() {
        assert_eq!(SensorBackend::default(), SensorBackend::Simulated);
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!(
            SensorBackend::from_name(" Simulated "),
            Some(SensorBackend::Simulated)
        );
        assert_eq!(SensorBackend::from_name("kinect"), None);
    }

    #[test]
    fn readers_require_an_open_sensor() {
        let mut sensor = Sensor::get_default(&SensorBackend::Simulated)
            .unwrap()
            .unwrap();

        assert!(matches!(
            sensor.open_color_reader(),
            Err(SensorError::NotOpen)
        ));
        assert!(matches!(
            FaceFrameSource::new(&mut sensor, TrackingId(0), FaceFrameFeatures::NONE),
            Err(SensorError::NotOpen)
        ));
    }

    #[test]
    fn readers_open_once() {
        let mut sensor = Sensor::get_default(&SensorBackend::Simulated)
            .unwrap()
            .unwrap();
        sensor.open().unwrap();

        assert!(sensor.open_color_reader().is_ok());
        assert!(matches!(
            sensor.open_color_reader(),
            Err(SensorError::ReaderAlreadyOpen("color"))
        ));
        assert!(sensor.open_body_reader().is_ok());

        sensor.close();
        sensor.close();
        assert!(!sensor.is_open());
    }

    #[test]
    fn only_one_live_face_source() {
        let mut sensor = Sensor::get_default(&SensorBackend::Simulated)
            .unwrap()
            .unwrap();
        sensor.open().unwrap();

        let mut first =
            FaceFrameSource::new(&mut sensor, TrackingId(0), FaceFrameFeatures::NONE).unwrap();
        assert!(matches!(
            FaceFrameSource::new(&mut sensor, TrackingId(0), FaceFrameFeatures::NONE),
            Err(SensorError::FaceSourceAlreadyRegistered)
        ));

        first.dispose();
        first.dispose();
        assert!(first.is_disposed());
        assert!(FaceFrameSource::new(&mut sensor, TrackingId(0), FaceFrameFeatures::NONE).is_ok());
    }

    #[test]
    fn tracking_id_zero_is_not_valid() {
        let mut sensor = Sensor::get_default(&SensorBackend::Simulated)
            .unwrap()
            .unwrap();
        sensor.open().unwrap();
        let mut source =
            FaceFrameSource::new(&mut sensor, TrackingId(0), FaceFrameFeatures::NONE).unwrap();

        assert!(!source.is_tracking_id_valid());
        source.set_tracking_id(TrackingId(17));
        assert!(source.is_tracking_id_valid());
        assert_eq!(source.tracking_id(), TrackingId(17));
    }

    #[test]
    fn simulated_sensor_delivers_frames() {
        let mut sensor = Sensor::get_default(&SensorBackend::Simulated)
            .unwrap()
            .unwrap();
        sensor.open().unwrap();
        let color = sensor.open_color_reader().unwrap();
        let body = sensor.open_body_reader().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let (mut colors, mut bodies) = (0, 0);
        while (colors == 0 || bodies == 0) && Instant::now() < deadline {
            colors += color.drain(|frame| assert_eq!(frame.data.len(), frame.bgra_len() / 2));
            bodies += body.drain(|frame| assert_eq!(frame.bodies.len(), BODY_COUNT));
            thread::sleep(Duration::from_millis(10));
        }

        assert!(colors > 0);
        assert!(bodies > 0);
    }

    #[test]
    fn stale_body_frames_do_not_relatch_a_lost_body() {
        use crate::{
            pipeline::tracking::{FaceSlot, FaceTrackingCoordinator},
            types::Body,
        };

        #[derive(Default)]
        struct Released(Option<TrackingId>);

        impl FaceTrackingTarget for Released {
            fn is_tracking_id_valid(&self) -> bool {
                self.0.is_some()
            }

            fn set_tracking_id(&mut self, id: TrackingId) {
                self.0 = Some(id);
            }
        }

        let body_frame = |tracked: bool| BodyFrame {
            bodies: vec![Body {
                is_tracked: tracked,
                tracking_id: TrackingId(5),
            }],
            timestamp: Instant::now(),
        };
        let (tx, rx) = bounded(BODY_QUEUE_DEPTH);
        tx.send(body_frame(true)).unwrap();
        tx.send(body_frame(true)).unwrap();
        tx.send(body_frame(false)).unwrap();
        let reader = FrameReader::new("body", rx);

        let mut coordinator = FaceTrackingCoordinator::new(BODY_COUNT);
        let mut target = Released::default();
        let taken = reader.drain_latest(|frame| {
            coordinator.on_body_frame(frame, &mut target);
        });

        assert_eq!(taken, 3);
        assert_eq!(target.0, None);
        assert_eq!(coordinator.slot(), FaceSlot::Unassigned);
        assert_eq!(reader.drain_latest(|_| panic!("queue is empty")), 0);
    }

    #[test]
    fn disposed_reader_delivers_nothing() {
        let (tx, rx) = bounded(1);
        let mut reader = FrameReader::new("test", rx);
        tx.send(1u32).unwrap();

        reader.dispose();
        reader.dispose();

        assert_eq!(reader.drain(|_| panic!("no frames after dispose")), 0);
    }
}
