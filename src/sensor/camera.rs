use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use anyhow::{Result, anyhow};
use crossbeam_channel::Sender;
use nokhwa::{
    Buffer, Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraIndex, CameraInfo, FrameFormat, RequestedFormat, RequestedFormatType,
    },
};

use super::{ColorGeometry, Worker};
use crate::types::{ColorFrame, ColorImageFormat};

// Raw formats first so most frames skip the JPEG decoder; macOS built-in cameras often
// reject YUYV even though Nokhwa reports it.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 4] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: format_camera_label(&info),
        })
        .collect())
}

fn format_camera_label(info: &CameraInfo) -> String {
    info.human_name()
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

pub fn native_format(format: FrameFormat) -> ColorImageFormat {
    match format {
        FrameFormat::MJPEG => ColorImageFormat::Mjpeg,
        FrameFormat::YUYV => ColorImageFormat::Yuy2,
        FrameFormat::NV12 => ColorImageFormat::Nv12,
        FrameFormat::GRAY => ColorImageFormat::Gray,
        FrameFormat::RAWRGB => ColorImageFormat::Rgb,
        FrameFormat::RAWBGR => ColorImageFormat::Bgr,
    }
}

fn to_color_frame(buffer: &Buffer) -> ColorFrame {
    let resolution = buffer.resolution();
    ColorFrame {
        width: resolution.width_x,
        height: resolution.height_y,
        raw_format: native_format(buffer.source_frame_format()),
        data: buffer.buffer().to_vec(),
        timestamp: Instant::now(),
    }
}

/// Streams raw camera frames; conversion happens in the color frame handler.
pub(crate) fn spawn_color_worker(
    index: CameraIndex,
    color_tx: Sender<ColorFrame>,
    geometry: Arc<ColorGeometry>,
) -> Result<Worker> {
    // Fail fast before spawning the capture thread.
    drop(build_camera(index.clone())?);

    Worker::spawn("camera-capture", move |stop: Arc<AtomicBool>| {
        let mut camera = match build_camera(index) {
            Ok(cam) => cam,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                return;
            }
        };
        log::info!(
            "camera streaming {:?} at {:?}",
            camera.camera_format(),
            camera.resolution()
        );

        while !stop.load(Ordering::Relaxed) {
            let frame_start = Instant::now();
            let buffer = match camera.frame() {
                Ok(buffer) => buffer,
                Err(err) => {
                    log::warn!(
                        "camera frame read failed (after {:?}): {err:?}",
                        frame_start.elapsed()
                    );
                    continue;
                }
            };

            let frame = to_color_frame(&buffer);
            geometry.set(frame.width, frame.height);

            // Drop when the UI is behind, otherwise forward every frame.
            let _ = color_tx.try_send(frame);
        }

        if let Err(err) = camera.stop_stream() {
            log::warn!("failed to stop camera stream: {err:?}");
        }
    })
}
