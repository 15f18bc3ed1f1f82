use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use anyhow::{Result, anyhow};
use gpui::RenderImage;
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use super::color_converter::{self, ConversionPath};
use crate::types::ColorFrame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DirtyRect {
    fn union(self, other: DirtyRect) -> DirtyRect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        DirtyRect {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }
}

#[derive(Debug)]
struct BackBuffer {
    pixels: Vec<u8>,
    dirty: Option<DirtyRect>,
}

/// A fixed-size BGRA surface shared between the frame handler and the renderer.
///
/// Writers go through [`WriteableBitmap::lock`]; the renderer only ever reads the pixels
/// inside [`WriteableBitmap::flush`], which takes the same lock, so a half-written frame is
/// never turned into an image.
#[derive(Debug)]
pub struct WriteableBitmap {
    width: u32,
    height: u32,
    back_buffer: RwLock<BackBuffer>,
}

pub struct BitmapWriteGuard<'a> {
    width: u32,
    height: u32,
    inner: RwLockWriteGuard<'a, BackBuffer>,
}

impl BitmapWriteGuard<'_> {
    pub fn back_buffer(&mut self) -> &mut [u8] {
        &mut self.inner.pixels
    }

    /// Marks a region as changed, clamped to the bitmap bounds.
    pub fn add_dirty_rect(&mut self, rect: DirtyRect) {
        let x = rect.x.min(self.width);
        let y = rect.y.min(self.height);
        let clamped = DirtyRect {
            x,
            y,
            width: rect.width.min(self.width - x),
            height: rect.height.min(self.height - y),
        };
        if clamped.width == 0 || clamped.height == 0 {
            return;
        }

        self.inner.dirty = Some(match self.inner.dirty {
            Some(existing) => existing.union(clamped),
            None => clamped,
        });
    }
}

impl WriteableBitmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            back_buffer: RwLock::new(BackBuffer {
                pixels: vec![0u8; width as usize * height as usize * 4],
                dirty: None,
            }),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn full_rect(&self) -> DirtyRect {
        DirtyRect {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        }
    }

    /// Exclusive write access; dropping the guard unlocks.
    pub fn lock(&self) -> BitmapWriteGuard<'_> {
        // The whole buffer is rewritten every frame, so a poisoned lock holds nothing worth
        // discarding.
        let inner = self
            .back_buffer
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        BitmapWriteGuard {
            width: self.width,
            height: self.height,
            inner,
        }
    }

    pub fn dirty_rect(&self) -> Option<DirtyRect> {
        self.back_buffer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .dirty
    }

    /// Copies the current pixels out when anything changed since the last flush.
    pub fn take_dirty_pixels(&self) -> Option<Vec<u8>> {
        let mut inner = self.lock().inner;
        inner.dirty.take()?;
        Some(inner.pixels.clone())
    }

    /// Turns pending changes into an image the renderer can draw. GPUI expects BGRA, which
    /// is what the back buffer already holds.
    pub fn flush(&self) -> Option<Arc<RenderImage>> {
        let pixels = self.take_dirty_pixels()?;
        let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(self.width, self.height, pixels)?;
        Some(Arc::new(RenderImage::new(vec![ImageFrame::new(buffer)])))
    }
}

/// Owns the reusable pixel buffer and the display bitmap fed from color frames.
#[derive(Debug, Default)]
pub struct ColorBitmapGenerator {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    bitmap: Option<Arc<WriteableBitmap>>,
}

impl ColorBitmapGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bitmap(&self) -> Option<&Arc<WriteableBitmap>> {
        self.bitmap.as_ref()
    }

    /// Converts `frame` into the shared buffer and publishes it to the bitmap. The buffer
    /// and the bitmap are created from the first frame and reused afterwards.
    pub fn update(&mut self, frame: &ColorFrame) -> Result<Arc<WriteableBitmap>> {
        let bitmap = match &self.bitmap {
            Some(bitmap) => {
                if frame.width != self.width || frame.height != self.height {
                    return Err(anyhow!(
                        "color resolution changed from {}x{} to {}x{}",
                        self.width,
                        self.height,
                        frame.width,
                        frame.height
                    ));
                }
                bitmap.clone()
            }
            None => {
                self.width = frame.width;
                self.height = frame.height;
                self.pixels = vec![0u8; frame.bgra_len()];
                let bitmap = Arc::new(WriteableBitmap::new(frame.width, frame.height));
                log::info!(
                    "display bitmap created at {}x{} (source {})",
                    frame.width,
                    frame.height,
                    frame.raw_format.label()
                );
                self.bitmap = Some(bitmap.clone());
                bitmap
            }
        };

        let path = color_converter::convert_to_target(frame, &mut self.pixels)?;
        if path == ConversionPath::Converted {
            log::trace!("converted {} frame", frame.raw_format.label());
        }

        let mut guard = bitmap.lock();
        guard.back_buffer().copy_from_slice(&self.pixels);
        guard.add_dirty_rect(bitmap.full_rect());
        drop(guard);

        Ok(bitmap)
    }
}
