use std::convert::TryFrom;

use anyhow::{Result, anyhow};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::types::{ColorFrame, ColorImageFormat};

/// Encoding of every buffer handed to the display bitmap.
pub const TARGET_FORMAT: ColorImageFormat = ColorImageFormat::Bgra;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversionPath {
    Copied,
    Converted,
}

/// Fills `dst` with the frame in [`TARGET_FORMAT`]. Frames already in the target encoding
/// are copied verbatim.
pub fn convert_to_target(frame: &ColorFrame, dst: &mut [u8]) -> Result<ConversionPath> {
    if frame.raw_format == TARGET_FORMAT {
        frame.copy_raw_frame_data(dst)?;
        Ok(ConversionPath::Copied)
    } else {
        frame.copy_converted_frame_data(dst, TARGET_FORMAT)?;
        Ok(ConversionPath::Converted)
    }
}

impl ColorFrame {
    pub fn copy_raw_frame_data(&self, dst: &mut [u8]) -> Result<()> {
        if self.data.len() != dst.len() {
            return Err(anyhow!(
                "raw copy size mismatch: frame has {} bytes, buffer has {}",
                self.data.len(),
                dst.len()
            ));
        }
        dst.copy_from_slice(&self.data);
        Ok(())
    }

    /// Converts into a 32-bit interleaved `format` (BGRA or RGBA) written to `dst`.
    pub fn copy_converted_frame_data(
        &self,
        dst: &mut [u8],
        format: ColorImageFormat,
    ) -> Result<()> {
        let swap_output = match format {
            ColorImageFormat::Rgba => false,
            ColorImageFormat::Bgra => true,
            other => return Err(anyhow!("unsupported conversion target {}", other.label())),
        };

        let expected_len = self.bgra_len();
        if dst.len() != expected_len {
            return Err(anyhow!(
                "destination buffer size mismatch: got {}, expected {}",
                dst.len(),
                expected_len
            ));
        }

        let (width, height, data) = (self.width, self.height, self.data.as_slice());
        match self.raw_format {
            ColorImageFormat::Rgba => packed32_to_rgba(data, dst, false)?,
            ColorImageFormat::Bgra => packed32_to_rgba(data, dst, true)?,
            ColorImageFormat::Nv12 => nv12_to_rgba(data, width, height, dst)?,
            ColorImageFormat::Yuy2 => yuyv_to_rgba(data, width, height, dst)?,
            ColorImageFormat::Mjpeg => mjpeg_to_rgba(data, dst)?,
            ColorImageFormat::Rgb => rgb_like_to_rgba(data, width, height, false, dst)?,
            ColorImageFormat::Bgr => rgb_like_to_rgba(data, width, height, true, dst)?,
            ColorImageFormat::Gray => gray_to_rgba(data, width, height, dst)?,
        }

        if swap_output {
            swap_red_blue(dst);
        }

        Ok(())
    }
}

fn swap_red_blue(buffer: &mut [u8]) {
    buffer.par_chunks_exact_mut(4).for_each(|px| px.swap(0, 2));
}

fn packed32_to_rgba(data: &[u8], dst: &mut [u8], swap_rb: bool) -> Result<()> {
    if data.len() < dst.len() {
        return Err(anyhow!(
            "32-bit buffer too small: got {}, expected {}",
            data.len(),
            dst.len()
        ));
    }

    dst.copy_from_slice(&data[..dst.len()]);
    if swap_rb {
        swap_red_blue(dst);
    }
    Ok(())
}

fn nv12_to_rgba(data: &[u8], width: u32, height: u32, rgba: &mut [u8]) -> Result<()> {
    let y_plane_len = width as usize * height as usize;
    let uv_plane_len = y_plane_len / 2;

    if data.len() < y_plane_len + uv_plane_len {
        return Err(anyhow!(
            "NV12 buffer too small: got {}, expected {}",
            data.len(),
            y_plane_len + uv_plane_len
        ));
    }

    let image = YuvBiPlanarImage {
        y_plane: &data[..y_plane_len],
        y_stride: width,
        uv_plane: &data[y_plane_len..y_plane_len + uv_plane_len],
        uv_stride: width,
        width,
        height,
    };

    yuv_nv12_to_rgba(
        &image,
        rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12→RGBA failed: {err:?}"))
}

fn yuyv_to_rgba(data: &[u8], width: u32, height: u32, rgba: &mut [u8]) -> Result<()> {
    let expected_len = width as usize * height as usize * 2;
    if data.len() < expected_len {
        return Err(anyhow!(
            "YUY2 buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    yuyv422_to_rgba(
        &packed,
        rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUY2→RGBA failed: {err:?}"))
}

fn mjpeg_to_rgba(data: &[u8], rgba: &mut [u8]) -> Result<()> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let decoded = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;

    if let Some(info) = decoder.info() {
        let decoded_len = usize::try_from(info.width)
            .and_then(|w| usize::try_from(info.height).map(|h| w * h * 4))
            .map_err(|_| anyhow!("MJPEG dimensions do not fit usize"))?;
        if decoded_len != rgba.len() {
            return Err(anyhow!(
                "MJPEG frame is {}x{}, which does not match the color frame size",
                info.width,
                info.height
            ));
        }
    }

    if decoded.len() < rgba.len() {
        return Err(anyhow!(
            "MJPEG decode produced too few bytes: got {}, expected {}",
            decoded.len(),
            rgba.len()
        ));
    }

    rgba.copy_from_slice(&decoded[..rgba.len()]);
    Ok(())
}

fn rgb_like_to_rgba(
    data: &[u8],
    width: u32,
    height: u32,
    swap_rb: bool,
    rgba: &mut [u8],
) -> Result<()> {
    let expected_len = width as usize * height as usize * 3;
    if data.len() < expected_len {
        return Err(anyhow!(
            "RGB buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    rgba.par_chunks_mut(4)
        .zip(data.par_chunks_exact(3))
        .for_each(|(dst, src)| {
            if swap_rb {
                dst[0] = src[2];
                dst[1] = src[1];
                dst[2] = src[0];
            } else {
                dst[0] = src[0];
                dst[1] = src[1];
                dst[2] = src[2];
            }
            dst[3] = 255;
        });

    Ok(())
}

fn gray_to_rgba(data: &[u8], width: u32, height: u32, rgba: &mut [u8]) -> Result<()> {
    let expected_len = width as usize * height as usize;
    if data.len() < expected_len {
        return Err(anyhow!(
            "GRAY buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    rgba.par_chunks_mut(4)
        .zip(data.par_iter().copied())
        .for_each(|(dst, value)| {
            dst[0] = value;
            dst[1] = value;
            dst[2] = value;
            dst[3] = 255;
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use image::{ExtendedColorType, codecs::jpeg::JpegEncoder};

    use super::*;

    fn frame(raw_format: ColorImageFormat, width: u32, height: u32, data: Vec<u8>) -> ColorFrame {
        ColorFrame {
            width,
            height,
            raw_format,
            data,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn bgra_frames_are_copied_verbatim() {
        let data: Vec<u8> = (0..4 * 3 * 4).map(|v| v as u8).collect();
        let frame = frame(ColorImageFormat::Bgra, 4, 3, data.clone());
        let mut dst = vec![0u8; frame.bgra_len()];

        let path = convert_to_target(&frame, &mut dst).unwrap();

        assert_eq!(path, ConversionPath::Copied);
        assert_eq!(dst, data);
    }

    #[test]
    fn rgb_is_expanded_to_bgra() {
        let frame = frame(ColorImageFormat::Rgb, 2, 1, vec![10, 20, 30, 40, 50, 60]);
        let mut dst = vec![0u8; frame.bgra_len()];

        let path = convert_to_target(&frame, &mut dst).unwrap();

        assert_eq!(path, ConversionPath::Converted);
        assert_eq!(dst, vec![30, 20, 10, 255, 60, 50, 40, 255]);
    }

    #[test]
    fn bgr_lands_in_bgra_order() {
        let frame = frame(ColorImageFormat::Bgr, 1, 1, vec![1, 2, 3]);
        let mut dst = vec![0u8; 4];

        convert_to_target(&frame, &mut dst).unwrap();

        assert_eq!(dst, vec![1, 2, 3, 255]);
    }

    #[test]
    fn rgba_source_swaps_channels() {
        let frame = frame(ColorImageFormat::Rgba, 1, 1, vec![1, 2, 3, 4]);
        let mut dst = vec![0u8; 4];

        convert_to_target(&frame, &mut dst).unwrap();

        assert_eq!(dst, vec![3, 2, 1, 4]);
    }

    #[test]
    fn gray_is_replicated() {
        let frame = frame(ColorImageFormat::Gray, 2, 1, vec![7, 200]);
        let mut dst = vec![0u8; frame.bgra_len()];

        convert_to_target(&frame, &mut dst).unwrap();

        assert_eq!(dst, vec![7, 7, 7, 255, 200, 200, 200, 255]);
    }

    #[test]
    fn yuy2_output_fills_the_buffer() {
        // Neutral chroma, full-range luma: grey pixels.
        let width = 4;
        let height = 2;
        let data = [128u8, 128].repeat(width * height);
        let frame = frame(ColorImageFormat::Yuy2, width as u32, height as u32, data);
        let mut dst = vec![0u8; frame.bgra_len()];

        convert_to_target(&frame, &mut dst).unwrap();

        assert_eq!(dst.len(), width * height * 4);
        for px in dst.chunks_exact(4) {
            assert!(px[0].abs_diff(128) <= 2);
            assert!(px[1].abs_diff(128) <= 2);
            assert!(px[2].abs_diff(128) <= 2);
        }
    }

    fn solid_jpeg(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let pixels = rgb.repeat(width as usize * height as usize);
        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, 95)
            .encode(&pixels, width, height, ExtendedColorType::Rgb8)
            .unwrap();
        encoded
    }

    #[test]
    fn nv12_neutral_chroma_is_grey() {
        let (width, height) = (8usize, 8usize);
        let data = vec![128u8; width * height * 3 / 2];
        let frame = frame(ColorImageFormat::Nv12, width as u32, height as u32, data);
        let mut dst = vec![0u8; frame.bgra_len()];

        let path = convert_to_target(&frame, &mut dst).unwrap();

        assert_eq!(path, ConversionPath::Converted);
        for px in dst.chunks_exact(4) {
            assert!(px[0].abs_diff(128) <= 3);
            assert!(px[1].abs_diff(128) <= 3);
            assert!(px[2].abs_diff(128) <= 3);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn mjpeg_decodes_into_bgra_order() {
        let frame = frame(ColorImageFormat::Mjpeg, 16, 8, solid_jpeg(16, 8, [200, 40, 10]));
        let mut dst = vec![0u8; frame.bgra_len()];

        let path = convert_to_target(&frame, &mut dst).unwrap();

        assert_eq!(path, ConversionPath::Converted);
        for px in dst.chunks_exact(4) {
            assert!(px[0].abs_diff(10) <= 12, "blue was {}", px[0]);
            assert!(px[1].abs_diff(40) <= 12, "green was {}", px[1]);
            assert!(px[2].abs_diff(200) <= 12, "red was {}", px[2]);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn mjpeg_with_other_dimensions_is_rejected() {
        let frame = frame(ColorImageFormat::Mjpeg, 8, 8, solid_jpeg(16, 8, [200, 40, 10]));
        let mut dst = vec![0u8; frame.bgra_len()];

        let err = convert_to_target(&frame, &mut dst).unwrap_err();

        assert!(err.to_string().contains("16x8"));
    }

    #[test]
    fn short_payload_is_rejected() {
        let frame = frame(ColorImageFormat::Rgb, 4, 4, vec![0; 5]);
        let mut dst = vec![0u8; frame.bgra_len()];

        assert!(convert_to_target(&frame, &mut dst).is_err());
    }

    #[test]
    fn destination_size_is_checked() {
        let frame = frame(ColorImageFormat::Gray, 2, 2, vec![0; 4]);
        let mut dst = vec![0u8; 3];

        assert!(frame.copy_converted_frame_data(&mut dst, TARGET_FORMAT).is_err());
    }

    #[test]
    fn non_interleaved_targets_are_unsupported() {
        let frame = frame(ColorImageFormat::Gray, 1, 1, vec![0]);
        let mut dst = vec![0u8; 4];

        assert!(
            frame
                .copy_converted_frame_data(&mut dst, ColorImageFormat::Yuy2)
                .is_err()
        );
    }
}
