use super::{AnyElement, IntoElement, Styled, div, px};
use crate::pipeline::landmarks::{OverlayShape, ShapeDescriptor};

/// How a frame of `frame_size` sits inside a box of `bounds` when scaled to fit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct FitTransform {
    pub scale: f32,
    pub width: f32,
    pub height: f32,
}

pub(super) fn fit_contain(frame_size: (u32, u32), bounds: (f32, f32)) -> FitTransform {
    let (frame_w, frame_h) = (frame_size.0.max(1) as f32, frame_size.1.max(1) as f32);
    let (max_w, max_h) = (bounds.0.max(1.0), bounds.1.max(1.0));
    let scale = (max_w / frame_w).min(max_h / frame_h);

    FitTransform {
        scale,
        width: frame_w * scale,
        height: frame_h * scale,
    }
}

pub(super) fn scale_shape(shape: &ShapeDescriptor, scale: f32) -> ShapeDescriptor {
    ShapeDescriptor {
        left: shape.left * scale,
        top: shape.top * scale,
        width: shape.width * scale,
        height: shape.height * scale,
        visible: shape.visible,
    }
}

pub(super) fn render_shape(
    kind: OverlayShape,
    shape: &ShapeDescriptor,
    scale: f32,
) -> Option<AnyElement> {
    if !shape.visible {
        return None;
    }

    let scaled = scale_shape(shape, scale);
    let base = div()
        .absolute()
        .left(px(scaled.left))
        .top(px(scaled.top))
        .w(px(scaled.width))
        .h(px(scaled.height));

    let element = match kind {
        OverlayShape::FaceBox => base
            .rounded_md()
            .border_2()
            .border_color(gpui::rgba(0x34d399cc)),
        OverlayShape::EyeLeft | OverlayShape::EyeRight => {
            base.rounded_full().bg(gpui::rgba(0x60a5fae6))
        }
        OverlayShape::Nose => base.rounded_full().bg(gpui::rgba(0xfbbf24e6)),
        OverlayShape::Mouth => base.rounded_full().bg(gpui::rgba(0xf87171e6)),
    };

    Some(element.into_any_element())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_frame_is_limited_by_width() {
        let fit = fit_contain((1920, 1080), (960.0, 960.0));

        assert_eq!(fit.scale, 0.5);
        assert_eq!(fit.width, 960.0);
        assert_eq!(fit.height, 540.0);
    }

    #[test]
    fn tall_box_is_limited_by_height() {
        let fit = fit_contain((640, 480), (1280.0, 240.0));

        assert_eq!(fit.scale, 0.5);
        assert_eq!(fit.width, 320.0);
    }

    #[test]
    fn shapes_scale_with_the_image() {
        let shape = ShapeDescriptor {
            left: 100.0,
            top: 40.0,
            width: 20.0,
            height: 50.0,
            visible: false,
        };

        let scaled = scale_shape(&shape, 0.5);

        assert_eq!(scaled.left, 50.0);
        assert_eq!(scaled.height, 25.0);
        assert!(!scaled.visible);
    }
}
