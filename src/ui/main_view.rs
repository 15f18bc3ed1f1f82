use super::render_util::{fit_contain, render_shape};
use super::titlebar::StatusChip;
use super::{
    ActiveTheme, AnyElement, AppView, CONTENT_PADDING, Context, DEFAULT_FRAME_SIZE, IntoElement,
    ObjectFit, ParentElement, RenderImage, STATUS_PANEL_WIDTH, Styled, StyledExt, StyledImage,
    TITLEBAR_HEIGHT, Tag, Window, div, h_flex, img, px, v_flex,
};
use crate::{
    pipeline::{
        landmarks::{FaceOverlay, MOUTH_CLOSED_HEIGHT},
        tracking::FaceSlot,
    },
    session::SessionStats,
    types::DetectionResult,
};
use std::sync::Arc;

impl AppView {
    pub(super) fn render_main(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let Some(session) = self.session.as_mut().filter(|s| s.is_running()) else {
            return self.render_no_sensor("Sensor was shut down", window, cx);
        };

        session.dispatch_pending();
        let flushed = session.bitmap().and_then(|bitmap| {
            bitmap
                .flush()
                .map(|image| (image, (bitmap.width(), bitmap.height())))
        });
        let overlay = session.overlay().clone();
        let stats = session.stats();
        let face_slot = session.handlers().face_slot();
        let sensor_label = session.sensor_label().to_string();

        if let Some((image, size)) = flushed {
            self.frame_size = Some(size);
            self.replace_latest_image(image, window, cx);
        }

        let frame_size = self.frame_size.unwrap_or(DEFAULT_FRAME_SIZE);
        let viewport = window.viewport_size();
        let bounds = (
            f32::from(viewport.width) - STATUS_PANEL_WIDTH - CONTENT_PADDING * 3.0,
            f32::from(viewport.height) - TITLEBAR_HEIGHT - CONTENT_PADDING * 2.0,
        );
        let fit = fit_contain(frame_size, bounds);

        let frame_view: AnyElement = if let Some(image) = &self.latest_image {
            img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Fill)
                .into_any_element()
        } else {
            div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .child("Waiting for color frames...")
                .into_any_element()
        };

        let shapes = overlay
            .shapes()
            .into_iter()
            .filter_map(|(kind, shape)| render_shape(kind, shape, fit.scale));

        let camera = div()
            .relative()
            .w(px(fit.width))
            .h(px(fit.height))
            .overflow_hidden()
            .rounded_lg()
            .bg(gpui::rgb(0x000000))
            .child(frame_view)
            .children(shapes);

        let status_panel = self.render_status_panel(
            &sensor_label,
            frame_size,
            &stats,
            face_slot,
            &overlay,
        );

        let theme = cx.theme();
        let sensor_chip = if self.latest_image.is_some() {
            StatusChip {
                color: theme.success,
                icon: "●",
                text: "Sensor streaming",
            }
        } else {
            StatusChip {
                color: theme.muted_foreground,
                icon: "○",
                text: "Waiting for sensor",
            }
        };
        let tracking_chip = match face_slot {
            FaceSlot::Assigned(_) => StatusChip {
                color: theme.success,
                icon: "●",
                text: "Face tracked",
            },
            FaceSlot::Unassigned => StatusChip {
                color: theme.muted_foreground,
                icon: "○",
                text: "No body tracked",
            },
        };
        let titlebar = self.render_titlebar([tracking_chip, sensor_chip], window, cx);

        v_flex()
            .size_full()
            .bg(gpui::rgb(0x1a2332))
            .child(titlebar)
            .child(
                h_flex()
                    .flex_1()
                    .gap_4()
                    .p_4()
                    .items_start()
                    .child(
                        div()
                            .flex_1()
                            .flex()
                            .justify_center()
                            .child(camera),
                    )
                    .child(status_panel),
            )
            .into_any_element()
    }

    fn render_status_panel(
        &self,
        sensor_label: &str,
        frame_size: (u32, u32),
        stats: &SessionStats,
        face_slot: FaceSlot,
        overlay: &FaceOverlay,
    ) -> AnyElement {
        let format = stats
            .last_color_format
            .map(|f| f.label())
            .unwrap_or("--");
        let tracking = match face_slot {
            FaceSlot::Assigned(id) => format!("Tracking body {}", id.0),
            FaceSlot::Unassigned => "Waiting for a tracked body".to_string(),
        };

        let mut panel = v_flex()
            .w(px(STATUS_PANEL_WIDTH))
            .gap_2()
            .p_4()
            .rounded_lg()
            .bg(gpui::rgb(0x0f1419))
            .child(
                div()
                    .text_sm()
                    .font_semibold()
                    .text_color(gpui::rgb(0xe2e8f0))
                    .overflow_hidden()
                    .text_ellipsis()
                    .whitespace_nowrap()
                    .child(sensor_label.to_string()),
            )
            .child(info_row(
                "Color",
                format!("{}x{} {format}", frame_size.0, frame_size.1),
            ))
            .child(info_row(
                "Frames",
                format!(
                    "{} color / {} body / {} face",
                    stats.color_frames, stats.body_frames, stats.face_frames
                ),
            ))
            .child(info_row("Bodies", stats.tracked_bodies.to_string()))
            .child(info_row("Face", tracking));

        if stats.conversion_failures > 0 {
            panel = panel.child(
                Tag::danger()
                    .rounded_full()
                    .child(format!("{} frames failed to convert", stats.conversion_failures)),
            );
        }

        panel = panel
            .child(
                div()
                    .mt_2()
                    .text_xs()
                    .font_semibold()
                    .text_color(gpui::rgb(0xa0aab8))
                    .child("Expressions"),
            )
            .child(flag_row("Left eye", visibility_label(overlay.eye_left.visible)))
            .child(flag_row("Right eye", visibility_label(overlay.eye_right.visible)))
            .child(flag_row(
                "Mouth",
                if overlay.mouth.height > MOUTH_CLOSED_HEIGHT {
                    (true, "Open")
                } else {
                    (false, "Closed")
                },
            ));

        for (label, value) in overlay.status.entries() {
            panel = panel.child(flag_row(label, (value == DetectionResult::Yes, value.label())));
        }

        panel.into_any_element()
    }

    pub(super) fn render_no_sensor(
        &mut self,
        message: &str,
        _window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        div()
            .size_full()
            .flex()
            .items_center()
            .justify_center()
            .bg(gpui::rgb(0x1a2332))
            .child(
                v_flex()
                    .gap_2()
                    .p_4()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.group_box)
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.accent)
                            .font_semibold()
                            .child("⚠ No sensor available"),
                    )
                    .child(
                        div()
                            .text_xs()
                            .text_color(theme.muted_foreground)
                            .child("Connect a camera or set FACE_BASICS_SENSOR=simulated"),
                    )
                    .child(div().text_color(theme.foreground).child(message.to_string())),
            )
            .into_any_element()
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // Explicitly drop the previous GPU texture; otherwise the sprite atlas keeps
            // every frame and memory will climb rapidly while the sensor is running.
            cx.drop_image(old_image, Some(window));
        }
    }
}

fn visibility_label(visible: bool) -> (bool, &'static str) {
    if visible {
        (false, "Open")
    } else {
        (true, "Closed")
    }
}

fn info_row(label: &'static str, value: String) -> AnyElement {
    h_flex()
        .justify_between()
        .gap_2()
        .child(
            div()
                .text_xs()
                .text_color(gpui::rgb(0x8b95a5))
                .child(label),
        )
        .child(
            div()
                .text_xs()
                .text_color(gpui::rgb(0xcbd5e1))
                .overflow_hidden()
                .text_ellipsis()
                .whitespace_nowrap()
                .child(value),
        )
        .into_any_element()
}

fn flag_row(label: &'static str, (active, value): (bool, &'static str)) -> AnyElement {
    let tag = if active {
        Tag::warning().rounded_full().child(value)
    } else {
        Tag::secondary().rounded_full().child(value)
    };

    h_flex()
        .justify_between()
        .items_center()
        .child(
            div()
                .text_xs()
                .text_color(gpui::rgb(0xa0aab8))
                .child(label),
        )
        .child(tag)
        .into_any_element()
}
