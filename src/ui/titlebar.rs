use super::{
    AnyElement, AppView, Context, Hsla, InteractiveElement, IntoElement, ParentElement, Styled,
    TITLEBAR_HEIGHT, Window, WindowControlArea, div, h_flex, px,
};

/// A colored status label shown in the draggable part of the titlebar.
#[derive(Clone, Copy, Debug)]
pub(super) struct StatusChip {
    pub color: Hsla,
    pub icon: &'static str,
    pub text: &'static str,
}

impl StatusChip {
    fn render(self) -> AnyElement {
        div()
            .px_2()
            .py_0p5()
            .rounded_md()
            .bg(gpui::rgba(0x00000033))
            .text_xs()
            .text_color(self.color)
            .child(format!("{} {}", self.icon, self.text))
            .into_any_element()
    }
}

impl AppView {
    pub(super) fn render_titlebar(
        &self,
        chips: [StatusChip; 2],
        window: &mut Window,
        _cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        h_flex()
            .window_control_area(WindowControlArea::Drag)
            .h(px(TITLEBAR_HEIGHT))
            .w_full()
            .items_center()
            .justify_between()
            .bg(gpui::rgb(0x1a2332))
            .child(
                h_flex()
                    .gap_3()
                    .pl(px(80.0))
                    .pr_3()
                    .h_full()
                    .items_center()
                    .child(
                        div()
                            .text_xs()
                            .text_color(gpui::rgb(0xa0aab8))
                            .child("Face Basics"),
                    )
                    .children(chips.into_iter().map(StatusChip::render)),
            )
            .child(window_controls(window))
            .into_any_element()
    }
}

// macOS draws its own traffic lights.
#[cfg(target_os = "macos")]
fn window_controls(_window: &mut Window) -> AnyElement {
    div().into_any_element()
}

#[cfg(target_os = "windows")]
fn window_controls(window: &mut Window) -> AnyElement {
    let maximize_glyph = if window.is_maximized() {
        "\u{e923}"
    } else {
        "\u{e922}"
    };
    let buttons = [
        ("minimize", WindowControlArea::Min, "\u{e921}", gpui::rgb(0x404040)),
        ("maximize", WindowControlArea::Max, maximize_glyph, gpui::rgb(0x404040)),
        ("close", WindowControlArea::Close, "\u{e8bb}", gpui::rgb(0xe81120)),
    ];

    h_flex()
        .id("window-controls")
        .font_family("Segoe Fluent Icons")
        .h(px(TITLEBAR_HEIGHT))
        .children(buttons.into_iter().map(|(id, area, glyph, hover)| {
            div()
                .id(id)
                .flex()
                .items_center()
                .justify_center()
                .occlude()
                .w(px(46.0))
                .h_full()
                .text_size(px(10.0))
                .hover(move |s| s.bg(hover))
                .window_control_area(area)
                .child(glyph)
        }))
        .into_any_element()
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn window_controls(_window: &mut Window) -> AnyElement {
    let buttons = [
        ("minimize", WindowControlArea::Min, "M 4,8 H 12", gpui::rgb(0x1f2428)),
        ("maximize", WindowControlArea::Max, "M 4,4 H 12 V 12 H 4 Z", gpui::rgb(0x1f2428)),
        (
            "close",
            WindowControlArea::Close,
            "M 4,4 L 12,12 M 12,4 L 4,12",
            gpui::rgb(0xe81123),
        ),
    ];

    h_flex()
        .gap_1()
        .px_2()
        .children(buttons.into_iter().map(|(id, area, path, hover)| {
            div()
                .id(id)
                .size(px(28.0))
                .flex()
                .items_center()
                .justify_center()
                .rounded_md()
                .cursor_pointer()
                .window_control_area(area)
                .hover(move |s| s.bg(hover))
                .child(
                    gpui::svg()
                        .size(px(16.0))
                        .path(path)
                        .text_color(gpui::rgb(0xc9d1d9)),
                )
        }))
        .into_any_element()
}
