use std::sync::Arc;

use gpui::{
    AnyElement, App, AppContext, Context, Hsla, InteractiveElement, IntoElement, ObjectFit,
    ParentElement, Render, RenderImage, Styled, StyledImage, TitlebarOptions, Window,
    WindowControlArea, WindowDecorations, WindowOptions, div, img, px,
};
use gpui_component::{ActiveTheme, Root, StyledExt, h_flex, tag::Tag, v_flex};

use crate::{
    sensor::SensorBackend,
    session::FaceSession,
};

mod main_view;
mod render_util;
mod titlebar;

const TITLEBAR_HEIGHT: f32 = 32.0;
const CONTENT_PADDING: f32 = 16.0;
const STATUS_PANEL_WIDTH: f32 = 280.0;
const DEFAULT_FRAME_SIZE: (u32, u32) = (1920, 1080);

pub fn launch_ui(app: &mut App, backend: SensorBackend) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Face Basics".into()),
            appears_transparent: true,
            traffic_light_position: None,
        }),
        window_decorations: Some(WindowDecorations::Client),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|cx| {
            cx.on_release(|view: &mut AppView, _| view.shutdown()).detach();
            AppView::new(backend)
        });
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    screen: Screen,
    session: Option<FaceSession>,
    latest_image: Option<Arc<RenderImage>>,
    frame_size: Option<(u32, u32)>,
}

enum Screen {
    NoSensor { message: String },
    Running,
}

impl AppView {
    fn new(backend: SensorBackend) -> Self {
        let (screen, session) = match FaceSession::start(&backend) {
            Ok(Some(session)) => {
                log::info!("using {}", session.sensor_label());
                (Screen::Running, Some(session))
            }
            Ok(None) => (
                Screen::NoSensor {
                    message: format!("No sensor found for the {backend:?} backend"),
                },
                None,
            ),
            Err(err) => {
                log::error!("failed to start sensor: {err:?}");
                (
                    Screen::NoSensor {
                        message: format!("Failed to start sensor: {err:#}"),
                    },
                    None,
                )
            }
        };

        Self {
            screen,
            session,
            latest_image: None,
            frame_size: None,
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.shutdown();
        }
    }
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        match &self.screen {
            Screen::NoSensor { message } => {
                let message = message.clone();
                self.render_no_sensor(&message, window, cx)
            }
            Screen::Running => self.render_main(window, cx),
        }
    }
}
