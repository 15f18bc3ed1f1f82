#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod pipeline;
mod sensor;
mod session;
mod types;
mod ui;

use anyhow::Result;
use gpui::Application;
use sensor::SensorBackend;

fn main() -> Result<()> {
    env_logger::init();

    let backend = SensorBackend::from_env();
    log::info!("starting face basics with the {backend:?} sensor backend");

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, backend.clone()) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
