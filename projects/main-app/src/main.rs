mod camera;
mod config;
mod control_state;
mod controller;
mod core;
mod events;
mod input;

use std::sync::Arc;

use anyhow::Context;
use camera::{rpicam_backend::RpicamBackend, traits::CameraBackend};
use config::{AppConfig, RECOMMENDED_DEBOUNCE};
use control_state::ControlState;
use controller::Controller;
use events::{EventSource, signals::TerminationSignals};
use input::gpiomon::GpiomonButton;
use tracing::{info, warn};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = AppConfig::from_env()?;

    if std::env::args().any(|arg| arg == "--list-cameras") {
        let cameras = camera::discovery::list_cameras(&config.camera_command).await?;
        println!("{}", serde_json::to_string_pretty(&cameras)?);
        return Ok(());
    }

    let _log_guard = init_logging(&config).await?;
    if config.button.debounce < RECOMMENDED_DEBOUNCE {
        warn!(
            "Button debounce of {:?} is below the recommended {:?}",
            config.button.debounce, RECOMMENDED_DEBOUNCE
        );
    }

    let mut camera = RpicamBackend::new(&config.camera_command, config.preview_window)?;
    camera
        .configure(config.preview_resolution)
        .await
        .context("failed to initialise camera")?;

    let state = Arc::new(ControlState::new());
    let events = EventSource::new(state.clone());
    let signals =
        TerminationSignals::register().context("failed to register termination signals")?;
    let signal_task = events.spawn_signal_listener(signals);

    let button = GpiomonButton::spawn(&config.gpiomon_command, &config.button)?;
    info!(
        "Watching {} line {} ({:?} pull)",
        config.button.chip, config.button.line, config.button.pull
    );
    let button_task = events.spawn_button_listener(button);

    let result = Controller::new(camera, state, config.controller_settings())
        .run()
        .await;

    button_task.abort();
    signal_task.abort();
    result
}

async fn init_logging(config: &AppConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("invalid LOG_LEVEL {:?}", config.log_level))?;

    let Some(log_dir) = &config.log_dir else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    };

    tokio::fs::create_dir_all(log_dir).await?;
    let file_appender = rolling::daily(log_dir, "cam-button.log");
    let (non_blocking, log_guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .init();
    Ok(Some(log_guard))
}
