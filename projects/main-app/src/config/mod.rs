use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};

use crate::{
    camera::rpicam_backend::PreviewWindow,
    controller::ControllerSettings,
    core::state::Resolution,
    input::{ButtonConfig, Pull},
};

pub const RECOMMENDED_DEBOUNCE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub button: ButtonConfig,
    pub active_duration: Duration,
    pub poll_interval: Duration,
    pub preview_resolution: Resolution,
    pub preview_window: PreviewWindow,
    pub camera_command: String,
    pub gpiomon_command: String,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let line = parse_var("BUTTON_GPIO", 17u32)?;
        let chip = env::var("GPIO_CHIP").unwrap_or_else(|_| "gpiochip0".to_owned());
        let pull = parse_var("BUTTON_PULL", Pull::Up)?;
        let debounce = Duration::from_millis(parse_var("BUTTON_DEBOUNCE_MS", 50u64)?);

        let active_duration = seconds_var("ACTIVE_DURATION_SECS", 10.0)?;
        let poll_interval = seconds_var("POLL_INTERVAL_SECS", 0.1)?;
        if poll_interval.is_zero() {
            bail!("POLL_INTERVAL_SECS must be greater than zero");
        }

        let preview_resolution = parse_var("PREVIEW_RESOLUTION", Resolution::default())?;
        let preview_window = parse_var("PREVIEW_WINDOW", PreviewWindow::Qt)?;
        let camera_command =
            env::var("CAMERA_COMMAND").unwrap_or_else(|_| "rpicam-hello".to_owned());
        let gpiomon_command = env::var("GPIOMON_COMMAND").unwrap_or_else(|_| "gpiomon".to_owned());
        let log_dir = env::var("LOG_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());

        Ok(Self {
            button: ButtonConfig {
                chip,
                line,
                pull,
                debounce,
            },
            active_duration,
            poll_interval,
            preview_resolution,
            preview_window,
            camera_command,
            gpiomon_command,
            log_dir,
            log_level,
        })
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            active_duration: self.active_duration,
            poll_interval: self.poll_interval,
            resolution: self.preview_resolution,
        }
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Into<anyhow::Error>,
{
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(Into::<anyhow::Error>::into)
            .with_context(|| format!("invalid {key}={value:?}")),
        _ => Ok(default),
    }
}

fn seconds_var(key: &str, default: f64) -> Result<Duration> {
    let seconds = parse_var(key, default)?;
    Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("{key} must be a finite, non-negative number of seconds"))
}
