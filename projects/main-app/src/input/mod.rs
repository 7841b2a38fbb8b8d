pub mod gpiomon;
pub mod traits;

use std::{str::FromStr, time::Duration};

use anyhow::bail;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Up,
    Down,
    None,
}

impl Pull {
    /// Edge produced by pressing a button wired against this bias.
    pub fn press_edge(self) -> Edge {
        match self {
            Self::Down => Edge::Rising,
            Self::Up | Self::None => Edge::Falling,
        }
    }
}

impl FromStr for Pull {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "up" | "pull-up" => Ok(Self::Up),
            "down" | "pull-down" => Ok(Self::Down),
            "none" | "disabled" => Ok(Self::None),
            other => bail!("unknown pull mode {other:?}, expected up, down or none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPress {
    pub edge: Edge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonConfig {
    pub chip: String,
    pub line: u32,
    pub pull: Pull,
    pub debounce: Duration,
}
