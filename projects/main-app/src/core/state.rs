use std::{fmt, str::FromStr};

use anyhow::{Context, bail};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Idle,
    Active,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        let Some((width, height)) = value.trim().split_once(['x', 'X']) else {
            bail!("expected WIDTHxHEIGHT, got {value:?}");
        };
        let width: u32 = width.trim().parse().context("invalid width")?;
        let height: u32 = height.trim().parse().context("invalid height")?;
        if width == 0 || height == 0 {
            bail!("resolution must be non-zero, got {width}x{height}");
        }
        Ok(Self::new(width, height))
    }
}

/// Point-in-time copy of the shared control record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSnapshot {
    pub activation_pending: bool,
    pub resource_active: bool,
}

#[cfg(test)]
mod tests {
    use super::Resolution;

    #[test]
    fn parses_width_by_height() {
        let resolution: Resolution = "1280x720".parse().expect("should parse");
        assert_eq!(resolution, Resolution::new(1280, 720));
        assert_eq!(resolution.to_string(), "1280x720");
    }

    #[test]
    fn rejects_zero_and_malformed_values() {
        assert!("0x1080".parse::<Resolution>().is_err());
        assert!("1920".parse::<Resolution>().is_err());
        assert!("widexhigh".parse::<Resolution>().is_err());
    }
}
