use std::collections::BTreeSet;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio::process::Command;

use crate::core::state::Resolution;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraInfo {
    pub index: u32,
    pub sensor: String,
    pub path: Option<String>,
    pub formats: Vec<String>,
    pub modes: Vec<Resolution>,
}

pub async fn list_cameras(command: &str) -> Result<Vec<CameraInfo>> {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        bail!("camera command is empty");
    };

    let output = Command::new(program)
        .args(parts)
        .arg("--list-cameras")
        .output()
        .await
        .with_context(|| format!("failed to execute {program} --list-cameras"))?;
    if !output.status.success() {
        bail!("{program} --list-cameras exited with {}", output.status);
    }

    // rpicam-apps print the listing on stderr on some releases
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(parse_camera_list(&text))
}

fn parse_camera_list(text: &str) -> Vec<CameraInfo> {
    let mut cameras = Vec::new();
    let mut current: Option<CameraInfo> = None;
    let mut formats = BTreeSet::new();

    for line in text.lines() {
        if let Some(camera) = parse_camera_header(line) {
            if let Some(mut done) = current.take() {
                done.formats = std::mem::take(&mut formats).into_iter().collect();
                cameras.push(done);
            }
            current = Some(camera);
            continue;
        }

        let Some(camera) = current.as_mut() else {
            continue;
        };
        if let Some(format) = quoted(line) {
            formats.insert(format.to_string());
        }
        if let Some(mode) = parse_mode(line) {
            camera.modes.push(mode);
        }
    }

    if let Some(mut done) = current {
        done.formats = formats.into_iter().collect();
        cameras.push(done);
    }
    cameras
}

// "0 : imx708 [4608x2592 10-bit RGGB] (/base/soc/i2c0mux/i2c@1/imx708@1a)"
fn parse_camera_header(line: &str) -> Option<CameraInfo> {
    let (index, rest) = line.trim().split_once(" : ")?;
    let index = index.trim().parse().ok()?;
    let sensor = rest.split_whitespace().next()?.to_string();
    let path = rest
        .rsplit_once('(')
        .and_then(|(_, tail)| tail.strip_suffix(')'))
        .map(str::to_string);

    Some(CameraInfo {
        index,
        sensor,
        path,
        formats: Vec::new(),
        modes: Vec::new(),
    })
}

fn quoted(line: &str) -> Option<&str> {
    let first = line.find('\'')?;
    let tail = &line[first + 1..];
    let second = tail.find('\'')?;
    let value = tail[..second].trim();
    (!value.is_empty()).then_some(value)
}

// "Modes: 'SRGGB10_CSI2P' : 1536x864 [120.13 fps - (768, 432)/3072x1728 crop]"
fn parse_mode(line: &str) -> Option<Resolution> {
    let head = line.split('[').next()?;
    let token = head.split_whitespace().last()?;
    token.parse().ok()
}
