use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines},
    process::{Child, ChildStdout, Command},
};
use tracing::{debug, warn};

use super::{ButtonConfig, ButtonPress, Edge, Pull, traits::ButtonInput};

/// Press edges read from a libgpiod `gpiomon` child process.
#[derive(Debug)]
pub struct GpiomonButton {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    press_edge: Edge,
}

impl GpiomonButton {
    pub fn spawn(command: &str, config: &ButtonConfig) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_owned);
        let Some(program) = parts.next() else {
            bail!("gpiomon command is empty");
        };
        let mut args: Vec<String> = parts.collect();
        args.extend(monitor_args(config));
        Self::spawn_with(&program, &args, config.pull.press_edge())
    }

    fn spawn_with(program: &str, args: &[String], press_edge: Edge) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let stdout = child
            .stdout
            .take()
            .context("gpiomon stdout was not captured")?;

        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
            press_edge,
        })
    }
}

fn monitor_args(config: &ButtonConfig) -> Vec<String> {
    let bias = match config.pull {
        Pull::Up => "pull-up",
        Pull::Down => "pull-down",
        Pull::None => "disabled",
    };
    let edges = match config.pull.press_edge() {
        Edge::Falling => "falling",
        Edge::Rising => "rising",
    };

    vec![
        "--chip".to_owned(),
        config.chip.clone(),
        "--bias".to_owned(),
        bias.to_owned(),
        "--edges".to_owned(),
        edges.to_owned(),
        "--debounce-period".to_owned(),
        format!("{}ms", config.debounce.as_millis()),
        config.line.to_string(),
    ]
}

fn parse_edge(line: &str) -> Option<Edge> {
    let line = line.to_ascii_lowercase();
    if line.contains("falling") {
        Some(Edge::Falling)
    } else if line.contains("rising") {
        Some(Edge::Rising)
    } else {
        None
    }
}

#[async_trait]
impl ButtonInput for GpiomonButton {
    async fn next_press(&mut self) -> Result<Option<ButtonPress>> {
        while let Some(line) = self
            .lines
            .next_line()
            .await
            .context("failed to read gpiomon output")?
        {
            match parse_edge(&line) {
                Some(edge) if edge == self.press_edge => return Ok(Some(ButtonPress { edge })),
                Some(edge) => debug!(?edge, "ignoring release edge"),
                None => debug!(%line, "ignoring gpiomon output"),
            }
        }

        match self.child.try_wait() {
            Ok(Some(status)) if !status.success() => warn!("gpiomon exited with {status}"),
            Ok(_) => {}
            Err(err) => warn!("failed to query gpiomon status: {err}"),
        }
        Ok(None)
    }
}
