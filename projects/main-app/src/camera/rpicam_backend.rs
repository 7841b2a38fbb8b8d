use std::{collections::VecDeque, process::Stdio, str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStderr, Command},
    task::JoinHandle,
    time::timeout,
};
use tracing::debug;

use crate::core::state::Resolution;

use super::traits::CameraBackend;

/// How long a fresh preview process must stay up to count as started.
const STARTUP_GRACE: Duration = Duration::from_millis(500);
const STDERR_TAIL_LINES: usize = 20;
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewWindow {
    Qt,
    Fullscreen,
    Headless,
}

impl FromStr for PreviewWindow {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "qt" => Ok(Self::Qt),
            "fullscreen" => Ok(Self::Fullscreen),
            "none" | "headless" => Ok(Self::Headless),
            other => bail!("unknown preview window {other:?}, expected qt, fullscreen or none"),
        }
    }
}

/// Drives the preview through an `rpicam-hello` child process.
#[derive(Debug)]
pub struct RpicamBackend {
    program: String,
    base_args: Vec<String>,
    window: PreviewWindow,
    resolution: Option<Resolution>,
    preview: Option<Resolution>,
    child: Option<Child>,
    stderr_tail: Option<JoinHandle<String>>,
    startup_grace: Duration,
    closed: bool,
}

impl RpicamBackend {
    /// `command` is split on whitespace into the program and leading arguments.
    pub fn new(command: &str, window: PreviewWindow) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_owned);
        let Some(program) = parts.next() else {
            bail!("camera command is empty");
        };
        Ok(Self::with_program(program, parts.collect(), window))
    }

    pub fn with_program(program: String, base_args: Vec<String>, window: PreviewWindow) -> Self {
        Self {
            program,
            base_args,
            window,
            resolution: None,
            preview: None,
            child: None,
            stderr_tail: None,
            startup_grace: STARTUP_GRACE,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            bail!("camera is closed");
        }
        Ok(())
    }

    fn stream_args(&self) -> Result<Vec<String>> {
        let Some(resolution) = self.resolution else {
            bail!("camera is not configured");
        };

        let mut args = self.base_args.clone();
        args.extend([
            "-t".to_owned(),
            "0".to_owned(),
            "--width".to_owned(),
            resolution.width.to_string(),
            "--height".to_owned(),
            resolution.height.to_string(),
        ]);

        match (self.preview, self.window) {
            (None, _) | (_, PreviewWindow::Headless) => args.push("--nopreview".to_owned()),
            (Some(_), PreviewWindow::Fullscreen) => args.push("--fullscreen".to_owned()),
            (Some(preview), PreviewWindow::Qt) => {
                args.push("--qt-preview".to_owned());
                args.push("--preview".to_owned());
                args.push(format!("0,0,{},{}", preview.width, preview.height));
            }
        }
        Ok(args)
    }

    /// Stops the running child. A child that already died with a failure
    /// status is reported as an error carrying its last stderr lines.
    async fn kill_child(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let exited = child
            .try_wait()
            .context("failed to query camera preview process")?;
        match exited {
            Some(status) if !status.success() => {
                let output = self.take_stderr_tail().await;
                bail!(
                    "camera preview process had already exited with {status}{}",
                    describe_output(&output)
                );
            }
            Some(_) => {}
            None => child
                .kill()
                .await
                .context("failed to stop camera preview process")?,
        }

        if let Some(tail) = self.stderr_tail.take() {
            tail.abort();
        }
        Ok(())
    }

    async fn take_stderr_tail(&mut self) -> String {
        let Some(tail) = self.stderr_tail.take() else {
            return String::new();
        };
        match timeout(STDERR_DRAIN_TIMEOUT, tail).await {
            Ok(Ok(output)) => output,
            _ => String::new(),
        }
    }
}

/// Logs the preview's stderr and keeps the last lines for error reports.
fn drain_stderr(stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "rpicam", "{line}");
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        Vec::from(tail).join("\n")
    })
}

fn describe_output(output: &str) -> String {
    let output = output.trim();
    if output.is_empty() {
        String::new()
    } else {
        format!(": {output}")
    }
}

#[async_trait]
impl CameraBackend for RpicamBackend {
    async fn configure(&mut self, resolution: Resolution) -> Result<()> {
        self.ensure_open()?;
        let status = Command::new(&self.program)
            .args(&self.base_args)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .with_context(|| format!("failed to execute {}", self.program))?;

        if !status.success() {
            bail!("{} --version exited with {status}", self.program);
        }

        self.resolution = Some(resolution);
        Ok(())
    }

    async fn start_preview(&mut self, resolution: Resolution) -> Result<()> {
        self.ensure_open()?;
        if self.resolution.is_none() {
            bail!("camera is not configured");
        }
        self.preview = Some(resolution);
        Ok(())
    }

    async fn start(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.child.is_some() {
            bail!("camera already started");
        }

        let args = self.stream_args()?;
        debug!(program = %self.program, ?args, "spawning preview");
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("failed to spawn camera preview process")?;

        let stderr = child
            .stderr
            .take()
            .context("camera preview stderr was not captured")?;
        self.stderr_tail = Some(drain_stderr(stderr));

        if let Ok(exited) = timeout(self.startup_grace, child.wait()).await {
            let output = self.take_stderr_tail().await;
            let status = exited.context("failed to wait for camera preview process")?;
            bail!(
                "camera preview process exited during startup with {status}{}",
                describe_output(&output)
            );
        }

        self.child = Some(child);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.kill_child().await
    }

    async fn stop_preview(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.preview = None;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.preview = None;
        self.kill_child().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{camera::traits::CameraBackend, core::state::Resolution};

    use super::{PreviewWindow, RpicamBackend};

    fn scripted_backend(script: &str) -> RpicamBackend {
        let mut backend = RpicamBackend::with_program(
            "sh".to_owned(),
            vec!["-c".to_owned(), script.to_owned(), "rpicam".to_owned()],
            PreviewWindow::Headless,
        );
        backend.startup_grace = Duration::from_millis(100);
        backend
    }

    fn sleeping_backend(window: PreviewWindow) -> RpicamBackend {
        let mut backend = scripted_backend("exec sleep 30");
        backend.window = window;
        backend
    }

    #[test]
    fn command_is_split_into_program_and_arguments() {
        let backend = RpicamBackend::new("libcamera-hello --camera 1", PreviewWindow::Qt)
            .expect("command should parse");
        assert_eq!(backend.program, "libcamera-hello");
        assert_eq!(backend.base_args, vec!["--camera", "1"]);

        assert!(RpicamBackend::new("   ", PreviewWindow::Qt).is_err());
    }

    #[test]
    fn preview_window_parses_known_names() {
        assert_eq!("QT".parse::<PreviewWindow>().ok(), Some(PreviewWindow::Qt));
        assert_eq!(
            "none".parse::<PreviewWindow>().ok(),
            Some(PreviewWindow::Headless)
        );
        assert!("x11".parse::<PreviewWindow>().is_err());
    }

    #[test]
    fn stream_args_follow_preview_state() {
        let mut backend =
            RpicamBackend::with_program("rpicam-hello".to_owned(), Vec::new(), PreviewWindow::Qt);
        assert!(backend.stream_args().is_err());

        backend.resolution = Some(Resolution::new(1920, 1080));
        let args = backend.stream_args().expect("args should build");
        assert_eq!(args.last().map(String::as_str), Some("--nopreview"));

        backend.preview = Some(Resolution::new(1280, 720));
        let args = backend.stream_args().expect("args should build");
        assert!(args.contains(&"--qt-preview".to_owned()));
        assert!(args.contains(&"0,0,1280,720".to_owned()));
        assert!(args.windows(2).any(|pair| pair == ["--width", "1920"]));

        backend.window = PreviewWindow::Fullscreen;
        let args = backend.stream_args().expect("args should build");
        assert_eq!(args.last().map(String::as_str), Some("--fullscreen"));
    }

    #[tokio::test]
    async fn start_requires_configuration() {
        let mut backend = sleeping_backend(PreviewWindow::Headless);
        let err = backend.start().await.expect_err("start should fail");
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn start_stop_and_close_manage_the_child() {
        let mut backend = sleeping_backend(PreviewWindow::Headless);
        backend.resolution = Some(Resolution::default());

        backend.start().await.expect("start should spawn");
        assert!(backend.child.is_some());
        assert!(backend.start().await.is_err(), "second start should fail");

        backend.stop().await.expect("stop should kill");
        assert!(backend.child.is_none());
        backend.stop().await.expect("stop without child is fine");

        backend.start().await.expect("restart should spawn");
        backend.close().await.expect("close should kill");
        assert!(backend.child.is_none());
        backend.close().await.expect("close is idempotent");

        let err = backend.start().await.expect_err("closed camera cannot start");
        assert!(err.to_string().contains("closed"));
    }

    #[tokio::test]
    async fn process_dying_at_startup_fails_start_with_its_stderr() {
        let mut backend = scripted_backend("echo 'ERROR: no cameras available' >&2; exit 1");
        backend.resolution = Some(Resolution::default());

        let err = backend.start().await.expect_err("start should fail");
        let message = format!("{err:#}");
        assert!(message.contains("exited during startup"), "{message}");
        assert!(message.contains("no cameras available"), "{message}");
        assert!(backend.child.is_none());
    }

    #[tokio::test]
    async fn stop_reports_a_process_that_died_while_active() {
        let mut backend =
            scripted_backend("sleep 0.3; echo 'ERROR: camera frontend timeout' >&2; exit 3");
        backend.resolution = Some(Resolution::default());

        backend.start().await.expect("process outlives the startup grace");
        tokio::time::sleep(Duration::from_millis(700)).await;

        let err = backend.stop().await.expect_err("stop should report the dead child");
        let message = format!("{err:#}");
        assert!(message.contains("already exited"), "{message}");
        assert!(message.contains("camera frontend timeout"), "{message}");
        assert!(backend.child.is_none());
        backend.stop().await.expect("nothing left to stop");
    }

    #[tokio::test]
    async fn missing_binary_fails_configure() {
        let mut backend = RpicamBackend::with_program(
            "cam-button-no-such-binary".to_owned(),
            Vec::new(),
            PreviewWindow::Qt,
        );
        assert!(backend.configure(Resolution::default()).await.is_err());
        assert!(backend.resolution.is_none());
    }
}
