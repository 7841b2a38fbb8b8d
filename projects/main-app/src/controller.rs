use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use futures::FutureExt;
use tokio::time::{Instant, sleep};
use tracing::{error, info, warn};

use crate::{
    camera::traits::CameraBackend,
    control_state::ControlState,
    core::state::{ControllerPhase, Resolution},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub active_duration: Duration,
    pub poll_interval: Duration,
    pub resolution: Resolution,
}

/// What a single tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub activated: bool,
    pub activation_failed: bool,
    pub deactivated: bool,
}

/// Sole owner of the camera. Every start, stop and close goes through here,
/// on the task that drives [`Controller::run`].
#[derive(Debug)]
pub struct Controller<B: CameraBackend> {
    camera: B,
    state: Arc<ControlState>,
    settings: ControllerSettings,
    phase: ControllerPhase,
}

impl<B: CameraBackend> Controller<B> {
    pub fn new(camera: B, state: Arc<ControlState>, settings: ControllerSettings) -> Self {
        Self {
            camera,
            state,
            settings,
            phase: ControllerPhase::Idle,
        }
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    /// Polls until shutdown is requested, then deactivates and releases the
    /// camera. The release also runs when the loop panics; the panic is
    /// resumed afterwards.
    pub async fn run(mut self) -> Result<()> {
        info!(
            duration = ?self.settings.active_duration,
            poll = ?self.settings.poll_interval,
            "System ready. Press button to activate camera."
        );

        let polled = AssertUnwindSafe(self.poll_until_shutdown())
            .catch_unwind()
            .await;
        if polled.is_err() {
            error!("Control loop panicked, releasing camera");
        }

        let released = self.shutdown().await;
        if let Err(panic) = polled {
            std::panic::resume_unwind(panic);
        }
        released
    }

    async fn poll_until_shutdown(&mut self) {
        while !self.state.is_shutdown_requested() {
            self.tick().await;
            sleep(self.settings.poll_interval).await;
        }
    }

    /// One pass of the state machine: pending activation first, then timeout.
    pub async fn tick(&mut self) -> Tick {
        let mut tick = Tick::default();

        if self.state.take_pending().await {
            match self.activate().await {
                Ok(()) => tick.activated = true,
                Err(err) => {
                    error!("Camera activation failed: {err:#}");
                    tick.activation_failed = true;
                }
            }
        }

        if let Some(activated_at) = self.state.activated_at().await {
            let elapsed = activated_at.elapsed();
            if elapsed >= self.settings.active_duration {
                info!(?elapsed, "Active duration reached");
                self.deactivate().await;
                tick.deactivated = true;
            }
        }

        tick
    }

    /// Forces deactivation if needed and closes the camera. Consumes the
    /// controller so the release happens once.
    pub async fn shutdown(mut self) -> Result<()> {
        let snapshot = self.state.snapshot().await;
        info!(
            phase = ?self.phase(),
            active = snapshot.resource_active,
            pending = snapshot.activation_pending,
            "Shutting down..."
        );
        if self.state.is_active().await {
            self.deactivate().await;
        }

        let closed = self.camera.close().await;
        self.phase = ControllerPhase::Stopped;
        closed.context("failed to release camera")?;

        info!(phase = ?self.phase(), "Clean shutdown complete.");
        Ok(())
    }

    async fn activate(&mut self) -> Result<()> {
        info!("Activating camera...");
        let resolution = self.settings.resolution;
        self.camera
            .start_preview(resolution)
            .await
            .context("failed to start preview")?;

        if let Err(err) = self.camera.start().await {
            if let Err(cleanup) = self.camera.stop_preview().await {
                warn!("Failed to close preview after start error: {cleanup:#}");
            }
            return Err(err.context("failed to start camera"));
        }

        self.state.mark_active(Instant::now()).await;
        self.phase = ControllerPhase::Active;
        info!(%resolution, "Camera active");
        Ok(())
    }

    /// Best-effort stop. The shared record is cleared whatever the camera
    /// reports.
    async fn deactivate(&mut self) {
        info!("Deactivating camera...");
        if let Err(err) = self.camera.stop().await {
            error!("Failed to stop camera: {err:#}");
        }
        if let Err(err) = self.camera.stop_preview().await {
            error!("Failed to stop preview: {err:#}");
        }

        self.state.mark_inactive().await;
        self.phase = ControllerPhase::Idle;
        info!("Camera inactive");
    }
}
