pub mod signals;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{control_state::ControlState, input::traits::ButtonInput};

use self::signals::TerminationSignals;

/// Turns button edges and termination requests into flag writes.
///
/// Nothing here touches the camera.
#[derive(Debug, Clone)]
pub struct EventSource {
    state: Arc<ControlState>,
}

impl EventSource {
    pub fn new(state: Arc<ControlState>) -> Self {
        Self { state }
    }

    pub async fn on_button_pressed(&self) -> bool {
        let accepted = self.state.request_activation().await;
        if accepted {
            info!("Button pressed, activation pending");
        } else {
            debug!("Button press ignored, camera busy or already queued");
        }
        accepted
    }

    pub fn on_termination(&self, signal: &str) {
        info!("Received {signal}, requesting shutdown");
        self.state.request_shutdown();
    }

    pub fn spawn_button_listener<I>(&self, mut input: I) -> JoinHandle<()>
    where
        I: ButtonInput + 'static,
    {
        let events = self.clone();
        tokio::spawn(async move {
            loop {
                match input.next_press().await {
                    Ok(Some(press)) => {
                        debug!(edge = ?press.edge, "Press edge received");
                        events.on_button_pressed().await;
                    }
                    Ok(None) => {
                        warn!("Button input closed, presses will no longer be seen");
                        break;
                    }
                    Err(err) => {
                        error!("Button input failed: {err:#}");
                        break;
                    }
                }
            }
        })
    }

    pub fn spawn_signal_listener(&self, mut signals: TerminationSignals) -> JoinHandle<()> {
        let events = self.clone();
        tokio::spawn(async move {
            let signal = signals.recv().await;
            events.on_termination(signal);
        })
    }
}
