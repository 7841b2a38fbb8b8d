use anyhow::Result;
use async_trait::async_trait;

use crate::core::state::Resolution;

/// Camera and preview device. Only the controller holds one.
#[async_trait]
pub trait CameraBackend: Send {
    async fn configure(&mut self, resolution: Resolution) -> Result<()>;
    async fn start_preview(&mut self, resolution: Resolution) -> Result<()>;
    async fn start(&mut self) -> Result<()>;
    async fn stop(&mut self) -> Result<()>;
    async fn stop_preview(&mut self) -> Result<()>;
    /// Tears down the device handle. No other call is valid afterwards.
    async fn close(&mut self) -> Result<()>;
}
