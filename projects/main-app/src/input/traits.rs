use anyhow::Result;
use async_trait::async_trait;

use super::ButtonPress;

#[async_trait]
pub trait ButtonInput: Send {
    /// Waits for the next debounced press. `None` once the input is gone.
    async fn next_press(&mut self) -> Result<Option<ButtonPress>>;
}
