pub mod discovery;
pub mod rpicam_backend;
pub mod traits;
