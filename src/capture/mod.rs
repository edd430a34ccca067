//! Camera input and frame handling.
//!
//! This module provides abstractions for capturing frames from a camera
//! and managing camera configuration. The scanner owns the camera for
//! as long as it is active and releases it on stop.

mod camera;
mod config;
mod frame;
#[cfg(feature = "camera")]
mod device;

pub use camera::{Camera, CameraError, MockCamera, MockCameraProbe, MockFailure};
pub use config::{CaptureConfig, ConfigError, Facing};
pub use frame::{Frame, Region};
#[cfg(feature = "camera")]
pub use device::NokhwaCamera;
