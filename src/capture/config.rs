//! Camera capture configuration.
//!
//! Resolution is a hint, not a hard constraint: the device picks the
//! closest mode it supports.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Rear camera, pointed away from the user.
    #[default]
    Environment,
    /// Front camera.
    User,
}

impl Facing {
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Facing::Environment => &["back", "rear", "environment", "world"],
            Facing::User => &["front", "user", "facetime", "selfie"],
        }
    }

    /// Whether a device name or description advertises this direction.
    pub fn matches_label(self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.keywords().iter().any(|keyword| label.contains(keyword))
    }

    /// First of `devices` (index, label) labelled with this direction.
    pub fn pick<'a, I>(self, devices: I) -> Option<u32>
    where
        I: IntoIterator<Item = (u32, &'a str)>,
    {
        devices
            .into_iter()
            .find(|(_, label)| self.matches_label(label))
            .map(|(index, _)| index)
    }
}

/// Configuration for camera capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index, used when no device is labelled with the
    /// preferred facing.
    pub device_id: u32,
    /// Preferred camera direction, matched against device labels.
    pub facing: Facing,
    /// Ideal frame width in pixels.
    pub ideal_width: u32,
    /// Ideal frame height in pixels.
    pub ideal_height: u32,
    /// Frames per second polled by the native detection loop.
    pub frame_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            facing: Facing::Environment,
            ideal_width: 1280,
            ideal_height: 720,
            frame_rate: 30,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            ideal_width: width,
            ideal_height: height,
            ..Default::default()
        }
    }

    /// Delay between two polled frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.frame_rate.max(1)))
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ideal_width == 0 || self.ideal_height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("invalid scan rate {0} (must be 10-15 scans per second)")]
    InvalidScanRate(u32),
    #[error("invalid scan window ratio {0} (must be in (0, 1])")]
    InvalidWindowRatio(f32),
    #[error("symbology list for {0} is empty")]
    EmptySymbologies(&'static str),
    #[error("debounce interval must be non-zero")]
    InvalidDebounce,
    #[error("confirmation time must be non-zero")]
    InvalidConfirmation,
    #[error("fixed counterparty choice needs at least one counterparty")]
    EmptyDirectory,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}
