//! Camera abstraction for frame capture.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and mock implementations for testing.

use super::{CaptureConfig, Frame};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    #[error("camera has no frame data yet")]
    NotReady,
    #[error("torch is not supported by this camera")]
    TorchUnsupported,
    #[error("camera not initialized")]
    NotInitialized,
}

/// Trait for camera implementations.
///
/// A camera is owned by exactly one scanner while it is open.
pub trait Camera: Send {
    /// Opens and initializes the camera with the given configuration.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError>;

    /// Captures a single frame.
    ///
    /// Returns [`CameraError::NotReady`] while the stream has not
    /// delivered enough data to produce a frame.
    fn capture(&mut self) -> Result<Frame, CameraError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Whether the open track advertises a torch.
    fn supports_torch(&self) -> bool;

    /// Switches the torch on or off.
    fn set_torch(&mut self, on: bool) -> Result<(), CameraError>;

    /// Closes the camera and releases resources.
    fn close(&mut self);
}

/// How a [`MockCamera`] should fail on `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// The user refused camera access.
    PermissionDenied,
    /// No device is attached.
    NoDevice,
    /// Any other device error.
    Broken,
}

/// Observes a [`MockCamera`] after it has been handed to a scanner.
#[derive(Debug, Clone, Default)]
pub struct MockCameraProbe {
    open: Arc<AtomicBool>,
    torch_on: Arc<AtomicBool>,
    opens: Arc<AtomicU64>,
    closes: Arc<AtomicU64>,
}

impl MockCameraProbe {
    /// Whether the camera is currently open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Whether the torch is currently lit.
    pub fn torch_on(&self) -> bool {
        self.torch_on.load(Ordering::SeqCst)
    }

    /// Number of successful opens.
    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of closes of an open camera.
    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Mock camera for testing that generates synthetic frames.
#[derive(Debug, Default)]
pub struct MockCamera {
    config: Option<CaptureConfig>,
    sequence: u64,
    failure: Option<MockFailure>,
    has_torch: bool,
    warmup_frames: u64,
    pending_warmup: u64,
    probe: MockCameraProbe,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertises a torch on the opened track.
    pub fn with_torch(mut self) -> Self {
        self.has_torch = true;
        self
    }

    /// Makes every `open` fail.
    pub fn failing(mut self, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Reports [`CameraError::NotReady`] for the first `frames` captures
    /// after each open.
    pub fn with_warmup(mut self, frames: u64) -> Self {
        self.warmup_frames = frames;
        self
    }

    /// Returns a handle that keeps observing this camera.
    pub fn probe(&self) -> MockCameraProbe {
        self.probe.clone()
    }
}

impl Camera for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        match self.failure {
            Some(MockFailure::PermissionDenied) => return Err(CameraError::PermissionDenied),
            Some(MockFailure::NoDevice) => {
                return Err(CameraError::DeviceNotFound(format!(
                    "no device at index {}",
                    config.device_id
                )))
            }
            Some(MockFailure::Broken) => {
                return Err(CameraError::OpenFailed("device is busy".to_string()))
            }
            None => {}
        }

        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        self.config = Some(config.clone());
        self.sequence = 0;
        self.pending_warmup = self.warmup_frames;
        self.probe.open.store(true, Ordering::SeqCst);
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        tracing::info!("MockCamera opened with config: {:?}", config);
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let config = self.config.as_ref().ok_or(CameraError::NotInitialized)?;

        if self.pending_warmup > 0 {
            self.pending_warmup -= 1;
            return Err(CameraError::NotReady);
        }

        // Deterministic gradient, enough to exercise frame handling
        let (width, height) = (config.ideal_width, config.ideal_height);
        let pixels: Vec<u8> = (0..(width * height) as usize)
            .map(|i| ((i as u64 ^ self.sequence) % 256) as u8)
            .collect();

        self.sequence += 1;
        Ok(Frame::new(pixels, width, height, self.sequence))
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn supports_torch(&self) -> bool {
        self.is_open() && self.has_torch
    }

    fn set_torch(&mut self, on: bool) -> Result<(), CameraError> {
        if !self.supports_torch() {
            return Err(CameraError::TorchUnsupported);
        }
        self.probe.torch_on.store(on, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        if self.config.take().is_some() {
            self.probe.open.store(false, Ordering::SeqCst);
            self.probe.torch_on.store(false, Ordering::SeqCst);
            self.probe.closes.fetch_add(1, Ordering::SeqCst);
            tracing::info!("MockCamera closed");
        }
    }
}
