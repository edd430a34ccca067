//! Scanner errors and their user-facing messages.

use crate::capture::{CameraError, ConfigError};
use thiserror::Error;

/// Errors surfaced by [`Scanner::start`](super::Scanner::start).
///
/// None of them is fatal: the owner shows the message and may retry.
#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera not found: {0}")]
    DeviceNotFound(String),
    #[error("camera error: {0}")]
    Camera(String),
    #[error("scanner failed to start: {0}")]
    ScannerInitFailed(String),
    #[error("invalid scanner configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl ScannerError {
    /// Short message suitable for showing to the person scanning.
    pub fn user_message(&self) -> String {
        match self {
            ScannerError::PermissionDenied => "Allow camera access to scan codes".to_string(),
            ScannerError::DeviceNotFound(_) => "Camera not found".to_string(),
            ScannerError::Camera(detail) => format!("Camera error: {detail}"),
            ScannerError::ScannerInitFailed(detail) => format!("Scanner could not start: {detail}"),
            ScannerError::InvalidConfig(e) => format!("Scanner is misconfigured: {e}"),
        }
    }
}

impl From<CameraError> for ScannerError {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::PermissionDenied => ScannerError::PermissionDenied,
            CameraError::DeviceNotFound(device) => ScannerError::DeviceNotFound(device),
            other => ScannerError::Camera(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_errors_classified() {
        assert!(matches!(
            ScannerError::from(CameraError::PermissionDenied),
            ScannerError::PermissionDenied
        ));
        assert!(matches!(
            ScannerError::from(CameraError::DeviceNotFound("0".into())),
            ScannerError::DeviceNotFound(_)
        ));
        assert!(matches!(
            ScannerError::from(CameraError::OpenFailed("busy".into())),
            ScannerError::Camera(_)
        ));
    }

    #[test]
    fn test_user_messages_distinct() {
        let messages = [
            ScannerError::PermissionDenied.user_message(),
            ScannerError::DeviceNotFound("0".into()).user_message(),
            ScannerError::Camera("busy".into()).user_message(),
            ScannerError::ScannerInitFailed("no decoder".into()).user_message(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(messages[2].contains("busy"));
    }
}
