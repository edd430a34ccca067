//! Scan confirmation: a short vibration and a beep.
//!
//! Feedback is fire-and-forget. Missing devices, refused access and
//! playback errors are logged and otherwise ignored, and a failure of
//! one channel never suppresses the other.

mod audio;
#[cfg(feature = "audio")]
mod speaker;

pub use audio::{
    audio_context, install_audio_output, AudioContext, AudioOutput, TerminalBell, Tone,
    DEFAULT_SAMPLE_RATE,
};
#[cfg(feature = "audio")]
pub use speaker::SpeakerOutput;

use crate::host::HostContainer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from a feedback device. Never returned by [`FeedbackEmitter`].
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("feedback device unavailable: {0}")]
    Unavailable(String),
    #[error("feedback device refused access")]
    Denied,
    #[error("feedback device error: {0}")]
    Device(String),
}

/// A vibration motor.
pub trait Haptics: Send + Sync {
    fn vibrate(&self, duration: Duration) -> Result<(), FeedbackError>;
}

/// Feedback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Master switch.
    pub enabled: bool,
    /// Vibration length in milliseconds.
    pub vibration_ms: u64,
    /// Beep played on each accepted scan.
    pub tone: Tone,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vibration_ms: 80,
            tone: Tone::default(),
        }
    }
}

enum AudioRoute {
    /// The process-wide [`AudioContext`].
    Shared,
    Output(Arc<dyn AudioOutput>),
    Muted,
}

/// Emits scan feedback on every accepted scan.
pub struct FeedbackEmitter {
    config: FeedbackConfig,
    haptics: Option<Arc<dyn Haptics>>,
    audio: AudioRoute,
    host: Option<Arc<dyn HostContainer>>,
}

impl Default for FeedbackEmitter {
    fn default() -> Self {
        Self::new(FeedbackConfig::default())
    }
}

impl FeedbackEmitter {
    /// Emitter playing through the process-wide audio context, without
    /// haptics or host.
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            config,
            haptics: None,
            audio: AudioRoute::Shared,
            host: None,
        }
    }

    /// Emitter that does nothing.
    pub fn silent() -> Self {
        Self {
            config: FeedbackConfig {
                enabled: false,
                ..FeedbackConfig::default()
            },
            haptics: None,
            audio: AudioRoute::Muted,
            host: None,
        }
    }

    /// Adds a vibration motor. The CLI has none; embedders on devices
    /// with one plug it in here.
    pub fn with_haptics(mut self, haptics: Arc<dyn Haptics>) -> Self {
        self.haptics = Some(haptics);
        self
    }

    /// Plays through `output` instead of the process-wide context.
    pub fn with_audio(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio = AudioRoute::Output(output);
        self
    }

    pub fn with_host(mut self, host: Arc<dyn HostContainer>) -> Self {
        self.host = Some(host);
        self
    }

    /// Vibrates, beeps and notifies the host. Never fails.
    pub fn emit(&self) {
        if !self.config.enabled {
            return;
        }

        if let Some(haptics) = &self.haptics {
            if let Err(e) = haptics.vibrate(Duration::from_millis(self.config.vibration_ms)) {
                tracing::debug!(error = %e, "Vibration unavailable");
            }
        }

        let played = match &self.audio {
            AudioRoute::Shared => audio_context().play(&self.config.tone),
            AudioRoute::Output(output) => output.play(&self.config.tone),
            AudioRoute::Muted => Ok(()),
        };
        if let Err(e) = played {
            tracing::debug!(error = %e, "Beep unavailable");
        }

        if let Some(host) = &self.host {
            host.notify_success();
        }
    }
}

impl std::fmt::Debug for FeedbackEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackEmitter")
            .field("config", &self.config)
            .field("haptics", &self.haptics.is_some())
            .field("host", &self.host.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct Counter {
        calls: AtomicU64,
        fail: bool,
    }

    impl Counter {
        fn failing() -> Self {
            Self {
                calls: AtomicU64::new(0),
                fail: true,
            }
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) -> Result<(), FeedbackError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(FeedbackError::Denied)
            } else {
                Ok(())
            }
        }
    }

    impl Haptics for Counter {
        fn vibrate(&self, duration: Duration) -> Result<(), FeedbackError> {
            assert_eq!(duration, Duration::from_millis(80));
            self.hit()
        }
    }

    impl AudioOutput for Counter {
        fn play(&self, tone: &Tone) -> Result<(), FeedbackError> {
            assert_eq!(tone.frequency_hz, 1200.0);
            self.hit()
        }
    }

    impl HostContainer for Counter {
        fn ready(&self) {}
        fn expand(&self) {}
        fn notify_success(&self) {
            let _ = self.hit();
        }
    }

    #[test]
    fn test_emit_hits_every_channel_once() {
        let haptics = Arc::new(Counter::default());
        let audio = Arc::new(Counter::default());
        let host = Arc::new(Counter::default());
        let emitter = FeedbackEmitter::default()
            .with_haptics(haptics.clone())
            .with_audio(audio.clone())
            .with_host(host.clone());

        emitter.emit();

        assert_eq!(haptics.calls(), 1);
        assert_eq!(audio.calls(), 1);
        assert_eq!(host.calls(), 1);
    }

    #[test]
    fn test_failed_vibration_still_beeps() {
        let haptics = Arc::new(Counter::failing());
        let audio = Arc::new(Counter::default());
        let emitter = FeedbackEmitter::default()
            .with_haptics(haptics.clone())
            .with_audio(audio.clone());

        emitter.emit();
        emitter.emit();

        assert_eq!(haptics.calls(), 2);
        assert_eq!(audio.calls(), 2);
    }

    #[test]
    fn test_failed_beep_still_vibrates() {
        let haptics = Arc::new(Counter::default());
        let audio = Arc::new(Counter::failing());
        let emitter = FeedbackEmitter::default()
            .with_haptics(haptics.clone())
            .with_audio(audio.clone());

        emitter.emit();
        assert_eq!(haptics.calls(), 1);
    }

    #[test]
    fn test_disabled_emitter_is_silent() {
        let haptics = Arc::new(Counter::default());
        let emitter = FeedbackEmitter::silent().with_haptics(haptics.clone());
        emitter.emit();
        assert_eq!(haptics.calls(), 0);
    }
}
