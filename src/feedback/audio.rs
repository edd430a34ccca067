//! Scan beep synthesis and the process-wide audio context.

use super::FeedbackError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::OnceLock;
use std::time::Duration;

/// Gain the beep decays to by its end.
const END_GAIN: f32 = 0.001;

/// Sample rate used when an output does not ask for one.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// A short square-wave tone with an exponential fade-out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tone {
    /// Pitch in hertz.
    pub frequency_hz: f32,
    /// Length in milliseconds.
    pub duration_ms: u64,
    /// Starting gain, 0.0 to 1.0.
    pub gain: f32,
}

impl Default for Tone {
    fn default() -> Self {
        Self {
            frequency_hz: 1200.0,
            duration_ms: 120,
            gain: 0.15,
        }
    }
}

impl Tone {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Renders the tone as mono `f32` samples at `sample_rate`.
    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        let total = (u64::from(sample_rate) * self.duration_ms / 1000) as usize;
        if total == 0 || self.gain <= 0.0 {
            return Vec::new();
        }

        let rate = sample_rate as f32;
        let decay = (END_GAIN / self.gain).min(1.0);
        let last = (total - 1).max(1) as f32;

        (0..total)
            .map(|i| {
                let phase = (i as f32 * self.frequency_hz / rate).fract();
                let level = if phase < 0.5 { 1.0 } else { -1.0 };
                let envelope = self.gain * decay.powf(i as f32 / last);
                level * envelope
            })
            .collect()
    }
}

/// Something that can play a [`Tone`].
pub trait AudioOutput: Send + Sync {
    fn play(&self, tone: &Tone) -> Result<(), FeedbackError>;
}

/// Rings the terminal bell. The tone's shape is ignored; the `audio`
/// feature adds an output that plays the rendered tone.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl AudioOutput for TerminalBell {
    fn play(&self, _tone: &Tone) -> Result<(), FeedbackError> {
        let mut stderr = std::io::stderr().lock();
        stderr
            .write_all(b"\x07")
            .and_then(|()| stderr.flush())
            .map_err(|e| FeedbackError::Device(e.to_string()))
    }
}

/// Audio output shared by the whole process.
///
/// Created on first use and kept until the process exits.
pub struct AudioContext {
    output: Box<dyn AudioOutput>,
}

impl AudioContext {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self { output }
    }

    pub fn play(&self, tone: &Tone) -> Result<(), FeedbackError> {
        self.output.play(tone)
    }
}

impl std::fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioContext").finish_non_exhaustive()
    }
}

static AUDIO_CONTEXT: OnceLock<AudioContext> = OnceLock::new();

/// The process-wide audio context, created with a [`TerminalBell`]
/// unless [`install_audio_output`] ran first.
pub fn audio_context() -> &'static AudioContext {
    AUDIO_CONTEXT.get_or_init(|| {
        tracing::debug!("Creating audio context");
        AudioContext::new(Box::new(TerminalBell))
    })
}

/// Sets the output of the process-wide context. Fails once the context
/// exists.
pub fn install_audio_output(output: Box<dyn AudioOutput>) -> Result<(), FeedbackError> {
    AUDIO_CONTEXT
        .set(AudioContext::new(output))
        .map_err(|_| FeedbackError::Unavailable("audio context already created".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_length_and_envelope() {
        let tone = Tone::default();
        let samples = tone.render(DEFAULT_SAMPLE_RATE);

        assert_eq!(samples.len(), 5_760);
        assert!((samples[0].abs() - 0.15).abs() < 1e-6);
        assert!((samples[samples.len() - 1].abs() - END_GAIN).abs() < 1e-4);
        assert!(samples.windows(2).all(|w| w[1].abs() <= w[0].abs() + 1e-6));
    }

    #[test]
    fn test_render_square_period() {
        // 1200 Hz at 48 kHz: 40 samples per period, 20 per half
        let samples = Tone::default().render(DEFAULT_SAMPLE_RATE);
        assert!(samples[..20].iter().all(|s| *s > 0.0));
        assert!(samples[20..40].iter().all(|s| *s < 0.0));
        assert!(samples[40] > 0.0);
    }

    #[test]
    fn test_silent_tone_renders_nothing() {
        let tone = Tone {
            gain: 0.0,
            ..Tone::default()
        };
        assert!(tone.render(DEFAULT_SAMPLE_RATE).is_empty());
    }

    #[test]
    fn test_audio_context_created_once() {
        let first = audio_context() as *const AudioContext;
        let second = audio_context() as *const AudioContext;
        assert_eq!(first, second);
        assert!(install_audio_output(Box::new(TerminalBell)).is_err());
    }
}
