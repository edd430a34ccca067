//! Beep playback on the default output device through `cpal`.

use super::{AudioOutput, FeedbackError, Tone};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use std::time::Duration;

/// Extra time the stream stays open after the tone ends.
const TAIL: Duration = Duration::from_millis(30);

/// Plays the rendered [`Tone`] on the system's default speaker.
///
/// Each beep opens its own short-lived stream on a background thread, so
/// `play` returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpeakerOutput;

impl SpeakerOutput {
    pub fn new() -> Self {
        Self
    }
}

impl AudioOutput for SpeakerOutput {
    fn play(&self, tone: &Tone) -> Result<(), FeedbackError> {
        let tone = *tone;
        std::thread::Builder::new()
            .name("scan-beep".to_string())
            .spawn(move || {
                if let Err(e) = play_on_default_device(&tone) {
                    tracing::debug!(error = %e, "Beep not played");
                }
            })
            .map(|_| ())
            .map_err(|e| FeedbackError::Device(e.to_string()))
    }
}

fn play_on_default_device(tone: &Tone) -> Result<(), FeedbackError> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| FeedbackError::Unavailable("no output device".to_string()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| FeedbackError::Device(e.to_string()))?;

    let channels = usize::from(supported.channels());
    let samples = tone.render(supported.sample_rate().0);
    let config = supported.config();

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build::<f32>(&device, &config, samples, channels)?,
        SampleFormat::I16 => build::<i16>(&device, &config, samples, channels)?,
        SampleFormat::U16 => build::<u16>(&device, &config, samples, channels)?,
        other => {
            return Err(FeedbackError::Unavailable(format!(
                "unsupported sample format {other:?}"
            )))
        }
    };
    stream
        .play()
        .map_err(|e| FeedbackError::Device(e.to_string()))?;

    std::thread::sleep(tone.duration() + TAIL);
    Ok(())
}

fn build<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    samples: Vec<f32>,
    channels: usize,
) -> Result<cpal::Stream, FeedbackError>
where
    T: SizedSample + FromSample<f32>,
{
    let mut position = 0;
    device
        .build_output_stream(
            config,
            move |out: &mut [T], _: &cpal::OutputCallbackInfo| {
                fill(out, &samples, &mut position, channels)
            },
            |e| tracing::debug!(error = %e, "Audio stream error"),
            None,
        )
        .map_err(|e| FeedbackError::Device(e.to_string()))
}

/// Writes the next mono samples into an interleaved buffer, then silence.
fn fill<T>(out: &mut [T], samples: &[f32], position: &mut usize, channels: usize)
where
    T: Sample + FromSample<f32>,
{
    for frame in out.chunks_mut(channels.max(1)) {
        let value = samples.get(*position).copied().unwrap_or(0.0);
        *position += 1;
        let sample = T::from_sample(value);
        for slot in frame {
            *slot = sample;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_duplicates_across_channels() {
        let samples = [0.5f32, -0.5];
        let mut out = [9.0f32; 6];
        let mut position = 0;

        fill(&mut out, &samples, &mut position, 2);
        assert_eq!(out, [0.5, 0.5, -0.5, -0.5, 0.0, 0.0]);
        assert_eq!(position, 3);
    }

    #[test]
    fn test_fill_continues_across_callbacks() {
        let samples = Tone::default().render(8_000);
        let mut position = 0;
        let mut first = [0i16; 4];
        let mut second = [0i16; 4];

        fill(&mut first, &samples, &mut position, 1);
        fill(&mut second, &samples, &mut position, 1);

        assert_eq!(position, 8);
        assert!(first[0] > 0);
        assert_eq!(second[0], i16::from_sample(samples[4]));
    }
}
