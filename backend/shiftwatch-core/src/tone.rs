// src/tone.rs

use rodio::Source;
use std::time::Duration;
use thiserror::Error;

pub const ALERT_FREQUENCY_HZ: f32 = 800.0;
pub const ALERT_DURATION: Duration = Duration::from_millis(500);
pub const SAMPLE_RATE: u32 = 44_100;

// Peak amplitude well below clipping; the decay constant takes the envelope
// to under 1% of peak by the end of the tone.
const PEAK_AMPLITUDE: f32 = 0.30;
const DECAY_CONSTANT: f32 = 10.0;

#[derive(Debug, Error)]
pub enum ToneError {
    #[error("Audio output unavailable: {0}")]
    Stream(#[from] rodio::StreamError),
    #[error("Audio playback failed: {0}")]
    Play(#[from] rodio::PlayError),
    #[error("Audio task failed: {0}")]
    Task(String),
}

/// A short sine tone with an exponential decay envelope, synthesized sample
/// by sample. Mono, 44.1 kHz.
pub struct AlertTone {
    position: usize,
    total_samples: usize,
}

impl AlertTone {
    pub fn new() -> Self {
        let total_samples = (SAMPLE_RATE as f32 * ALERT_DURATION.as_secs_f32()) as usize;
        Self {
            position: 0,
            total_samples,
        }
    }

    fn sample_at(position: usize) -> f32 {
        let t = position as f32 / SAMPLE_RATE as f32;
        let envelope = (-DECAY_CONSTANT * t).exp();
        PEAK_AMPLITUDE * envelope * (2.0 * std::f32::consts::PI * ALERT_FREQUENCY_HZ * t).sin()
    }
}

impl Iterator for AlertTone {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.position >= self.total_samples {
            return None;
        }
        let sample = Self::sample_at(self.position);
        self.position += 1;
        Some(sample)
    }
}

impl Source for AlertTone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.position)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(ALERT_DURATION)
    }
}

/// Synthesize and play the alert tone on the default output device,
/// blocking until playback completes.
pub fn play_alert_tone() -> Result<(), ToneError> {
    let (_stream, handle) = rodio::OutputStream::try_default()?;
    let sink = rodio::Sink::try_new(&handle)?;
    sink.append(AlertTone::new());
    sink.sleep_until_end();
    Ok(())
}

/// Async wrapper: playback blocks on the audio device, so it runs on the
/// blocking thread pool.
pub async fn beep() -> Result<(), ToneError> {
    match tokio::task::spawn_blocking(play_alert_tone).await {
        Ok(result) => result,
        Err(e) => Err(ToneError::Task(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_has_expected_sample_count() {
        let samples: Vec<f32> = AlertTone::new().collect();
        assert_eq!(samples.len(), (SAMPLE_RATE as f32 * 0.5) as usize);
    }

    #[test]
    fn tone_frequency_matches_via_zero_crossings() {
        let samples: Vec<f32> = AlertTone::new().collect();
        let crossings = samples
            .windows(2)
            .filter(|w| (w[0] <= 0.0 && w[1] > 0.0) || (w[0] >= 0.0 && w[1] < 0.0))
            .count();
        // A sine at f Hz crosses zero 2f times per second; half a second of
        // 800 Hz gives ~800 crossings. Allow slack for the sampled envelope.
        assert!(
            (780..=820).contains(&crossings),
            "unexpected zero-crossing count: {}",
            crossings
        );
    }

    #[test]
    fn tone_envelope_decays() {
        let samples: Vec<f32> = AlertTone::new().collect();
        let early_peak = samples[..2000]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
        let late_peak = samples[samples.len() - 2000..]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(early_peak > 0.2, "early peak too quiet: {}", early_peak);
        assert!(
            late_peak < early_peak / 10.0,
            "envelope did not decay: early={} late={}",
            early_peak,
            late_peak
        );
    }
}
