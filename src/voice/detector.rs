//! Utterance detection
//!
//! Energy-based voice activity detection over a bounded listening window:
//! calibrate to the room, wait for speech, then collect one phrase until the
//! speaker pauses or the phrase reaches its length cap.

use std::collections::VecDeque;
use std::time::Duration;

use super::capture::rms;

/// Per-second damping applied when adapting the energy threshold
const ADJUSTMENT_DAMPING: f32 = 0.15;

/// Audio kept from before speech onset so the first syllable isn't clipped
const PRE_ROLL: Duration = Duration::from_millis(500);

/// Frame length used for energy measurements
const FRAME: Duration = Duration::from_millis(50);

/// Timing and sensitivity for one listening window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenSettings {
    /// Ambient noise calibration before listening
    pub ambient_duration: Duration,
    /// Maximum wait for speech to start
    pub timeout: Duration,
    /// Maximum phrase length once speech started
    pub phrase_time_limit: Duration,
    /// Continuous silence that ends a phrase
    pub pause_threshold: Duration,
    /// Minimum RMS energy counted as speech
    pub energy_threshold: f32,
    /// Threshold multiplier over measured ambient energy
    pub dynamic_energy_ratio: f32,
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            ambient_duration: Duration::from_millis(500),
            timeout: Duration::from_secs(5),
            phrase_time_limit: Duration::from_secs(15),
            pause_threshold: Duration::from_millis(1500),
            // 300 on the 16-bit scale
            energy_threshold: 300.0 / 32768.0,
            dynamic_energy_ratio: 1.5,
        }
    }
}

/// Convert a duration to a sample count
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn to_samples(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize
}

/// Where the detector is within the listening window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Measuring ambient noise
    Calibrating,
    /// Waiting for speech to start
    WaitingForSpeech,
    /// Collecting a phrase
    Speaking,
    /// A phrase is ready
    Complete,
    /// No speech started before the timeout
    TimedOut,
}

/// Detects a single spoken phrase in a stream of samples
///
/// Time is measured in consumed samples, so feeding pre-recorded audio
/// behaves exactly like a live microphone.
pub struct UtteranceDetector {
    settings: ListenSettings,
    sample_rate: u32,
    state: DetectorState,
    threshold: f32,
    calibrated: usize,
    waited: usize,
    spoken: usize,
    silence: usize,
    pre_roll: VecDeque<f32>,
    phrase: Vec<f32>,
}

impl UtteranceDetector {
    /// Create a detector for audio at `sample_rate`
    #[must_use]
    pub fn new(settings: ListenSettings, sample_rate: u32) -> Self {
        let state = if settings.ambient_duration.is_zero() {
            DetectorState::WaitingForSpeech
        } else {
            DetectorState::Calibrating
        };

        Self {
            settings,
            sample_rate,
            state,
            threshold: settings.energy_threshold,
            calibrated: 0,
            waited: 0,
            spoken: 0,
            silence: 0,
            pre_roll: VecDeque::new(),
            phrase: Vec::new(),
        }
    }

    /// Feed samples and return the resulting state
    ///
    /// Samples fed after the detector reached `Complete` or `TimedOut` are ignored.
    pub fn process(&mut self, samples: &[f32]) -> DetectorState {
        let frame_len = to_samples(FRAME, self.sample_rate).max(1);

        for frame in samples.chunks(frame_len) {
            if self.is_finished() {
                break;
            }
            self.process_frame(frame);
        }

        self.state
    }

    fn process_frame(&mut self, frame: &[f32]) {
        let energy = rms(frame);

        match self.state {
            DetectorState::Calibrating => {
                self.adapt_threshold(energy, frame.len());
                self.calibrated += frame.len();

                if self.calibrated >= to_samples(self.settings.ambient_duration, self.sample_rate) {
                    tracing::debug!(threshold = self.threshold, "ambient noise calibrated");
                    self.state = DetectorState::WaitingForSpeech;
                }
            }
            DetectorState::WaitingForSpeech => {
                if energy > self.threshold {
                    tracing::trace!(energy, threshold = self.threshold, "speech started");
                    self.state = DetectorState::Speaking;
                    self.phrase.extend(self.pre_roll.drain(..));
                    self.phrase.extend_from_slice(frame);
                    self.spoken = frame.len();
                    self.silence = 0;
                    self.check_phrase_end();
                    return;
                }

                self.adapt_threshold(energy, frame.len());
                self.pre_roll.extend(frame.iter().copied());
                let keep = to_samples(PRE_ROLL, self.sample_rate);
                while self.pre_roll.len() > keep {
                    self.pre_roll.pop_front();
                }

                self.waited += frame.len();
                if self.waited >= to_samples(self.settings.timeout, self.sample_rate) {
                    tracing::debug!(waited = self.waited, "no speech before timeout");
                    self.state = DetectorState::TimedOut;
                }
            }
            DetectorState::Speaking => {
                self.phrase.extend_from_slice(frame);
                self.spoken += frame.len();

                if energy > self.threshold {
                    self.silence = 0;
                } else {
                    self.silence += frame.len();
                }

                self.check_phrase_end();
            }
            DetectorState::Complete | DetectorState::TimedOut => {}
        }
    }

    fn check_phrase_end(&mut self) {
        let paused = self.silence >= to_samples(self.settings.pause_threshold, self.sample_rate);
        let capped = self.spoken >= to_samples(self.settings.phrase_time_limit, self.sample_rate);

        if paused || capped {
            tracing::debug!(
                samples = self.phrase.len(),
                paused,
                capped,
                "phrase complete"
            );
            self.state = DetectorState::Complete;
        }
    }

    /// Move the threshold toward `energy * ratio`, damped by frame duration
    #[allow(clippy::cast_precision_loss)]
    fn adapt_threshold(&mut self, energy: f32, frame_len: usize) {
        let seconds = frame_len as f32 / self.sample_rate as f32;
        let damping = ADJUSTMENT_DAMPING.powf(seconds);
        let target = energy * self.settings.dynamic_energy_ratio;
        let adapted = self.threshold.mul_add(damping, target * (1.0 - damping));
        self.threshold = adapted.max(self.settings.energy_threshold);
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Whether the window is over, with or without a phrase
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self.state, DetectorState::Complete | DetectorState::TimedOut)
    }

    /// Energy threshold currently in effect
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Samples collected for the current phrase
    #[must_use]
    pub fn phrase(&self) -> &[f32] {
        &self.phrase
    }

    /// Take the collected phrase, leaving the buffer empty
    pub fn take_phrase(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.phrase)
    }
}
