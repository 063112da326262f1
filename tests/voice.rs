//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;
use std::time::Duration;

use vocal_assistant::voice::{
    AudioStore, DetectorState, ListenSettings, SAMPLE_RATE, UtteranceDetector, chunk_text, rms,
    samples_to_wav,
};

mod common;

/// Generate sine wave audio samples
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Feed audio in 100ms reads, as the microphone loop does
fn feed(detector: &mut UtteranceDetector, samples: &[f32]) -> DetectorState {
    let mut state = detector.state();
    for chunk in samples.chunks(1600) {
        state = detector.process(chunk);
        if detector.is_finished() {
            break;
        }
    }
    state
}

#[test]
fn test_detector_calibrates_then_waits() {
    let mut detector = UtteranceDetector::new(ListenSettings::default(), SAMPLE_RATE);
    assert_eq!(detector.state(), DetectorState::Calibrating);

    let state = feed(&mut detector, &generate_silence(0.5));

    assert_eq!(state, DetectorState::WaitingForSpeech);
}

#[test]
fn test_detector_times_out_on_silence() {
    let mut detector = UtteranceDetector::new(ListenSettings::default(), SAMPLE_RATE);

    // Calibration plus the five second wait
    assert_eq!(feed(&mut detector, &generate_silence(5.4)), DetectorState::WaitingForSpeech);
    assert_eq!(feed(&mut detector, &generate_silence(0.2)), DetectorState::TimedOut);
    assert!(detector.phrase().is_empty());
}

#[test]
fn test_detector_ends_phrase_after_pause() {
    let mut detector = UtteranceDetector::new(ListenSettings::default(), SAMPLE_RATE);

    feed(&mut detector, &generate_silence(0.5));
    assert_eq!(
        feed(&mut detector, &generate_sine_samples(220.0, 1.0, 0.5)),
        DetectorState::Speaking
    );

    // A short breath does not end the phrase
    assert_eq!(feed(&mut detector, &generate_silence(1.0)), DetectorState::Speaking);
    assert_eq!(feed(&mut detector, &generate_silence(0.6)), DetectorState::Complete);

    let phrase = detector.take_phrase();
    assert!(phrase.len() >= SAMPLE_RATE as usize);
}

#[test]
fn test_detector_caps_phrase_length() {
    let settings = ListenSettings {
        phrase_time_limit: Duration::from_secs(2),
        ..ListenSettings::default()
    };
    let mut detector = UtteranceDetector::new(settings, SAMPLE_RATE);

    feed(&mut detector, &generate_silence(0.5));
    let state = feed(&mut detector, &generate_sine_samples(220.0, 4.0, 0.5));

    assert_eq!(state, DetectorState::Complete);
    // Pre-roll plus at most the capped speech
    assert!(detector.phrase().len() <= (SAMPLE_RATE as usize) * 5 / 2 + 1600);
}

#[test]
fn test_detector_ignores_quiet_noise() {
    let mut detector = UtteranceDetector::new(ListenSettings::default(), SAMPLE_RATE);

    feed(&mut detector, &generate_silence(0.5));
    // Well under the 300/32768 floor
    let state = feed(&mut detector, &generate_sine_samples(220.0, 1.0, 0.002));

    assert_eq!(state, DetectorState::WaitingForSpeech);
}

#[test]
fn test_rms_of_sine() {
    let samples = generate_sine_samples(440.0, 1.0, 1.0);
    let energy = rms(&samples);

    // RMS of a full-scale sine is 1/sqrt(2)
    assert!((energy - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.01);
    assert!(rms(&[]).abs() < f32::EPSILON);
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.5, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();

    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len() as usize, samples.len());
}

#[test]
fn test_chunked_text_fits_google_limit() {
    let reply = "Bien sûr ! Voici une réponse assez longue pour dépasser la limite \
                 de cent caractères imposée par le service de synthèse vocale.";
    let chunks = chunk_text(reply, 100);

    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|c| c.chars().count() <= 100));
}

#[tokio::test]
async fn test_store_writes_into_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let store = AudioStore::new(dir.path().join("nested").join("audio"));

    let artifact = store.save(common::FAKE_MP3).await.unwrap();

    assert!(artifact.file_name.starts_with("reply-"));
    assert!(artifact.file_name.ends_with(".mp3"));
    assert_eq!(store.resolve(&artifact.file_name).await, Some(artifact));
}
