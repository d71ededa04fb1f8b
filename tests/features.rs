mod common;

use anyhow::Result;
use approx::assert_abs_diff_eq;
use emotionalyzer::features::{FeatureConfig, FeatureExtractor};
use emotionalyzer::{EmotionError, Waveform};
use tempfile::tempdir;

use common::{sine, square, write_wav, SAMPLE_RATE};

#[test]
fn silent_second_yields_full_vector_without_crossings() -> Result<()> {
    let extractor = FeatureExtractor::default();
    let silence = Waveform::new(vec![0.0; SAMPLE_RATE as usize], SAMPLE_RATE)?;
    let features = extractor.extract(&silence)?;

    assert_eq!(features.len(), 202);
    assert_eq!(features.zero_crossing_rate(), Some(0.0));
    assert_eq!(features.rms_energy(), Some(0.0));
    assert!(features.as_array().iter().all(|v| v.is_finite()));
    Ok(())
}

#[test]
fn negative_dc_offset_has_no_crossings() -> Result<()> {
    let extractor = FeatureExtractor::default();
    let offset = Waveform::new(vec![-0.25; SAMPLE_RATE as usize], SAMPLE_RATE)?;
    let features = extractor.extract(&offset)?;

    assert_eq!(features.zero_crossing_rate(), Some(0.0));
    assert!(features.rms_energy().unwrap() > 0.0);
    Ok(())
}

#[test]
fn vector_length_is_independent_of_duration_and_rate() -> Result<()> {
    let extractor = FeatureExtractor::default();
    let inputs = [
        Waveform::new(sine(440.0, 0.5, 0.02, SAMPLE_RATE), SAMPLE_RATE)?,
        Waveform::new(sine(440.0, 0.5, 1.5, SAMPLE_RATE), SAMPLE_RATE)?,
        Waveform::new(sine(300.0, 0.5, 0.7, 16_000), 16_000)?,
        Waveform::new(square(800.0, 0.3, 0.4, 44_100), 44_100)?,
    ];
    for waveform in &inputs {
        let features = extractor.extract(waveform)?;
        assert_eq!(features.len(), extractor.dimension());
        assert!(features.as_array().iter().all(|v| v.is_finite()));
    }
    Ok(())
}

#[test]
fn disabled_groups_shrink_the_vector() -> Result<()> {
    let config = FeatureConfig {
        mfcc: true,
        chroma: false,
        mel: false,
        n_mfcc: 13,
    };
    let extractor = FeatureExtractor::new(config)?;
    let waveform = Waveform::new(sine(220.0, 0.4, 0.5, SAMPLE_RATE), SAMPLE_RATE)?;
    assert_eq!(extractor.extract(&waveform)?.len(), 13 * 2 + 2);
    Ok(())
}

#[test]
fn louder_and_busier_signals_raise_rms_and_zcr() -> Result<()> {
    let extractor = FeatureExtractor::default();
    let quiet = Waveform::new(sine(150.0, 0.05, 0.5, SAMPLE_RATE), SAMPLE_RATE)?;
    let loud = Waveform::new(square(3_000.0, 0.8, 0.5, SAMPLE_RATE), SAMPLE_RATE)?;
    let quiet = extractor.extract(&quiet)?;
    let loud = extractor.extract(&loud)?;
    assert!(loud.rms_energy() > quiet.rms_energy());
    assert!(loud.zero_crossing_rate() > quiet.zero_crossing_rate());
    Ok(())
}

#[test]
fn file_extraction_matches_in_memory_extraction() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("tone.wav");
    let samples = sine(330.0, 0.5, 0.5, SAMPLE_RATE);
    write_wav(&path, &samples, SAMPLE_RATE)?;

    let extractor = FeatureExtractor::default();
    let from_file = extractor.extract_file(&path)?;
    let quantized: Vec<f32> = samples
        .iter()
        .map(|s| ((s * i16::MAX as f32) as i16) as f32 / 32_768.0)
        .collect();
    let in_memory = extractor.extract(&Waveform::new(quantized, SAMPLE_RATE)?)?;

    assert_eq!(from_file.len(), in_memory.len());
    for (a, b) in from_file.as_array().iter().zip(in_memory.as_array().iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-2);
    }
    Ok(())
}

#[test]
fn undecodable_file_is_a_decode_error() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("broken.wav");
    std::fs::write(&path, b"definitely not audio")?;
    let err = FeatureExtractor::default().extract_file(&path).unwrap_err();
    assert!(matches!(err, EmotionError::Decode { .. }));
    Ok(())
}
