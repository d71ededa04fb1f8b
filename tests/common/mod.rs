#![allow(dead_code)]

use std::f32::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use hound::{SampleFormat, WavSpec, WavWriter};

pub const SAMPLE_RATE: u32 = 22_050;

pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

pub fn sine(frequency: f32, amplitude: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let total = (seconds * sample_rate as f32) as usize;
    (0..total)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Square wave rich in harmonics and zero crossings.
pub fn square(frequency: f32, amplitude: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    sine(frequency, 1.0, seconds, sample_rate)
        .into_iter()
        .map(|v| if v >= 0.0 { amplitude } else { -amplitude })
        .collect()
}

/// Corpus-style file name carrying `code` in the emotion field.
pub fn corpus_name(code: &str, take: usize, actor: usize) -> String {
    format!("03-01-{}-01-{:02}-01-{:02}.wav", code, take, actor)
}

/// Two clearly separable classes: quiet low tones are `calm` (02), loud high
/// square waves are `angry` (05). `per_class` files per actor and label.
pub fn build_two_class_corpus(
    root: &Path,
    actors: usize,
    per_class: usize,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for actor in 1..=actors {
        let dir = root.join(format!("Actor_{:02}", actor));
        fs::create_dir_all(&dir)?;
        for take in 1..=per_class {
            let offset = (actor * per_class + take) as f32 * 7.0;

            let calm = dir.join(corpus_name("02", take, actor));
            write_wav(&calm, &sine(180.0 + offset, 0.05, 0.5, SAMPLE_RATE), SAMPLE_RATE)?;
            written.push(calm);

            let angry = dir.join(corpus_name("05", take, actor));
            write_wav(&angry, &square(2_500.0 + offset, 0.8, 0.5, SAMPLE_RATE), SAMPLE_RATE)?;
            written.push(angry);
        }
    }
    written.sort();
    Ok(written)
}
