//! WAV decode and concatenation for the podcast pipeline.

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::{Error, Result};

/// Decoded 16-bit PCM audio for one voiced segment.
#[derive(Debug, Clone)]
pub struct PcmAudio {
    pub spec: WavSpec,
    pub samples: Vec<i16>,
}

impl PcmAudio {
    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() as u64 / self.spec.channels.max(1) as u64;
        Duration::from_secs_f64(frames as f64 / self.spec.sample_rate.max(1) as f64)
    }
}

/// Decode an in-memory WAV file. Only 16-bit integer PCM is accepted,
/// which is what the TTS vendor returns for `audio_format: wav`.
pub fn decode_wav(bytes: &[u8]) -> Result<PcmAudio> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(Error::InvalidResponse(format!(
            "expected 16-bit PCM audio, got {:?} at {} bits",
            spec.sample_format, spec.bits_per_sample
        )));
    }
    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(PcmAudio { spec, samples })
}

/// Write `parts` to one WAV file in order, separated by `gap` of silence
/// (none after the last part). All parts must share the first part's spec.
pub fn concat_with_silence(parts: &[PcmAudio], gap: Duration, path: &Path) -> Result<()> {
    let first = parts.first().ok_or_else(|| {
        Error::InvalidResponse("no audio segments to concatenate".to_string())
    })?;
    let spec = first.spec;
    if let Some(bad) = parts.iter().find(|p| p.spec != spec) {
        return Err(Error::InvalidResponse(format!(
            "segment spec mismatch: {:?} vs {:?}",
            bad.spec, spec
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let gap_samples =
        (spec.sample_rate as u64 * spec.channels as u64 * gap.as_millis() as u64 / 1000) as usize;

    let mut writer = WavWriter::create(path, spec)?;
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            for _ in 0..gap_samples {
                writer.write_sample(0i16)?;
            }
        }
        for &sample in &part.samples {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()?;
    Ok(())
}
