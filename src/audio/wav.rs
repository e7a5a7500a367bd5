//! Reading and writing the normalized waveform.
//!
//! The normalized form is what the transcriber consumes: 16kHz, mono,
//! signed 16-bit PCM. Readers accept any PCM WAV and convert on the way in.

use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, VoiceError};
use std::io::{Read, Seek, Write};
use std::path::Path;

/// WAV header parameters of the normalized waveform.
pub fn normalized_spec() -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Read a WAV file from disk as 16kHz mono samples.
pub fn read_waveform(path: &Path) -> Result<Vec<i16>> {
    let file = std::fs::File::open(path)?;
    read_from(std::io::BufReader::new(file))
}

/// Read WAV data from any reader, downmixing and resampling to 16kHz mono.
pub fn read_from<R: Read>(reader: R) -> Result<Vec<i16>> {
    let mut wav_reader = hound::WavReader::new(reader)
        .map_err(|e| VoiceError::Other(format!("Failed to parse WAV file: {}", e)))?;

    let spec = wav_reader.spec();
    if spec.channels == 0 {
        return Err(VoiceError::Other("WAV file declares zero channels".to_string()));
    }

    let raw_samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        (hound::SampleFormat::Float, 32) => wav_reader
            .samples::<f32>()
            .map(|s| s.map(f32_to_i16))
            .collect::<std::result::Result<Vec<_>, _>>(),
        (format, bits) => {
            return Err(VoiceError::Other(format!(
                "Unsupported WAV sample format: {:?} {}-bit",
                format, bits
            )));
        }
    }
    .map_err(|e| VoiceError::Other(format!("Failed to read WAV samples: {}", e)))?;

    let mono_samples = downmix(&raw_samples, spec.channels);
    Ok(resample(&mono_samples, spec.sample_rate, SAMPLE_RATE))
}

/// Write samples as a normalized waveform file.
pub fn write_waveform(path: &Path, samples: &[i16]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_to(std::io::BufWriter::new(file), samples)
}

/// Write samples as normalized WAV data into any seekable writer.
pub fn write_to<W: Write + Seek>(writer: W, samples: &[i16]) -> Result<()> {
    let wav_error = |e: hound::Error| VoiceError::ConversionFailed {
        message: format!("Failed to write WAV data: {}", e),
    };

    let mut wav_writer = hound::WavWriter::new(writer, normalized_spec()).map_err(wav_error)?;
    for &sample in samples {
        wav_writer.write_sample(sample).map_err(wav_error)?;
    }
    wav_writer.finalize().map_err(wav_error)
}

/// Convert a float sample in [-1.0, 1.0] to 16-bit PCM.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Average interleaved frames down to a single channel.
pub fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
