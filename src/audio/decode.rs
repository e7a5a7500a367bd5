//! In-process decoding with symphonia.
//!
//! Used only when ffmpeg is not installed. Covers the containers and codecs
//! symphonia ships (WAV, MP3, FLAC, Vorbis, AAC in MP4/MKV/WebM); anything
//! else fails with `ConversionFailed`.

use crate::audio::transcode::WaveformConverter;
use crate::audio::wav;
use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, VoiceError};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode the first audio track of `path` into mono samples at its native rate.
    ///
    /// Returns the samples and the source sample rate.
    pub fn decode_mono(&self, path: &Path) -> Result<(Vec<i16>, u32)> {
        let file = File::open(path)?;
        let stream = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| decode_error("unrecognized container", e))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| VoiceError::ConversionFailed {
                message: "no audio track found".to_string(),
            })?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| decode_error("unsupported codec", e))?;

        let mut samples = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(decode_error("failed to read packet", e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = Some(spec.rate);

                    let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    let channels = spec.channels.count().max(1) as u16;
                    samples.extend(wav::downmix(buffer.samples(), channels));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!("skipping undecodable packet: {}", e);
                }
                Err(e) => return Err(decode_error("decode failed", e)),
            }
        }

        let rate = sample_rate.ok_or_else(|| VoiceError::ConversionFailed {
            message: "unknown sample rate".to_string(),
        })?;
        if samples.is_empty() {
            return Err(VoiceError::ConversionFailed {
                message: "no audio samples decoded".to_string(),
            });
        }

        Ok((samples, rate))
    }
}

fn decode_error(context: &str, error: SymphoniaError) -> VoiceError {
    VoiceError::ConversionFailed {
        message: format!("{}: {}", context, error),
    }
}

impl WaveformConverter for SymphoniaDecoder {
    fn to_waveform(&self, container: &Path, output: &Path) -> Result<()> {
        let (mono, rate) = self.decode_mono(container)?;
        let resampled = wav::resample(&mono, rate, SAMPLE_RATE);
        wav::write_waveform(output, &resampled)?;

        tracing::debug!(
            input_rate = rate,
            samples = resampled.len(),
            "decoded in-process"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "symphonia"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_test_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn decodes_stereo_48k_wav_to_normalized_waveform() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("voice.wav");
        let output = dir.path().join("voice_16k.wav");

        // Half a second of constant stereo signal at 48kHz
        let stereo: Vec<i16> = (0..24000).flat_map(|_| [1000i16, 3000]).collect();
        write_test_wav(&input, 48000, 2, &stereo);

        SymphoniaDecoder::new().to_waveform(&input, &output).unwrap();

        let reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.spec(), wav::normalized_spec());

        let samples = wav::read_waveform(&output).unwrap();
        assert!(samples.len() >= 7900 && samples.len() <= 8100);
        assert!(samples.iter().all(|&s| (1990..=2010).contains(&s)));
    }

    #[test]
    fn garbage_input_is_conversion_failure() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("upload_x.webm");
        let output = dir.path().join("upload_x.wav");
        std::fs::write(&input, b"this is not audio at all").unwrap();

        let result = SymphoniaDecoder::new().to_waveform(&input, &output);
        assert!(matches!(result, Err(VoiceError::ConversionFailed { .. })));
        assert!(!output.exists());
    }

    #[test]
    fn missing_input_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = SymphoniaDecoder::new()
            .decode_mono(&dir.path().join("missing.webm"));
        assert!(matches!(result, Err(VoiceError::Io(_))));
    }
}
