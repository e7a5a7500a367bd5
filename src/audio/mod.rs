//! Audio normalization: any uploaded container to 16kHz mono PCM WAV.

pub mod decode;
pub mod process;
pub mod transcode;
pub mod wav;

pub use decode::SymphoniaDecoder;
pub use process::{ProcessOutput, ProcessRunner, SystemProcessRunner};
pub use transcode::{FfmpegConverter, MockWaveformConverter, Transcoder, WaveformConverter};
