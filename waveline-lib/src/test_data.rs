//! Synthetic audio fixtures for unit tests.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::path::Path;

use symphonia::core::io::MediaSource;

use crate::decoder::{
    AudioFormat, DecodeError, DecodeStatus, Decoder, DecoderFactory, DecoderRegistry,
    MemoryDecoder, Metadata,
};

/// Interleaved sine wave with the same signal on every channel.
pub fn sine_wave(freq: f32, sample_rate: u32, channels: u16, frames: usize, amplitude: f32) -> Vec<f32> {
    let mut out = Vec::with_capacity(frames * channels as usize);
    for n in 0..frames {
        let value = amplitude * (2.0 * PI * freq * n as f32 / sample_rate as f32).sin();
        for _ in 0..channels {
            out.push(value);
        }
    }
    out
}

/// Encode interleaved float samples as a 16-bit PCM RIFF/WAVE file.
pub fn wav_bytes(sample_rate: u32, channels: u16, samples: &[f32]) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let block_align = channels * bits_per_sample / 8;
    let byte_rate = sample_rate * block_align as u32;
    let data_len = (samples.len() * 2) as u32;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16_u32.to_le_bytes());
    out.extend_from_slice(&1_u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Compare two floats with an absolute tolerance.
pub fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

/// Serves fixed PCM by file name, so player tests need nothing on disk.
/// Names starting with `broken` decode a few blocks and then fail; names
/// starting with `estimated` report half their length until they end.
#[derive(Default)]
pub struct ToneFactory {
    tracks: HashMap<String, (AudioFormat, Vec<f32>)>,
}

impl ToneFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, name: &str, format: AudioFormat, samples: Vec<f32>) -> Self {
        self.tracks.insert(name.to_string(), (format, samples));
        self
    }

    /// A registry that routes `.tone` files here.
    pub fn into_registry(self) -> DecoderRegistry {
        let mut registry = DecoderRegistry::new();
        registry.register("tone", self);
        registry
    }
}

impl DecoderFactory for ToneFactory {
    fn open_path(&self, path: &Path) -> Result<Box<dyn Decoder>, DecodeError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (format, samples) = self
            .tracks
            .get(&name)
            .cloned()
            .ok_or_else(|| DecodeError::Io(std::io::ErrorKind::NotFound.into()))?;
        let decoder = MemoryDecoder::new(format, samples);
        if name.starts_with("broken") {
            return Ok(Box::new(FailingDecoder {
                inner: decoder,
                blocks_left: 3,
            }));
        }
        if name.starts_with("estimated") {
            let reported = decoder.sample_count() / 2;
            return Ok(Box::new(EstimatedDecoder {
                inner: decoder,
                reported,
                ended: false,
            }));
        }
        Ok(Box::new(decoder))
    }

    fn open_stream(
        &self,
        _source: Box<dyn MediaSource>,
        extension: &str,
    ) -> Result<Box<dyn Decoder>, DecodeError> {
        Err(DecodeError::UnsupportedFormat(extension.to_string()))
    }
}

/// Decodes a fixed number of blocks, then reports corrupt data.
pub struct FailingDecoder {
    inner: MemoryDecoder,
    blocks_left: usize,
}

impl Decoder for FailingDecoder {
    fn decode(&mut self, buf: &mut [f32]) -> Result<DecodeStatus, DecodeError> {
        if self.blocks_left == 0 {
            return Err(DecodeError::InvalidData("corrupt frame".to_string()));
        }
        self.blocks_left -= 1;
        self.inner.decode(buf)
    }

    fn seek_sample(&mut self, frame: u64) -> Result<(), DecodeError> {
        self.inner.seek_sample(frame)
    }

    fn format(&self) -> AudioFormat {
        self.inner.format()
    }

    fn metadata(&self) -> &Metadata {
        self.inner.metadata()
    }

    fn sample_count(&self) -> u64 {
        self.inner.sample_count()
    }

    fn current_sample(&self) -> u64 {
        self.inner.current_sample()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Reports a short length estimate until decoding reaches the real end.
pub struct EstimatedDecoder {
    inner: MemoryDecoder,
    reported: u64,
    ended: bool,
}

impl Decoder for EstimatedDecoder {
    fn decode(&mut self, buf: &mut [f32]) -> Result<DecodeStatus, DecodeError> {
        let status = self.inner.decode(buf)?;
        if status == DecodeStatus::EndOfStream {
            self.ended = true;
        }
        Ok(status)
    }

    fn seek_sample(&mut self, frame: u64) -> Result<(), DecodeError> {
        self.inner.seek_sample(frame)
    }

    fn format(&self) -> AudioFormat {
        self.inner.format()
    }

    fn metadata(&self) -> &Metadata {
        self.inner.metadata()
    }

    fn sample_count(&self) -> u64 {
        if self.ended {
            self.inner.sample_count()
        } else {
            self.reported.max(self.inner.current_sample())
        }
    }

    fn current_sample(&self) -> u64 {
        self.inner.current_sample()
    }

    fn length_is_exact(&self) -> bool {
        self.ended
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
