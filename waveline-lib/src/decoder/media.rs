//! Symphonia-backed decoder for every container and codec symphonia ships.

use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_ALAC, CODEC_TYPE_FLAC, CODEC_TYPE_MP1,
    CODEC_TYPE_MP2, CODEC_TYPE_MP3, CODEC_TYPE_NULL, CODEC_TYPE_VORBIS,
};
use symphonia::core::errors::{Error, SeekErrorKind};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;
use symphonia::core::sample::SampleFormat;
use symphonia::core::units::{Time, TimeBase};

use crate::constants::OUTPUT_CHANNELS;

use super::info::{parse_leading_number, parse_replay_gain_value};
use super::{Artwork, AudioFormat, DecodeError, DecodeStatus, Decoder, Metadata};

/// Corrupt packets tolerated in a row before decoding gives up.
const MAX_CONSECUTIVE_DECODE_ERRORS: usize = 16;

struct Session {
    reader: Box<dyn FormatReader>,
    codec: Box<dyn CodecDecoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
}

/// Decoder for files and byte streams understood by symphonia.
///
/// Output is always stereo: mono input is duplicated and wider layouts keep
/// their first two channels.
pub struct SymphoniaDecoder {
    session: Option<Session>,
    format: AudioFormat,
    metadata: Metadata,
    total_frames: u64,
    /// False while `total_frames` is an estimate (MPEG audio) or unknown.
    length_exact: bool,
    /// Interleaved output samples handed to callers since the start of the stream.
    cursor: u64,
    /// Frames to discard from the next decoded packets after an accurate seek.
    skip_frames: u64,
    pending: VecDeque<f32>,
    scratch: Option<SampleBuffer<f32>>,
}

impl SymphoniaDecoder {
    /// Open a file, probing with its extension first and without a hint
    /// if that fails.
    pub fn open_path(path: &Path) -> Result<Self, DecodeError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        let byte_len = std::fs::metadata(path).map(|m| m.len()).ok();
        let file = File::open(path)?;
        match Self::open_source(Box::new(file), extension.as_deref(), byte_len) {
            Ok(decoder) => Ok(decoder),
            Err(DecodeError::UnsupportedFormat(reason)) if extension.is_some() => {
                debug!(
                    "probe with extension hint failed for {}: {}; retrying without hint",
                    path.display(),
                    reason
                );
                let file = File::open(path)?;
                Self::open_source(Box::new(file), None, byte_len)
            }
            Err(err) => Err(err),
        }
    }

    /// Open an arbitrary media source. `extension` is used as a probe hint.
    pub fn open_stream(
        source: Box<dyn MediaSource>,
        extension: Option<&str>,
    ) -> Result<Self, DecodeError> {
        let byte_len = source.byte_len();
        Self::open_source(source, extension, byte_len)
    }

    fn open_source(
        source: Box<dyn MediaSource>,
        extension: Option<&str>,
        byte_len: Option<u64>,
    ) -> Result<Self, DecodeError> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };

        let mut probed = symphonia::default::get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;

        let track = probed
            .format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::UnsupportedFormat("no decodable audio track".into()))?;

        let params = track.codec_params.clone();
        let track_id = track.id;

        let codec = symphonia::default::get_codecs().make(&params, &DecoderOptions::default())?;

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| DecodeError::InvalidData("stream has no sample rate".into()))?;
        let format = AudioFormat {
            sample_rate,
            channels: OUTPUT_CHANNELS,
            bit_depth: params.bits_per_sample.unwrap_or(0) as u16,
            is_float: matches!(
                params.sample_format,
                Some(SampleFormat::F32) | Some(SampleFormat::F64)
            ),
        };
        let total_frames = params.n_frames.unwrap_or(0);
        let length_exact = params.n_frames.is_some()
            && !matches!(
                params.codec,
                CODEC_TYPE_MP1 | CODEC_TYPE_MP2 | CODEC_TYPE_MP3
            );
        if !length_exact {
            debug!("stream length is not exact ({} frames reported)", total_frames);
        }

        let mut metadata = Metadata {
            duration: format.frames_to_duration(total_frames),
            variable_bitrate: matches!(
                params.codec,
                CODEC_TYPE_VORBIS | CODEC_TYPE_FLAC | CODEC_TYPE_ALAC
            ),
            ..Metadata::default()
        };

        // Container-level tags win over tags found while probing (e.g. ID3).
        if let Some(revision) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
            apply_revision(&mut metadata, revision);
        }
        if let Some(revision) = probed.format.metadata().current() {
            apply_revision(&mut metadata, revision);
        }

        let secs = metadata.duration.as_secs_f64();
        if let Some(bytes) = byte_len.filter(|_| secs > 0.0) {
            metadata.bitrate = Some((bytes as f64 * 8.0 / secs).round() as u32);
        }

        Ok(Self {
            session: Some(Session {
                reader: probed.format,
                codec,
                track_id,
                time_base: params.time_base,
            }),
            format,
            metadata,
            total_frames,
            length_exact,
            cursor: 0,
            skip_frames: 0,
            pending: VecDeque::new(),
            scratch: None,
        })
    }

    fn channels(&self) -> u64 {
        self.format.channels as u64
    }

    fn remaining_samples(&self) -> Option<u64> {
        if !self.length_exact || self.total_frames == 0 {
            return None;
        }
        Some((self.total_frames * self.channels()).saturating_sub(self.cursor))
    }

    /// Decode packets until at least one sample is pending or the stream ends.
    ///
    /// Returns `false` at end of stream.
    fn refill(&mut self) -> Result<bool, DecodeError> {
        let mut consecutive_errors = 0;

        loop {
            let Some(session) = self.session.as_mut() else {
                return Ok(false);
            };

            let packet = match session.reader.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(Error::ResetRequired) => {
                    warn!("stream parameters changed mid-stream; ending track");
                    return Ok(false);
                }
                Err(err) => return Err(err.into()),
            };

            if packet.track_id() != session.track_id {
                continue;
            }

            let decoded = match session.codec.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::DecodeError(err)) => {
                    consecutive_errors += 1;
                    warn!("decode error: {}", err);
                    if consecutive_errors >= MAX_CONSECUTIVE_DECODE_ERRORS {
                        return Err(DecodeError::InvalidData(format!(
                            "{} consecutive corrupt packets: {}",
                            consecutive_errors, err
                        )));
                    }
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let spec = *decoded.spec();
            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }

            let needs_new_scratch = self
                .scratch
                .as_ref()
                .map(|buf| buf.capacity() < decoded.capacity() * spec.channels.count())
                .unwrap_or(true);
            if needs_new_scratch {
                self.scratch = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(scratch) = self.scratch.as_mut() else {
                continue;
            };
            scratch.copy_interleaved_ref(decoded);

            let source_channels = spec.channels.count().max(1);
            let skip = (self.skip_frames as usize).min(frames);
            self.skip_frames -= skip as u64;

            for frame in scratch.samples().chunks_exact(source_channels).skip(skip) {
                let left = frame[0];
                let right = if source_channels > 1 { frame[1] } else { frame[0] };
                self.pending.push_back(left);
                self.pending.push_back(right);
            }

            if !self.pending.is_empty() {
                return Ok(true);
            }
        }
    }

    /// Settle the length on where decoding actually stopped.
    fn mark_end_of_stream(&mut self) {
        if self.length_exact {
            return;
        }
        let frames = self.current_sample();
        if frames != self.total_frames {
            debug!(
                "stream length corrected from {} to {} frames",
                self.total_frames, frames
            );
        }
        self.total_frames = frames;
        self.length_exact = true;
        self.metadata.duration = self.format.frames_to_duration(frames);
    }

    fn ts_to_frame(&self, ts: u64, time_base: Option<TimeBase>) -> u64 {
        match time_base {
            Some(tb) => {
                let time = tb.calc_time(ts);
                time.seconds * self.format.sample_rate as u64
                    + (time.frac * self.format.sample_rate as f64).round() as u64
            }
            None => ts,
        }
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&mut self, buf: &mut [f32]) -> Result<DecodeStatus, DecodeError> {
        if self.session.is_none() {
            return Ok(DecodeStatus::EndOfStream);
        }
        if buf.is_empty() {
            return Ok(DecodeStatus::Decoded(0));
        }

        let mut wanted = buf.len();
        if let Some(remaining) = self.remaining_samples() {
            wanted = wanted.min(remaining as usize);
        }

        let mut filled = 0;
        let mut ended = false;
        while filled < wanted {
            if self.pending.is_empty() && !self.refill()? {
                ended = true;
                break;
            }
            let take = self.pending.len().min(wanted - filled);
            for (slot, sample) in buf[filled..filled + take]
                .iter_mut()
                .zip(self.pending.drain(..take))
            {
                *slot = sample;
            }
            filled += take;
        }

        self.cursor += filled as u64;
        if ended {
            self.mark_end_of_stream();
        } else if !self.length_exact {
            self.total_frames = self.total_frames.max(self.current_sample());
        }
        if filled == 0 {
            return Ok(DecodeStatus::EndOfStream);
        }
        Ok(DecodeStatus::Decoded(filled))
    }

    fn seek_sample(&mut self, frame: u64) -> Result<(), DecodeError> {
        if self.length_exact && frame > self.total_frames {
            return Err(DecodeError::SeekOutOfRange {
                requested: self.format.frames_to_duration(frame),
                duration: self.format.frames_to_duration(self.total_frames),
            });
        }

        let sample_rate = self.format.sample_rate as u64;
        let Some(session) = self.session.as_mut() else {
            return Err(DecodeError::Closed);
        };

        let time = Time::new(
            frame / sample_rate,
            (frame % sample_rate) as f64 / sample_rate as f64,
        );
        let seeked = match session.reader.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time,
                track_id: Some(session.track_id),
            },
        ) {
            Ok(seeked) => seeked,
            Err(Error::SeekError(SeekErrorKind::OutOfRange)) => {
                return Err(DecodeError::SeekOutOfRange {
                    requested: self.format.frames_to_duration(frame),
                    duration: self.format.frames_to_duration(self.total_frames),
                });
            }
            Err(err) => return Err(err.into()),
        };
        session.codec.reset();
        let time_base = session.time_base;

        let landed = self.ts_to_frame(seeked.actual_ts, time_base);
        self.skip_frames = frame.saturating_sub(landed);
        self.pending.clear();
        self.cursor = frame * self.channels();
        if !self.length_exact {
            self.total_frames = self.total_frames.max(frame);
        }
        Ok(())
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn sample_count(&self) -> u64 {
        self.total_frames
    }

    fn current_sample(&self) -> u64 {
        self.cursor / self.channels()
    }

    fn length_is_exact(&self) -> bool {
        self.length_exact
    }

    fn close(&mut self) {
        self.session = None;
        self.pending.clear();
        self.scratch = None;
    }
}

fn apply_revision(metadata: &mut Metadata, revision: &MetadataRevision) {
    for tag in revision.tags() {
        let Some(key) = tag.std_key else {
            continue;
        };
        let value = tag.value.to_string();
        match key {
            StandardTagKey::TrackTitle => metadata.title = Some(value),
            StandardTagKey::Artist => metadata.artist = Some(value),
            StandardTagKey::Album => metadata.album = Some(value),
            StandardTagKey::AlbumArtist => metadata.album_artist = Some(value),
            StandardTagKey::Genre => metadata.genre = Some(value),
            StandardTagKey::Comment => metadata.comment = Some(value),
            StandardTagKey::Date | StandardTagKey::OriginalDate => {
                if metadata.year.is_none() {
                    metadata.year = parse_leading_number(&value);
                }
            }
            StandardTagKey::TrackNumber => metadata.track = parse_leading_number(&value),
            StandardTagKey::DiscNumber => metadata.disc = parse_leading_number(&value),
            StandardTagKey::ReplayGainTrackGain => {
                metadata.replay_gain.track_gain = parse_replay_gain_value(&value)
            }
            StandardTagKey::ReplayGainTrackPeak => {
                metadata.replay_gain.track_peak = parse_replay_gain_value(&value)
            }
            StandardTagKey::ReplayGainAlbumGain => {
                metadata.replay_gain.album_gain = parse_replay_gain_value(&value)
            }
            StandardTagKey::ReplayGainAlbumPeak => {
                metadata.replay_gain.album_peak = parse_replay_gain_value(&value)
            }
            _ => {}
        }
    }

    if metadata.artwork.is_none() {
        if let Some(visual) = revision.visuals().first() {
            metadata.artwork = Some(Artwork {
                mime_type: visual.media_type.clone(),
                data: visual.data.to_vec(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use symphonia::core::io::ReadOnlySource;

    use super::*;
    use crate::test_data::{sine_wave, wav_bytes};

    fn wav(channels: u16, frames: usize) -> Vec<u8> {
        wav_bytes(8_000, channels, &sine_wave(440.0, 8_000, channels, frames, 0.5))
    }

    fn open_wav(channels: u16, frames: usize) -> SymphoniaDecoder {
        SymphoniaDecoder::open_stream(Box::new(Cursor::new(wav(channels, frames))), Some("wav"))
            .expect("open wav")
    }

    /// A 4000-frame stream whose container claimed only `reported` frames.
    fn open_with_estimate(reported: u64) -> SymphoniaDecoder {
        let mut decoder = open_wav(2, 4_000);
        decoder.total_frames = reported;
        decoder.length_exact = false;
        decoder
    }

    fn drain(decoder: &mut SymphoniaDecoder, chunk: usize) -> Vec<f32> {
        let mut out = Vec::new();
        let mut buf = vec![0.0; chunk];
        loop {
            match decoder.decode(&mut buf).unwrap() {
                DecodeStatus::Decoded(n) => out.extend_from_slice(&buf[..n]),
                DecodeStatus::EndOfStream => return out,
            }
        }
    }

    #[test]
    fn wav_stream_reports_format_and_duration() {
        let decoder = open_wav(2, 8_000);
        assert_eq!(decoder.format().sample_rate, 8_000);
        assert_eq!(decoder.format().channels, 2);
        assert_eq!(decoder.format().bit_depth, 16);
        assert_eq!(decoder.sample_count(), 8_000);
        assert_eq!(decoder.duration(), Duration::from_secs(1));
    }

    #[test]
    fn mono_source_is_upmixed_and_fully_decoded() {
        let mut decoder = open_wav(1, 1_000);
        let samples = drain(&mut decoder, 333);
        assert_eq!(samples.len(), 2_000);
        assert!(samples.chunks_exact(2).all(|f| f[0] == f[1]));
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert_eq!(decoder.current_sample(), 1_000);
    }

    #[test]
    fn seek_is_frame_accurate() {
        let mut reference = open_wav(2, 4_000);
        let all = drain(&mut reference, 512);

        let mut decoder = open_wav(2, 4_000);
        decoder.seek(Duration::from_millis(250)).unwrap();
        assert_eq!(decoder.current_sample(), 2_000);
        let tail = drain(&mut decoder, 512);
        assert_eq!(tail.len(), all.len() - 4_000);
        assert!((tail[0] - all[4_000]).abs() < 1e-6);
    }

    #[test]
    fn seek_out_of_range_is_rejected() {
        let mut decoder = open_wav(2, 800);
        let err = decoder.seek(Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, DecodeError::SeekOutOfRange { .. }));
        assert_eq!(decoder.current_sample(), 0);
    }

    #[test]
    fn short_estimate_does_not_truncate() {
        let mut decoder = open_with_estimate(1_000);
        assert!(!decoder.length_is_exact());
        let samples = drain(&mut decoder, 700);
        assert_eq!(samples.len(), 8_000);
        assert!(decoder.length_is_exact());
        assert_eq!(decoder.sample_count(), 4_000);
        assert_eq!(decoder.duration(), Duration::from_millis(500));
        assert_eq!(decoder.metadata().duration, Duration::from_millis(500));
    }

    #[test]
    fn unknown_length_plays_to_the_end() {
        let mut decoder = open_with_estimate(0);
        let samples = drain(&mut decoder, 512);
        assert_eq!(samples.len(), 8_000);
        assert_eq!(decoder.sample_count(), 4_000);
    }

    #[test]
    fn seek_past_an_estimate_is_left_to_the_reader() {
        let mut decoder = open_with_estimate(1_000);
        decoder.seek(Duration::from_millis(375)).unwrap();
        assert_eq!(decoder.current_sample(), 3_000);
        assert_eq!(drain(&mut decoder, 512).len(), 2_000);
        assert_eq!(decoder.sample_count(), 4_000);

        let mut decoder = open_with_estimate(1_000);
        let err = decoder.seek(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, DecodeError::SeekOutOfRange { .. }));
    }

    #[test]
    fn unseekable_source_decodes_and_only_skips_forward() {
        let source = ReadOnlySource::new(Cursor::new(wav(2, 4_000)));
        let mut decoder = SymphoniaDecoder::open_stream(Box::new(source), Some("wav"))
            .expect("open read-only wav");
        decoder.seek(Duration::from_millis(250)).unwrap();
        let mut buf = vec![0.0; 512];
        decoder.decode(&mut buf).unwrap();
        let err = decoder.seek(Duration::ZERO).unwrap_err();
        assert!(matches!(err, DecodeError::SeekNotSupported));
        assert_eq!(drain(&mut decoder, 512).len(), 2 * 2_000 - 512);
    }

    #[test]
    fn garbage_input_is_unsupported() {
        let result = SymphoniaDecoder::open_stream(
            Box::new(Cursor::new(vec![7_u8; 512])),
            Some("wav"),
        );
        assert!(result.is_err());
    }
}
