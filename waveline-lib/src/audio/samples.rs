//! Helpers for converting and re-laying-out PCM sample buffers.

/// Convert a signed 16-bit sample to a normalized float.
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Convert a normalized float to a signed 16-bit sample.
///
/// Values outside `[-1.0, 1.0]` are clamped before scaling.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Convert a slice of 16-bit samples into normalized floats.
pub fn convert_to_f32(input: &[i16], output: &mut [f32]) {
    for (out, &sample) in output.iter_mut().zip(input.iter()) {
        *out = i16_to_f32(sample);
    }
}

/// Convert a slice of normalized floats into 16-bit samples.
pub fn convert_to_i16(input: &[f32], output: &mut [i16]) {
    for (out, &sample) in output.iter_mut().zip(input.iter()) {
        *out = f32_to_i16(sample);
    }
}

/// Interleave per-channel buffers into a single frame-ordered buffer.
///
/// The shortest channel decides how many frames are produced.
pub fn interleave(channels: &[&[f32]]) -> Vec<f32> {
    if channels.is_empty() {
        return Vec::new();
    }

    let frames = channels.iter().map(|ch| ch.len()).min().unwrap_or(0);
    let mut out = Vec::with_capacity(frames * channels.len());
    for frame in 0..frames {
        for channel in channels {
            out.push(channel[frame]);
        }
    }
    out
}

/// Split an interleaved buffer into one buffer per channel.
///
/// A trailing partial frame is dropped.
pub fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let channels = channels.max(1);
    let frames = samples.len() / channels;
    let mut out = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            out[ch].push(sample);
        }
    }
    out
}

/// Duplicate a mono buffer into interleaved stereo.
pub fn upmix_mono(samples: &[f32]) -> Vec<f32> {
    samples.iter().flat_map(|&s| [s, s]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_float_conversion_clamps_and_scales() {
        assert_eq!(i16_to_f32(i16::MIN), -1.0);
        assert_eq!(i16_to_f32(0), 0.0);
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(2.5), 32767);
        assert_eq!(f32_to_i16(-3.0), -32767);
    }

    #[test]
    fn deinterleave_drops_partial_frame() {
        let channels = deinterleave(&[0.1, 0.2, 0.3, 0.4, 0.5], 2);
        assert_eq!(channels, vec![vec![0.1, 0.3], vec![0.2, 0.4]]);

        let left = channels[0].as_slice();
        let right = channels[1].as_slice();
        assert_eq!(interleave(&[left, right]), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn upmix_duplicates_each_sample() {
        assert_eq!(upmix_mono(&[0.5, -0.25]), vec![0.5, 0.5, -0.25, -0.25]);
    }
}
