//! Sample-level helpers shared by decoders, DSP and the player.

pub mod buffer;
pub mod samples;
