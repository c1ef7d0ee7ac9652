//! Playback worker internals.
//!
//! - [`context`] holds what the worker captured at spawn time.
//! - [`guard`] tracks worker liveness.
//! - [`runner`] executes the decode, process and write loop.

mod context;
mod guard;
mod runner;

pub(in crate::playback::player::runtime) use context::ThreadContext;
pub(in crate::playback::player::runtime) use runner::run_playback_thread;
