//! Worker-thread bootstrap for `Player`.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::output::OutputFactory;

use super::worker::{run_playback_thread, ThreadContext};
use super::Shared;

/// Spawn the worker that owns decode, DSP and output for one player.
pub(crate) fn spawn_worker(
    shared: Arc<Shared>,
    output_factory: Arc<dyn OutputFactory>,
) -> io::Result<JoinHandle<()>> {
    let context = ThreadContext {
        shared,
        output_factory,
    };
    thread::Builder::new()
        .name("waveline-player".to_string())
        .spawn(move || run_playback_thread(context))
}
