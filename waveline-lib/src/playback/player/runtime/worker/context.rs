//! Handles captured when the worker is spawned.

use std::sync::Arc;

use crate::output::OutputFactory;

use super::super::Shared;

pub(in crate::playback::player::runtime) struct ThreadContext {
    pub(in crate::playback::player::runtime) shared: Arc<Shared>,
    pub(in crate::playback::player::runtime) output_factory: Arc<dyn OutputFactory>,
}
