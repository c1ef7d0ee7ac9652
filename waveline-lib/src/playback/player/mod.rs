//! High-level playback controller.
//!
//! A [`Player`] owns one worker thread that pulls audio from the current
//! decoder, runs it through the DSP chain and writes it to the output.
//! Every public method validates synchronously, updates the shared status
//! and hands the worker a command through a single-slot mailbox.

mod controls;
mod error;
mod events;
mod prebuffer;
mod resample;
mod runtime;
mod settings;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::decoder::{AudioFormat, Decoder, DecoderRegistry, Metadata, ReplayGainInfo};
use crate::dsp::effects::{EffectChain, EffectContext};
use crate::output::{OutputError, OutputFactory, RodioOutputFactory};

use runtime::{spawn_worker, Shared};

pub use error::PlayerError;
pub use events::{PlayerEvent, SubscriptionId};
pub use resample::{MAX_SPEED, MIN_SPEED};
pub use settings::PlayerConfig;

/// Playback state exposed to callers and carried by `StateChanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Stopped,
    Playing,
    Paused,
    /// Reserved for sources that stall; local decoding never enters it.
    Buffering,
    /// A decode or output failure stopped playback. Loading a track clears it.
    Error,
}

/// A playable item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub path: PathBuf,
    /// Filled in from the decoder once the track is opened.
    #[serde(default)]
    pub duration: Option<Duration>,
    /// Overrides loudness tags read from the file.
    #[serde(default)]
    pub replay_gain: Option<ReplayGainInfo>,
}

impl Track {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            duration: None,
            replay_gain: None,
        }
    }

    pub fn with_replay_gain(mut self, info: ReplayGainInfo) -> Self {
        self.replay_gain = Some(info);
        self
    }

    /// File name for display, falling back to the full path.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Primary playback controller.
///
/// Methods take `&self`; share a player across threads with `Arc`.
/// Dropping the player closes it.
pub struct Player {
    shared: Arc<Shared>,
    registry: DecoderRegistry,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Player {
    /// Create a player and spawn its worker.
    ///
    /// # Arguments
    ///
    /// * `config` - Construction-time settings, sanitized before use.
    /// * `registry` - Decoders available to `load` and `set_next_track`.
    /// * `output_factory` - Creates the output the first time audio plays.
    pub fn new(
        config: PlayerConfig,
        registry: DecoderRegistry,
        output_factory: impl OutputFactory + 'static,
    ) -> Result<Self, PlayerError> {
        let config = config.sanitized();
        let chain = EffectChain::standard(EffectContext::default());
        let shared = Arc::new(Shared::new(config, chain));
        let worker = spawn_worker(shared.clone(), Arc::new(output_factory)).map_err(|err| {
            PlayerError::Output(OutputError::Device(format!(
                "failed to spawn playback worker: {}",
                err
            )))
        })?;

        Ok(Self {
            shared,
            registry,
            worker: Mutex::new(Some(worker)),
            closed: AtomicBool::new(false),
        })
    }

    /// Create a player on the default audio device with the built-in decoders.
    pub fn with_default_output(config: PlayerConfig) -> Result<Self, PlayerError> {
        let factory = RodioOutputFactory {
            buffer: Duration::from_millis(config.output_buffer_ms),
        };
        Self::new(config, DecoderRegistry::with_defaults(), factory)
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    pub fn state(&self) -> PlayerState {
        self.shared.status.read().unwrap().state
    }

    /// Audible position of the current track.
    pub fn position(&self) -> Duration {
        self.shared.status.read().unwrap().position
    }

    pub fn duration(&self) -> Duration {
        self.shared.status.read().unwrap().duration
    }

    pub fn volume(&self) -> f32 {
        self.shared.status.read().unwrap().volume
    }

    pub fn speed(&self) -> f32 {
        self.shared.status.read().unwrap().speed
    }

    pub fn current_track(&self) -> Option<Track> {
        self.shared.status.read().unwrap().current_track.clone()
    }

    pub fn next_track(&self) -> Option<Track> {
        self.shared.status.read().unwrap().next_track.clone()
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.shared.status.read().unwrap().format
    }

    pub fn metadata(&self) -> Option<Metadata> {
        self.shared.status.read().unwrap().metadata.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlayerState::Playing
    }

    /// Register a listener. It runs on its own thread and sees events in
    /// emission order.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&PlayerEvent) + Send + 'static,
    {
        self.shared.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    /// Run `f` with the DSP chain locked. The worker waits for it, so keep
    /// it short.
    pub fn with_effects<R>(&self, f: impl FnOnce(&mut EffectChain) -> R) -> R {
        let mut chain = self.shared.chain.lock().unwrap();
        f(&mut chain)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop the worker and release decoders, output and DSP state. Later
    /// commands fail with `Closed`. Safe to call more than once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.commands.bell.ring();

        if let Some(handle) = self.worker.lock().unwrap().take() {
            if handle.thread().id() == thread::current().id() {
                warn!("player closed from its own worker; not joining");
            } else if handle.join().is_err() {
                warn!("playback worker panicked");
            }
        }
        self.shared.events.close();
        info!("player closed");
    }

    fn ensure_open(&self) -> Result<(), PlayerError> {
        if self.is_closed() {
            return Err(PlayerError::Closed);
        }
        Ok(())
    }

    fn open_decoder(&self, path: &Path) -> Result<Box<dyn Decoder>, PlayerError> {
        self.registry.open_path(path).map_err(PlayerError::Decode)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.close();
    }
}

