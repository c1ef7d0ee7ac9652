//! State shared between the `Player` handle and its worker thread.
//!
//! - [`mailbox`] carries commands to the worker, one slot per kind.
//! - [`thread`] spawns the worker.
//! - [`worker`] runs decode, DSP and output.
//!
//! Lock order is `slots` before `status`; `chain` is never held together
//! with either.

mod mailbox;
mod thread;
mod worker;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::decoder::{AudioFormat, Decoder, Metadata};
use crate::dsp::effects::{EffectChain, EffectContext, ReplayGain};

use super::events::{EventBus, PlayerEvent};
use super::{PlayerConfig, PlayerState, Track};

pub(crate) use mailbox::{Doorbell, Mailbox};
pub(crate) use thread::spawn_worker;

/// Transport request for the worker; the caller has already updated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transport {
    Play,
    Pause,
    Stop,
}

/// Pending commands, one mailbox per kind.
#[derive(Debug, Default)]
pub(crate) struct Commands {
    pub(crate) transport: Mailbox<Transport>,
    pub(crate) seek: Mailbox<Duration>,
    /// Queued audio belongs to a track state that no longer exists.
    pub(crate) discard: Mailbox<()>,
    pub(crate) speed: Mailbox<f32>,
    pub(crate) volume: Mailbox<f32>,
    pub(crate) bell: Doorbell,
}

impl Commands {
    pub(crate) fn post_transport(&self, transport: Transport) {
        self.transport.post(transport);
        self.bell.ring();
    }

    pub(crate) fn post_seek(&self, position: Duration) {
        self.seek.post(position);
        self.bell.ring();
    }

    pub(crate) fn post_discard(&self) {
        self.discard.post(());
        self.bell.ring();
    }

    pub(crate) fn post_speed(&self, speed: f32) {
        self.speed.post(speed);
        self.bell.ring();
    }

    pub(crate) fn post_volume(&self, volume: f32) {
        self.volume.post(volume);
        self.bell.ring();
    }
}

/// Fields readers poll, behind one `RwLock`.
#[derive(Debug, Clone)]
pub(crate) struct Status {
    pub(crate) state: PlayerState,
    pub(crate) position: Duration,
    pub(crate) duration: Duration,
    /// False while `duration` is an estimate.
    pub(crate) duration_exact: bool,
    pub(crate) volume: f32,
    pub(crate) speed: f32,
    pub(crate) current_track: Option<Track>,
    pub(crate) next_track: Option<Track>,
    pub(crate) format: Option<AudioFormat>,
    pub(crate) metadata: Option<Metadata>,
}

impl Status {
    pub(crate) fn new(volume: f32) -> Self {
        Self {
            state: PlayerState::Stopped,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            duration_exact: true,
            volume,
            speed: 1.0,
            current_track: None,
            next_track: None,
            format: None,
            metadata: None,
        }
    }

    /// Change state, returning the event to publish if it actually changed.
    pub(crate) fn transition(&mut self, state: PlayerState) -> Option<PlayerEvent> {
        if self.state == state {
            return None;
        }
        self.state = state;
        Some(PlayerEvent::StateChanged(state))
    }
}

/// The queued-up following track.
pub(crate) struct NextTrack {
    pub(crate) track: Track,
    pub(crate) decoder: Box<dyn Decoder>,
}

/// Decoders in use, behind one `Mutex`.
#[derive(Default)]
pub(crate) struct DecoderSlots {
    pub(crate) current: Option<Box<dyn Decoder>>,
    pub(crate) next: Option<NextTrack>,
}

impl DecoderSlots {
    pub(crate) fn close_current(&mut self) {
        if let Some(mut decoder) = self.current.take() {
            decoder.close();
        }
    }

    pub(crate) fn close_next(&mut self) {
        if let Some(mut next) = self.next.take() {
            next.decoder.close();
        }
    }
}

pub(crate) struct Shared {
    pub(crate) status: RwLock<Status>,
    pub(crate) slots: Mutex<DecoderSlots>,
    pub(crate) chain: Mutex<EffectChain>,
    pub(crate) settings: RwLock<PlayerConfig>,
    pub(crate) commands: Commands,
    pub(crate) events: EventBus,
    /// Bumped on every discontinuity (load, stop, seek) so the worker can
    /// discard audio and positions computed before it.
    pub(crate) generation: AtomicU64,
    pub(crate) shutdown: AtomicBool,
    pub(crate) worker_alive: Arc<AtomicBool>,
}

impl Shared {
    pub(crate) fn new(config: PlayerConfig, chain: EffectChain) -> Self {
        Self {
            status: RwLock::new(Status::new(config.initial_volume)),
            slots: Mutex::new(DecoderSlots::default()),
            chain: Mutex::new(chain),
            events: EventBus::new(config.event_queue_capacity),
            settings: RwLock::new(config),
            commands: Commands::default(),
            generation: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            worker_alive: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Point the DSP chain at a newly current track: its format and its
    /// loudness values. Tags on the `Track` win over tags in the file.
    pub(crate) fn prepare_chain(&self, track: &Track, metadata: &Metadata, format: AudioFormat) {
        let info = track.replay_gain.unwrap_or(metadata.replay_gain);
        let mut chain = self.chain.lock().unwrap();
        chain.configure(&EffectContext::new(
            format.sample_rate,
            format.channels as usize,
        ));
        if let Some(replay_gain) = chain.get_mut::<ReplayGain>() {
            replay_gain.apply_info(&info);
        }
    }

    pub(crate) fn emit_all(&self, events: impl IntoIterator<Item = PlayerEvent>) {
        for event in events {
            self.events.emit(event);
        }
    }
}
