//! Playback worker loop implementation.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::decoder::{AudioFormat, DecodeStatus};
use crate::dsp::effects::Crossfader;
use crate::output::{AudioOutput, OutputError};
use crate::playback::player::events::PlayerEvent;
use crate::playback::player::resample::SpeedResampler;
use crate::playback::player::{PlayerConfig, PlayerState};

use super::super::{DecoderSlots, Transport};
use super::context::ThreadContext;
use super::guard::PlaybackThreadGuard;

const IDLE_WAIT: Duration = Duration::from_millis(10);
const BACKPRESSURE_WAIT: Duration = Duration::from_millis(2);
const FAILURE_BACKOFF: Duration = Duration::from_millis(10);
const FADE_STEP: Duration = Duration::from_millis(10);
/// Slack on top of the reported device latency when waiting for the tail
/// of a finished track to play out.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A crossfade in progress, counted in frames of the outgoing track.
struct CrossfadeRun {
    fader: Crossfader,
    total_frames: u64,
    done_frames: u64,
}

/// Per-run mutable state owned by the worker.
struct LoopState {
    output: Option<Box<dyn AudioOutput>>,
    resampler: SpeedResampler,
    decode_buf: Vec<f32>,
    next_buf: Vec<f32>,
    mixed: Vec<f32>,
    /// Processed audio not yet accepted by the output.
    pending: Vec<f32>,
    pending_offset: usize,
    pending_generation: u64,
    /// Decoder positions at the start and end of `pending`.
    pending_start: Duration,
    pending_position: Duration,
    crossfade: Option<CrossfadeRun>,
    drain_deadline: Option<Instant>,
    output_failures: u32,
    last_position_event: Instant,
}

impl LoopState {
    fn new(speed: f32) -> Self {
        Self {
            output: None,
            resampler: SpeedResampler::new(speed),
            decode_buf: Vec::new(),
            next_buf: Vec::new(),
            mixed: Vec::new(),
            pending: Vec::new(),
            pending_offset: 0,
            pending_generation: 0,
            pending_start: Duration::ZERO,
            pending_position: Duration::ZERO,
            crossfade: None,
            drain_deadline: None,
            output_failures: 0,
            last_position_event: Instant::now(),
        }
    }

    fn has_pending(&self) -> bool {
        self.pending_offset < self.pending.len()
    }

    fn clear_pending(&mut self) {
        self.pending.clear();
        self.pending_offset = 0;
    }

    /// Decoder position of the last sample handed to the output,
    /// interpolated inside a partly written block.
    fn written_position(&self) -> Duration {
        if self.pending.is_empty() {
            return self.pending_position;
        }
        let span = self.pending_position.saturating_sub(self.pending_start);
        let done = self.pending_offset as f64 / self.pending.len() as f64;
        self.pending_start + span.mul_f64(done.min(1.0))
    }
}

/// What a call to [`produce`] left behind.
enum Produced {
    /// `pending` holds a new block.
    Audio,
    /// Nothing to write yet; try again shortly.
    Waiting,
    /// Nothing was produced and the loop should go straight back around.
    Again,
    /// Playback is no longer running.
    Halted,
}

/// Run the playback worker until the player shuts down.
///
/// The loop drains the command mailboxes, then moves one block from the
/// current decoder through the resampler and DSP chain into the output.
/// While not playing it sleeps on the doorbell.
pub(in crate::playback::player::runtime) fn run_playback_thread(ctx: ThreadContext) {
    let _thread_guard = PlaybackThreadGuard::new(ctx.shared.worker_alive.clone());
    let speed = ctx.shared.status.read().unwrap().speed;
    let mut loop_state = LoopState::new(speed);
    debug!("playback worker started");

    while !ctx.shared.shutdown.load(Ordering::SeqCst) {
        // Read before the mailboxes: a command posted after this point
        // makes the block produced below stale.
        let generation = ctx.shared.generation();
        handle_commands(&ctx, &mut loop_state);

        let playing = ctx.shared.status.read().unwrap().state == PlayerState::Playing;
        if playing {
            step(&ctx, &mut loop_state, generation);
        } else {
            ctx.shared.commands.bell.wait(IDLE_WAIT);
        }
    }

    teardown(&ctx, &mut loop_state);
}

/// Apply every pending command. Discontinuities come first so a `Play`
/// posted after a load or seek starts from the new position.
fn handle_commands(ctx: &ThreadContext, loop_state: &mut LoopState) {
    let commands = &ctx.shared.commands;

    if let Some(volume) = commands.volume.take() {
        if let Some(output) = loop_state.output.as_mut() {
            output.set_volume(volume);
        }
    }
    if let Some(speed) = commands.speed.take() {
        loop_state.resampler.set_speed(speed);
        debug!("playback speed set to {:.2}", speed);
    }
    if commands.discard.take().is_some() {
        discard(ctx, loop_state);
    }
    if let Some(position) = commands.seek.take() {
        seek(ctx, loop_state, position);
    }
    if let Some(transport) = commands.transport.take() {
        match transport {
            Transport::Play => start_output(ctx, loop_state),
            Transport::Pause => pause_output(ctx, loop_state),
            Transport::Stop => {
                discard(ctx, loop_state);
                if let Some(output) = loop_state.output.as_mut() {
                    if let Err(err) = output.pause() {
                        warn!("failed to pause output on stop: {}", err);
                    }
                }
            }
        }
    }
}

/// Drop every sample queued after the last discontinuity.
fn discard(ctx: &ThreadContext, loop_state: &mut LoopState) {
    loop_state.clear_pending();
    loop_state.resampler.reset();
    loop_state.drain_deadline = None;
    cancel_crossfade(ctx, loop_state);
    if let Some(output) = loop_state.output.as_mut() {
        if let Err(err) = output.flush() {
            warn!("failed to flush output: {}", err);
        }
    }
}

/// Abandon a crossfade and rewind the incoming track so it starts clean
/// when it does take over.
fn cancel_crossfade(ctx: &ThreadContext, loop_state: &mut LoopState) {
    if loop_state.crossfade.take().is_none() {
        return;
    }
    let mut slots = ctx.shared.slots.lock().unwrap();
    if let Some(next) = slots.next.as_mut() {
        if let Err(err) = next.decoder.seek_sample(0) {
            warn!("failed to rewind next track after cancelled crossfade: {}", err);
        }
    }
}

fn seek(ctx: &ThreadContext, loop_state: &mut LoopState, position: Duration) {
    discard(ctx, loop_state);

    let result = {
        let mut slots = ctx.shared.slots.lock().unwrap();
        match slots.current.as_mut() {
            Some(decoder) => decoder.seek(position),
            None => Ok(()),
        }
    };
    match result {
        Ok(()) => debug!("seeked to {:.3}s", position.as_secs_f64()),
        Err(err) => {
            warn!("seek to {:.3}s failed: {}", position.as_secs_f64(), err);
            ctx.shared
                .events
                .emit(PlayerEvent::Error(format!("seek failed: {}", err)));
        }
    }
}

/// Make sure an output exists and is open for `format`.
fn ensure_output(
    ctx: &ThreadContext,
    loop_state: &mut LoopState,
    format: AudioFormat,
) -> Result<(), OutputError> {
    let output = match loop_state.output.as_mut() {
        Some(output) => output,
        None => loop_state.output.insert(ctx.output_factory.create()?),
    };
    let reopen = match output.format() {
        Some(current) => !same_layout(current, format),
        None => true,
    };
    if reopen {
        output.open(format)?;
        info!(
            "output opened at {} Hz, {} channels",
            format.sample_rate, format.channels
        );
    }
    Ok(())
}

/// Open (if needed) and resume the output at the current volume.
fn start_output(ctx: &ThreadContext, loop_state: &mut LoopState) {
    let (format, volume) = {
        let status = ctx.shared.status.read().unwrap();
        (status.format, status.volume)
    };
    let Some(format) = format else {
        return;
    };
    if let Err(err) = ensure_output(ctx, loop_state, format) {
        enter_error(ctx, loop_state, format!("failed to open output: {}", err));
        return;
    }
    if let Some(output) = loop_state.output.as_mut() {
        output.set_volume(volume);
        if let Err(err) = output.resume() {
            enter_error(ctx, loop_state, format!("failed to resume output: {}", err));
        }
    }
}

/// Fade to silence over the configured time, pause, then restore the
/// volume so the next resume starts at full level.
fn pause_output(ctx: &ThreadContext, loop_state: &mut LoopState) {
    let Some(output) = loop_state.output.as_mut() else {
        return;
    };
    let (fade_on_pause, fade_ms) = {
        let settings = ctx.shared.settings.read().unwrap();
        (settings.fade_on_pause, settings.fade_ms)
    };

    let volume = output.volume();
    if fade_on_pause && fade_ms > 0.0 {
        let steps = (fade_ms / FADE_STEP.as_millis() as f32).ceil().max(1.0) as u32;
        for step in 1..=steps {
            output.set_volume(volume * (1.0 - step as f32 / steps as f32));
            thread::sleep(FADE_STEP);
        }
    }
    if let Err(err) = output.pause() {
        warn!("failed to pause output: {}", err);
    }
    output.set_volume(volume);
}

/// One iteration while playing: produce a block if the last one is fully
/// written, push as much of it as the output accepts, then refresh the
/// reported position.
fn step(ctx: &ThreadContext, loop_state: &mut LoopState, generation: u64) {
    if !loop_state.has_pending() {
        loop_state.clear_pending();
        match produce(ctx, loop_state, generation) {
            Produced::Audio => {}
            Produced::Again | Produced::Halted => return,
            Produced::Waiting => {
                publish_position(ctx, loop_state);
                ctx.shared.commands.bell.wait(BACKPRESSURE_WAIT);
                return;
            }
        }
    }
    write_pending(ctx, loop_state);
    publish_position(ctx, loop_state);
}

/// Decode, crossfade, resample and process the next block into `pending`.
fn produce(ctx: &ThreadContext, loop_state: &mut LoopState, generation: u64) -> Produced {
    let settings = ctx.shared.settings.read().unwrap().clone();

    let mut slots = ctx.shared.slots.lock().unwrap();
    {
        let status = ctx.shared.status.read().unwrap();
        if status.state != PlayerState::Playing {
            return Produced::Halted;
        }
        loop_state.resampler.set_speed(status.speed);
    }

    let DecoderSlots { current, next } = &mut *slots;
    let Some(current) = current.as_mut() else {
        drop(slots);
        warn!("playing with no open decoder");
        finish_track(ctx, loop_state);
        return Produced::Halted;
    };

    let format = current.format();
    let channels = format.channels.max(1) as usize;
    let want = settings.buffer_size * channels;
    let block_start = current.position();
    loop_state.decode_buf.resize(want, 0.0);

    let decoded = match current.decode(&mut loop_state.decode_buf[..want]) {
        Ok(DecodeStatus::Decoded(count)) => count,
        Ok(DecodeStatus::EndOfStream) => 0,
        Err(err) => {
            drop(slots);
            enter_error(ctx, loop_state, format!("decode failed: {}", err));
            return Produced::Halted;
        }
    };

    if decoded == 0 {
        refresh_duration(ctx, current.duration(), current.length_is_exact());
        if next.is_some() {
            swap_to_next(ctx, loop_state, slots);
            return Produced::Again;
        }
        drop(slots);
        return drain_or_finish(ctx, loop_state);
    }
    loop_state.drain_deadline = None;

    let block_frames = (decoded / channels) as u64;
    let fade_frames = crossfade_frames(&settings, format);
    let remaining = current.sample_count().saturating_sub(current.current_sample());

    let mut next_failed = None;
    let mut mixed = false;
    if let Some(incoming) = next.as_mut() {
        if loop_state.crossfade.is_none()
            && fade_frames > 0
            && current.length_is_exact()
            && same_layout(incoming.decoder.format(), format)
            && remaining + block_frames <= fade_frames
        {
            debug!(
                "crossfading into {} over {} frames",
                incoming.track.display_name(),
                remaining + block_frames
            );
            loop_state.crossfade = Some(CrossfadeRun {
                fader: Crossfader::new(settings.crossfade_curve),
                total_frames: (remaining + block_frames).max(1),
                done_frames: 0,
            });
        }

        if let Some(run) = loop_state.crossfade.as_mut() {
            loop_state.next_buf.clear();
            loop_state.next_buf.resize(decoded, 0.0);
            match incoming.decoder.decode(&mut loop_state.next_buf) {
                Ok(_) => {
                    let start = run.done_frames as f64 / run.total_frames as f64;
                    run.done_frames += block_frames;
                    let end = run.done_frames as f64 / run.total_frames as f64;
                    loop_state.mixed.resize(decoded, 0.0);
                    run.fader.mix_ramp(
                        &loop_state.decode_buf[..decoded],
                        &loop_state.next_buf,
                        &mut loop_state.mixed,
                        channels,
                        start,
                        end.min(1.0),
                    );
                    mixed = true;
                }
                Err(err) => next_failed = Some(err),
            }
        }
    }

    if let Some(err) = next_failed {
        warn!("dropping next track after decode failure: {}", err);
        loop_state.crossfade = None;
        slots.close_next();
        ctx.shared.status.write().unwrap().next_track = None;
        ctx.shared
            .events
            .emit(PlayerEvent::Error(format!("next track failed: {}", err)));
    }

    let position = slots
        .current
        .as_ref()
        .map(|decoder| decoder.position())
        .unwrap_or_default();
    drop(slots);

    let block = if mixed {
        &loop_state.mixed[..decoded]
    } else {
        &loop_state.decode_buf[..decoded]
    };
    loop_state
        .resampler
        .process(block, channels, &mut loop_state.pending);
    ctx.shared
        .chain
        .lock()
        .unwrap()
        .process(&mut loop_state.pending);

    loop_state.pending_offset = 0;
    loop_state.pending_generation = generation;
    loop_state.pending_start = block_start;
    loop_state.pending_position = position;
    Produced::Audio
}

/// Publish the length a decoder settled on once it reached the end.
fn refresh_duration(ctx: &ThreadContext, duration: Duration, exact: bool) {
    let mut status = ctx.shared.status.write().unwrap();
    if status.duration == duration && status.duration_exact == exact {
        return;
    }
    debug!(
        "track length corrected from {:.3}s to {:.3}s",
        status.duration.as_secs_f64(),
        duration.as_secs_f64()
    );
    status.duration = duration;
    status.duration_exact = exact;
    if let Some(track) = status.current_track.as_mut() {
        track.duration = Some(duration);
    }
}

fn crossfade_frames(settings: &PlayerConfig, format: AudioFormat) -> u64 {
    if settings.crossfade_ms <= 0.0 {
        return 0;
    }
    format.duration_to_frames(Duration::from_secs_f32(settings.crossfade_ms / 1_000.0))
}

/// Install the queued next track as current. Runs with `slots` held and
/// releases it before touching the chain or the output.
fn swap_to_next(
    ctx: &ThreadContext,
    loop_state: &mut LoopState,
    mut slots: std::sync::MutexGuard<'_, DecoderSlots>,
) {
    let Some(next) = slots.next.take() else {
        return;
    };
    slots.close_current();

    let format = next.decoder.format();
    let metadata = next.decoder.metadata().clone();
    let duration = next.decoder.duration();
    let duration_exact = next.decoder.length_is_exact();
    let position = next.decoder.position();
    let mut track = next.track;
    track.duration.get_or_insert(duration);
    slots.current = Some(next.decoder);

    {
        let mut status = ctx.shared.status.write().unwrap();
        status.current_track = Some(track.clone());
        status.next_track = None;
        status.duration = duration;
        status.duration_exact = duration_exact;
        status.position = position;
        status.format = Some(format);
        status.metadata = Some(metadata.clone());
    }
    ctx.shared.bump_generation();
    drop(slots);

    loop_state.crossfade = None;
    loop_state.resampler.reset();
    ctx.shared.prepare_chain(&track, &metadata, format);

    let reopen = loop_state
        .output
        .as_ref()
        .and_then(|output| output.format())
        .map_or(true, |current| !same_layout(current, format));
    if reopen {
        start_output(ctx, loop_state);
    }

    info!("gapless transition to {}", track.display_name());
    ctx.shared.events.emit(PlayerEvent::TrackChanged(track));
}

/// The current track is exhausted with nothing queued. Wait for the output
/// to play its tail, then finish.
fn drain_or_finish(ctx: &ThreadContext, loop_state: &mut LoopState) -> Produced {
    let latency = loop_state
        .output
        .as_ref()
        .map(|output| output.latency())
        .unwrap_or_default();
    let deadline = *loop_state
        .drain_deadline
        .get_or_insert_with(|| Instant::now() + latency + DRAIN_GRACE);

    if latency > Duration::ZERO && Instant::now() < deadline {
        return Produced::Waiting;
    }
    finish_track(ctx, loop_state);
    Produced::Halted
}

/// Rewind the finished track and stop, announcing `TrackFinished` before
/// the state change.
fn finish_track(ctx: &ThreadContext, loop_state: &mut LoopState) {
    loop_state.drain_deadline = None;
    let mut events = Vec::new();
    {
        let mut slots = ctx.shared.slots.lock().unwrap();
        if let Some(Err(err)) = slots.current.as_mut().map(|d| d.seek(Duration::ZERO)) {
            warn!("failed to rewind finished track: {}", err);
            slots.close_current();
        }

        let mut status = ctx.shared.status.write().unwrap();
        if status.state != PlayerState::Playing {
            return;
        }
        status.position = Duration::ZERO;
        if let Some(track) = status.current_track.clone() {
            info!("finished {}", track.display_name());
            events.push(PlayerEvent::TrackFinished(track));
        }
        events.extend(status.transition(PlayerState::Stopped));
        ctx.shared.bump_generation();
    }

    if let Some(output) = loop_state.output.as_mut() {
        if let Err(err) = output.pause() {
            warn!("failed to pause output after track end: {}", err);
        }
    }
    ctx.shared.emit_all(events);
}

/// Push the unwritten part of `pending` to the output.
fn write_pending(ctx: &ThreadContext, loop_state: &mut LoopState) {
    if ctx.shared.generation() != loop_state.pending_generation {
        loop_state.clear_pending();
        return;
    }
    if loop_state.output.is_none() {
        start_output(ctx, loop_state);
    }
    let Some(output) = loop_state.output.as_mut() else {
        return;
    };

    match output.write(&loop_state.pending[loop_state.pending_offset..]) {
        Ok(0) => {
            ctx.shared.commands.bell.wait(BACKPRESSURE_WAIT);
            return;
        }
        Ok(written) => {
            loop_state.pending_offset += written;
            loop_state.output_failures = 0;
        }
        Err(err) => {
            loop_state.output_failures += 1;
            let limit = ctx.shared.settings.read().unwrap().max_output_failures;
            warn!(
                "output write failed ({}/{}): {}",
                loop_state.output_failures, limit, err
            );
            if loop_state.output_failures >= limit {
                enter_error(ctx, loop_state, format!("output failed: {}", err));
            } else {
                thread::sleep(FAILURE_BACKOFF);
            }
            return;
        }
    }
}

/// Record the audible position: what has reached the output, less what is
/// still queued there. Events go out at most once per interval.
fn publish_position(ctx: &ThreadContext, loop_state: &mut LoopState) {
    let (latency, interval) = {
        let latency = loop_state
            .output
            .as_ref()
            .map(|output| output.latency())
            .unwrap_or_default();
        let interval = ctx.shared.settings.read().unwrap().position_interval_ms;
        (latency, Duration::from_millis(interval))
    };
    let heard = loop_state
        .written_position()
        .saturating_sub(latency.mul_f32(loop_state.resampler.speed()));

    let position = {
        let mut status = ctx.shared.status.write().unwrap();
        if ctx.shared.generation() != loop_state.pending_generation
            || status.state != PlayerState::Playing
        {
            return;
        }
        status.position = status.position.max(heard);
        status.position
    };

    if loop_state.last_position_event.elapsed() >= interval {
        loop_state.last_position_event = Instant::now();
        ctx.shared.events.emit(PlayerEvent::PositionChanged(position));
    }
}

/// Stop producing audio and publish the failure.
fn enter_error(ctx: &ThreadContext, loop_state: &mut LoopState, message: String) {
    error!("{}", message);
    loop_state.clear_pending();
    loop_state.crossfade = None;
    loop_state.output_failures = 0;
    if let Some(output) = loop_state.output.as_mut() {
        if let Err(err) = output.pause() {
            warn!("failed to pause output after error: {}", err);
        }
        if let Err(err) = output.flush() {
            warn!("failed to flush output after error: {}", err);
        }
    }

    let changed = ctx
        .shared
        .status
        .write()
        .unwrap()
        .transition(PlayerState::Error);
    ctx.shared.bump_generation();
    ctx.shared
        .emit_all(changed.into_iter().chain([PlayerEvent::Error(message)]));
}

fn teardown(ctx: &ThreadContext, loop_state: &mut LoopState) {
    if let Some(mut output) = loop_state.output.take() {
        if let Err(err) = output.close() {
            warn!("failed to close output: {}", err);
        }
    }
    {
        let mut slots = ctx.shared.slots.lock().unwrap();
        slots.close_current();
        slots.close_next();
    }
    ctx.shared.chain.lock().unwrap().reset();
    debug!("playback worker stopped");
}

fn same_layout(a: AudioFormat, b: AudioFormat) -> bool {
    a.sample_rate == b.sample_rate && a.channels == b.channels
}
