//! Transport and queue controls for `Player`.

use std::time::Duration;

use log::{debug, info, warn};

use crate::decoder::Decoder;

use super::events::PlayerEvent;
use super::prebuffer::Prebuffered;
use super::resample::{MAX_SPEED, MIN_SPEED};
use super::runtime::{NextTrack, Transport};
use super::{Player, PlayerError, PlayerState, Track};

impl Player {
    /// Make `track` current, replacing the previous track and any queued
    /// next track. The player ends up Stopped at position 0.
    ///
    /// Fails without changing state if the file cannot be opened.
    pub fn load(&self, track: Track) -> Result<(), PlayerError> {
        self.ensure_open()?;
        let decoder = self.open_decoder(&track.path)?;
        let format = decoder.format();
        let metadata = decoder.metadata().clone();
        let duration = decoder.duration();
        let duration_exact = decoder.length_is_exact();
        let mut track = track;
        track.duration = Some(duration);

        let mut events = {
            let mut slots = self.shared.slots.lock().unwrap();
            slots.close_current();
            slots.close_next();
            slots.current = Some(decoder);

            let mut status = self.shared.status.write().unwrap();
            let events: Vec<PlayerEvent> = status.transition(PlayerState::Stopped).into_iter().collect();
            status.position = Duration::ZERO;
            status.duration = duration;
            status.duration_exact = duration_exact;
            status.format = Some(format);
            status.metadata = Some(metadata.clone());
            status.current_track = Some(track.clone());
            status.next_track = None;
            self.shared.bump_generation();
            events
        };

        self.shared.chain.lock().unwrap().reset();
        self.shared.prepare_chain(&track, &metadata, format);

        self.shared.commands.seek.clear();
        self.shared.commands.post_discard();
        self.shared.commands.post_transport(Transport::Stop);

        info!(
            "loaded {} ({:.1}s, {} Hz, {} ch)",
            track.display_name(),
            duration.as_secs_f64(),
            format.sample_rate,
            format.channels
        );
        events.push(PlayerEvent::TrackChanged(track));
        self.shared.emit_all(events);
        Ok(())
    }

    /// Start or resume playback of the loaded track.
    pub fn play(&self) -> Result<(), PlayerError> {
        self.ensure_open()?;
        let (track, position) = {
            let status = self.shared.status.read().unwrap();
            match status.state {
                PlayerState::Playing => return Err(PlayerError::AlreadyPlaying),
                PlayerState::Error => return Err(PlayerError::InErrorState),
                _ => {}
            }
            let Some(track) = status.current_track.clone() else {
                return Err(PlayerError::NoTrackLoaded);
            };
            (track, status.position)
        };

        // A stop releases the decoder; reopen it where the position points.
        let needs_decoder = self.shared.slots.lock().unwrap().current.is_none();
        let reopened = if needs_decoder {
            let mut decoder = self.open_decoder(&track.path)?;
            if position > Duration::ZERO {
                if let Err(err) = decoder.seek(position) {
                    warn!("could not restore position {:.3}s: {}", position.as_secs_f64(), err);
                }
            }
            Some(decoder)
        } else {
            None
        };

        let event = {
            let mut slots = self.shared.slots.lock().unwrap();
            if let Some(mut decoder) = reopened {
                if slots.current.is_none() {
                    slots.current = Some(decoder);
                } else {
                    decoder.close();
                }
            }
            let mut status = self.shared.status.write().unwrap();
            if status.state == PlayerState::Playing {
                return Err(PlayerError::AlreadyPlaying);
            }
            status.transition(PlayerState::Playing)
        };

        self.shared.commands.post_transport(Transport::Play);
        info!("playing {}", track.display_name());
        self.shared.emit_all(event);
        Ok(())
    }

    /// Pause playback, fading out first when `fade_on_pause` is set.
    pub fn pause(&self) -> Result<(), PlayerError> {
        self.ensure_open()?;
        let event = {
            let mut status = self.shared.status.write().unwrap();
            if status.state != PlayerState::Playing {
                return Err(PlayerError::NotPlaying);
            }
            status.transition(PlayerState::Paused)
        };
        self.shared.commands.post_transport(Transport::Pause);
        info!("paused");
        self.shared.emit_all(event);
        Ok(())
    }

    /// Stop playback and release the decoders. The loaded track stays
    /// current, so `play` starts it again from the beginning.
    pub fn stop(&self) -> Result<(), PlayerError> {
        self.ensure_open()?;
        let event = {
            let mut slots = self.shared.slots.lock().unwrap();
            slots.close_current();
            slots.close_next();

            let mut status = self.shared.status.write().unwrap();
            status.next_track = None;
            status.position = Duration::ZERO;
            self.shared.bump_generation();
            if status.state == PlayerState::Error {
                None
            } else {
                status.transition(PlayerState::Stopped)
            }
        };

        self.shared.commands.seek.clear();
        self.shared.commands.post_discard();
        self.shared.commands.post_transport(Transport::Stop);
        if event.is_some() {
            info!("stopped");
        }
        self.shared.emit_all(event);
        Ok(())
    }

    /// Move to `position`, snapped to the nearest sample frame.
    ///
    /// Out-of-range targets fail with `InvalidSeek` before anything changes.
    /// The worker applies only the most recent request; a failing decoder
    /// seek is reported as an `Error` event.
    pub fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        self.ensure_open()?;
        let mut status = self.shared.status.write().unwrap();
        if status.current_track.is_none() {
            return Err(PlayerError::NoTrackLoaded);
        }
        if status.state == PlayerState::Error {
            return Err(PlayerError::InErrorState);
        }
        // Past an estimated end the worker's decoder seek has the last word.
        if status.duration_exact && position > status.duration {
            return Err(PlayerError::InvalidSeek {
                requested: position.as_secs_f64(),
                duration: status.duration,
            });
        }

        let target = match status.format {
            Some(format) => format.frames_to_duration(format.duration_to_frames(position)),
            None => position,
        };
        status.position = target;
        self.shared.bump_generation();
        drop(status);

        self.shared.commands.post_seek(target);
        debug!("seek requested to {:.3}s", target.as_secs_f64());
        Ok(())
    }

    /// [`Player::seek`] in seconds; negative and non-finite values are
    /// rejected.
    pub fn seek_seconds(&self, seconds: f64) -> Result<(), PlayerError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(PlayerError::InvalidSeek {
                requested: seconds,
                duration: self.duration(),
            });
        }
        self.seek(Duration::from_secs_f64(seconds))
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), PlayerError> {
        self.ensure_open()?;
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlayerError::InvalidVolume(volume));
        }
        self.shared.status.write().unwrap().volume = volume;
        self.shared.commands.post_volume(volume);
        self.shared.events.emit(PlayerEvent::VolumeChanged(volume));
        Ok(())
    }

    /// Set the playback rate. Pitch follows speed.
    pub fn set_speed(&self, speed: f32) -> Result<(), PlayerError> {
        self.ensure_open()?;
        if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            return Err(PlayerError::InvalidSpeed(speed));
        }
        self.shared.status.write().unwrap().speed = speed;
        self.shared.commands.post_speed(speed);
        Ok(())
    }

    /// Queue the track that follows the current one. With gapless enabled
    /// its first `prebuffer_ms` are decoded now, so the handoff needs no I/O.
    pub fn set_next_track(&self, track: Track) -> Result<(), PlayerError> {
        self.ensure_open()?;
        if self.shared.status.read().unwrap().current_track.is_none() {
            return Err(PlayerError::NoTrackLoaded);
        }

        let decoder = self.open_decoder(&track.path)?;
        let (gapless, prebuffer_ms) = {
            let settings = self.shared.settings.read().unwrap();
            (settings.gapless, settings.prebuffer_ms)
        };
        let decoder: Box<dyn Decoder> = if gapless {
            Box::new(
                Prebuffered::fill(decoder, Duration::from_millis(prebuffer_ms))
                    .map_err(PlayerError::Decode)?,
            )
        } else {
            decoder
        };

        let mut track = track;
        track.duration = Some(decoder.duration());
        {
            let mut slots = self.shared.slots.lock().unwrap();
            slots.close_next();
            slots.next = Some(NextTrack {
                track: track.clone(),
                decoder,
            });
            self.shared.status.write().unwrap().next_track = Some(track.clone());
        }
        info!("queued {}", track.display_name());
        Ok(())
    }

    pub fn clear_next_track(&self) -> Result<(), PlayerError> {
        self.ensure_open()?;
        let mut slots = self.shared.slots.lock().unwrap();
        slots.close_next();
        self.shared.status.write().unwrap().next_track = None;
        Ok(())
    }
}
