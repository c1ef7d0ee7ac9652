use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use log::{info, warn};
use waveline_lib::dsp::effects::equalizer::preset_names;
use waveline_lib::dsp::effects::Equalizer;
use waveline_lib::playback::player::{MAX_SPEED, MIN_SPEED};
use waveline_lib::playback::{Player, PlayerError, PlayerState, Track};

use crate::playlist::Playlist;

const SEEK_STEP: Duration = Duration::from_secs(5);
const VOLUME_STEP: f32 = 0.05;
const SPEED_STEP: f32 = 0.1;

pub struct StatusSnapshot {
    pub text: String,
}

pub struct StatusArgs<'a> {
    pub state: PlayerState,
    pub track: Option<&'a str>,
    pub index: (usize, usize),
    pub position: Duration,
    pub duration: Duration,
    pub volume: f32,
    pub speed: f32,
    pub preset: Option<&'a str>,
}

pub fn status_text(args: StatusArgs) -> StatusSnapshot {
    let state = match args.state {
        PlayerState::Playing => "▶ Playing",
        PlayerState::Paused => "⏸ Paused",
        PlayerState::Stopped => "■ Stopped",
        PlayerState::Buffering => "… Buffering",
        PlayerState::Error => "✖ Error",
    };
    let duration = args.duration.as_secs_f64();
    let percent = if duration > 0.0 {
        (args.position.as_secs_f64() / duration * 100.0).min(100.0)
    } else {
        0.0
    };
    let text = format!(
        "{}   {} / {}   ({:>5.1}%)\nTrack {}/{}: {}\nVolume: {:>3.0}% | speed: {:.2}x | EQ: {}",
        state,
        format_time(args.position),
        format_time(args.duration),
        percent,
        args.index.0,
        args.index.1,
        args.track.unwrap_or("-"),
        args.volume * 100.0,
        args.speed,
        args.preset.unwrap_or("custom"),
    );

    StatusSnapshot { text }
}

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    TogglePause,
    SeekBack,
    SeekForward,
    VolumeUp,
    VolumeDown,
    SlowDown,
    SpeedUp,
    CyclePreset,
    NextTrack,
    Quit,
}

pub fn action_for(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Char(' ') => Some(Action::TogglePause),
        KeyCode::Left => Some(Action::SeekBack),
        KeyCode::Right => Some(Action::SeekForward),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::VolumeUp),
        KeyCode::Char('-') => Some(Action::VolumeDown),
        KeyCode::Char('[') => Some(Action::SlowDown),
        KeyCode::Char(']') => Some(Action::SpeedUp),
        KeyCode::Char('e') | KeyCode::Char('E') => Some(Action::CyclePreset),
        KeyCode::Char('n') | KeyCode::Char('N') => Some(Action::NextTrack),
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        _ => None,
    }
}

/// Poll for one key press and act on it. Returns false when the user quits.
pub fn handle_key_event(player: &Player, playlist: &mut Playlist) -> bool {
    if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
        return true;
    }
    let Ok(Event::Key(key)) = event::read() else {
        return true;
    };
    if key.kind != KeyEventKind::Press {
        return true;
    }
    match action_for(key.code) {
        Some(action) => apply(action, player, playlist),
        None => true,
    }
}

pub fn apply(action: Action, player: &Player, playlist: &mut Playlist) -> bool {
    let result = match action {
        Action::Quit => {
            if let Err(err) = player.stop() {
                warn!("stop on quit failed: {}", err);
            }
            return false;
        }
        Action::TogglePause => {
            if player.is_playing() {
                player.pause()
            } else {
                player.play()
            }
        }
        Action::SeekBack => player.seek(player.position().saturating_sub(SEEK_STEP)),
        Action::SeekForward => player.seek((player.position() + SEEK_STEP).min(player.duration())),
        Action::VolumeUp => player.set_volume((player.volume() + VOLUME_STEP).min(1.0)),
        Action::VolumeDown => player.set_volume((player.volume() - VOLUME_STEP).max(0.0)),
        Action::SlowDown => player.set_speed((player.speed() - SPEED_STEP).max(MIN_SPEED)),
        Action::SpeedUp => player.set_speed((player.speed() + SPEED_STEP).min(MAX_SPEED)),
        Action::CyclePreset => {
            let name = player.with_effects(|chain| {
                let eq = chain.get_mut::<Equalizer>()?;
                let name = next_preset(eq.current_preset());
                eq.load_preset(name).ok().map(|_| name)
            });
            if let Some(name) = name {
                info!("equalizer preset: {}", name);
            }
            Ok(())
        }
        Action::NextTrack => skip_to_next(player, playlist),
    };
    if let Err(err) = result {
        warn!("{:?} failed: {}", action, err);
    }
    true
}

/// Jump to the following file right away.
fn skip_to_next(player: &Player, playlist: &mut Playlist) -> Result<(), PlayerError> {
    let Some(path) = playlist.advance().map(|path| path.to_path_buf()) else {
        info!("already at the last track");
        return Ok(());
    };
    player.load(Track::new(path))?;
    queue_following(player, playlist);
    player.play()
}

/// Hand the player the file after the current one, dropping any that fail
/// to open.
pub fn queue_following(player: &Player, playlist: &mut Playlist) {
    while let Some(path) = playlist.following().map(|path| path.to_path_buf()) {
        match player.set_next_track(Track::new(&path)) {
            Ok(()) => return,
            Err(err) => {
                warn!("skipping {}: {}", path.display(), err);
                playlist.drop_following();
            }
        }
    }
}

pub fn next_preset(current: Option<&str>) -> &'static str {
    let names = preset_names();
    let index = current
        .and_then(|name| names.iter().position(|preset| *preset == name))
        .map_or(0, |i| (i + 1) % names.len());
    names[index]
}

pub fn format_time(time: Duration) -> String {
    let seconds = time.as_secs();
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    let hours = minutes / 60;
    let minutes = minutes % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
