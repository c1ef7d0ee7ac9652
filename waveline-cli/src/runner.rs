use std::{
    io,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::sleep,
    time::Duration,
};

use clap::ArgMatches;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info};
use ratatui::{backend::CrosstermBackend, Terminal};
use waveline_lib::decoder::DecoderRegistry;
use waveline_lib::dsp::effects::Equalizer;
use waveline_lib::playback::{Player, PlayerEvent, PlayerState, Track};

use crate::{
    cli,
    config::CliConfig,
    controls,
    error::{CliError, Result},
    logging::{self, LogSink},
    playlist::Playlist,
    ui,
};

const TICK: Duration = Duration::from_millis(50);

pub fn run(args: &ArgMatches, log_sink: LogSink) -> Result<i32> {
    match args.subcommand() {
        Some(("play", play)) => run_play(play, log_sink),
        Some(("probe", probe)) => {
            let path = required::<PathBuf>(probe, "FILE")?;
            cli::info::run_probe(&DecoderRegistry::with_defaults(), path)
        }
        Some(("presets", _)) => cli::info::run_presets(),
        Some(("formats", _)) => cli::info::run_formats(&DecoderRegistry::with_defaults()),
        _ => Err(CliError::Usage("no command given".to_string())),
    }
}

fn required<'a, T: Clone + Send + Sync + 'static>(
    args: &'a ArgMatches,
    name: &str,
) -> Result<&'a T> {
    args.get_one::<T>(name)
        .ok_or_else(|| CliError::Usage(format!("missing <{}>", name)))
}

fn run_play(args: &ArgMatches, log_sink: LogSink) -> Result<i32> {
    let files: Vec<PathBuf> = args
        .get_many::<PathBuf>("FILES")
        .map(|files| files.cloned().collect())
        .unwrap_or_default();
    if files.is_empty() {
        return Err(CliError::Usage("no files to play".to_string()));
    }
    let quiet = args.get_flag("quiet");
    let (config, overrides) = CliConfig::resolve(args)?;

    info!("starting playback of {} file(s)", files.len());
    let player = Player::with_default_output(config.player.clone())?;
    player.with_effects(|chain| config.dsp.apply(chain))?;
    if let Some(speed) = overrides.speed {
        player.set_speed(speed)?;
    }

    let finished = Arc::new(AtomicBool::new(false));
    let finished_flag = finished.clone();
    player.subscribe(move |event| match event {
        PlayerEvent::TrackFinished(track) => {
            info!("finished {}", track.display_name());
            finished_flag.store(true, Ordering::SeqCst);
        }
        PlayerEvent::TrackChanged(track) => info!("now playing {}", track.display_name()),
        PlayerEvent::Error(message) => error!("playback error: {}", message),
        _ => {}
    });

    let mut playlist = Playlist::new(files);
    let first = playlist
        .current()
        .map(|path| path.to_path_buf())
        .ok_or_else(|| CliError::Usage("no files to play".to_string()))?;
    player.load(Track::new(first))?;
    controls::queue_following(&player, &mut playlist);
    player.play()?;

    let mut session = if quiet {
        None
    } else {
        Some(TerminalSession::start(log_sink.clone()))
    };

    let code = loop {
        if let Some(track) = player.current_track() {
            if playlist.sync(&track.path) {
                controls::queue_following(&player, &mut playlist);
            }
            log_sink.set_context(Some(format!(
                "{} {}",
                track.display_name(),
                controls::format_time(player.position())
            )));
        }

        match player.state() {
            PlayerState::Error => break 1,
            PlayerState::Stopped if finished.load(Ordering::SeqCst) => break 0,
            _ => {}
        }

        if let Some(session) = session.as_mut() {
            session.draw(&player, &playlist, &log_sink);
            if !controls::handle_key_event(&player, &mut playlist) {
                break 0;
            }
        }

        sleep(TICK);
    };

    player.close();
    log_sink.set_context(None);
    if let Some(session) = session.take() {
        session.finish();
    }
    if code != 0 {
        error!("playback stopped after an error");
    }
    Ok(code)
}

/// Alternate screen, raw mode and stderr capture for the duration of a
/// `play` session.
struct TerminalSession {
    terminal: Option<Terminal<CrosstermBackend<io::Stdout>>>,
    _raw_mode: Option<RawModeGuard>,
    _stderr: Option<logging::StderrCaptureGuard>,
}

impl TerminalSession {
    fn start(log_sink: LogSink) -> Self {
        let raw_mode = RawModeGuard::enable().ok();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, EnterAlternateScreen, cursor::Hide);
        let terminal = Terminal::new(CrosstermBackend::new(stdout)).ok();
        Self {
            terminal,
            _raw_mode: raw_mode,
            _stderr: logging::capture_stderr(log_sink),
        }
    }

    fn draw(&mut self, player: &Player, playlist: &Playlist, log_sink: &LogSink) {
        let Some(terminal) = self.terminal.as_mut() else {
            return;
        };
        let track = player.current_track().map(|track| track.display_name());
        let preset = player.with_effects(|chain| {
            chain
                .get_mut::<Equalizer>()
                .and_then(|eq| eq.current_preset().map(str::to_string))
        });
        let status = controls::status_text(controls::StatusArgs {
            state: player.state(),
            track: track.as_deref(),
            index: playlist.position(),
            position: player.position(),
            duration: player.duration(),
            volume: player.volume(),
            speed: player.speed(),
            preset: preset.as_deref(),
        });
        let log_lines = log_sink.lines();
        ui::draw_status(terminal, &status, &log_lines);
    }

    fn finish(mut self) {
        if let Some(mut terminal) = self.terminal.take() {
            let _ = terminal.show_cursor();
            let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show);
        }
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
