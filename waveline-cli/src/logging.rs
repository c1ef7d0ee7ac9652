//! Log capture for the terminal UI.
//!
//! Records go to a bounded ring that the UI renders. Native stderr output
//! from audio backends (ALSA, CoreAudio) can be redirected into the same
//! ring, tagged with what the player was doing when it arrived.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;

const LOG_CAPACITY: usize = 500;

/// Recent log lines plus the playback context used to tag them.
#[derive(Clone, Default)]
pub struct LogSink {
    lines: Arc<Mutex<VecDeque<String>>>,
    context: Arc<Mutex<Option<String>>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set what the player is doing, e.g. `"song.flac 01:05"`. `None`
    /// clears it.
    pub fn set_context(&self, context: Option<String>) {
        *self.context.lock().unwrap() = context;
    }

    /// Append a line; `tagged` lines carry the current context.
    fn push(&self, source: &str, message: &str, tagged: bool) {
        let context = if tagged {
            self.context.lock().unwrap().clone()
        } else {
            None
        };
        let line = match context {
            Some(context) => format!("[{}] ({}) {}", source, context, message),
            None => format!("[{}] {}", source, message),
        };

        let mut lines = self.lines.lock().unwrap();
        if lines.len() >= LOG_CAPACITY {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Lines in arrival order, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().iter().cloned().collect()
    }
}

struct SharedLogger {
    level: LevelFilter,
    sink: LogSink,
    echo_stderr: bool,
}

fn parse_level(value: Option<&str>) -> LevelFilter {
    match value.map(str::to_lowercase).as_deref() {
        Some("off") => LevelFilter::Off,
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

impl Log for SharedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let message = record.args().to_string();
        if self.echo_stderr {
            eprintln!("[{}] {}", record.level(), message);
        }
        // Warnings and errors carry the playback context.
        let tagged = record.level() <= Level::Warn;
        self.sink.push(record.level().as_str(), &message, tagged);
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<SharedLogger> = OnceLock::new();

/// Install the process-wide logger. The level comes from `RUST_LOG`;
/// `WAVELINE_LOG_STDERR` (any value but `0`) also echoes lines to stderr.
pub fn init() -> LogSink {
    let level = parse_level(std::env::var("RUST_LOG").ok().as_deref());
    let echo_stderr = std::env::var("WAVELINE_LOG_STDERR")
        .map(|value| value != "0")
        .unwrap_or(false);

    let logger = LOGGER.get_or_init(|| SharedLogger {
        level,
        sink: LogSink::new(),
        echo_stderr,
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level);
    }

    logger.sink.clone()
}

/// Puts the original stderr back when dropped.
pub struct StderrCaptureGuard {
    original_fd: RawFd,
    stderr_fd: RawFd,
    reader_handle: Option<JoinHandle<()>>,
}

impl Drop for StderrCaptureGuard {
    fn drop(&mut self) {
        // Replacing the pipe end at `stderr_fd` hands the reader its EOF.
        unsafe {
            libc::dup2(self.original_fd, self.stderr_fd);
            libc::close(self.original_fd);
        }
        if let Some(handle) = self.reader_handle.take() {
            if handle.join().is_err() {
                log::warn!("stderr reader thread panicked");
            }
        }
    }
}

/// Redirect the process stderr into `sink` until the guard drops. Each
/// captured line is tagged with the sink's playback context.
pub fn capture_stderr(sink: LogSink) -> Option<StderrCaptureGuard> {
    let stderr_fd = std::io::stderr().as_raw_fd();
    let mut fds = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        log::warn!("stderr capture unavailable: pipe failed");
        return None;
    }

    let [read_fd, write_fd] = fds;
    let original_fd = unsafe { libc::dup(stderr_fd) };
    if original_fd < 0 {
        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
        return None;
    }

    if unsafe { libc::dup2(write_fd, stderr_fd) } < 0 {
        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
            libc::close(original_fd);
        }
        return None;
    }
    unsafe {
        libc::close(write_fd);
    }

    let handle = std::thread::spawn(move || {
        let file = unsafe { std::fs::File::from_raw_fd(read_fd) };
        for line in BufReader::new(file).lines() {
            let Ok(line) = line else {
                break;
            };
            let line = line.trim_end();
            if !line.is_empty() {
                sink.push("STDERR", line, true);
            }
        }
    });

    Some(StderrCaptureGuard {
        original_fd,
        stderr_fd,
        reader_handle: Some(handle),
    })
}
