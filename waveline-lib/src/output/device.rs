//! Default system device output backed by `rodio`.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};

use super::{samples_to_duration, AudioOutput, OutputError};
use crate::decoder::AudioFormat;
use crate::tools::timer::Timer;

pub const OPEN_RETRIES: u32 = 20;
pub const OPEN_RETRY_MS: u64 = 100;

/// Owns the `OutputStream` on its own thread (streams are not `Send` on
/// every platform) and hands the connected sink back to the caller.
struct DeviceThread {
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl DeviceThread {
    fn spawn() -> Result<(Self, Sink), OutputError> {
        let (sink_tx, sink_rx) = mpsc::sync_channel::<Result<Sink, OutputError>>(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("waveline-device".to_string())
            .spawn(move || {
                let mut stream = match open_stream_with_retry() {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = sink_tx.send(Err(err));
                        return;
                    }
                };
                stream.log_on_drop(false);
                let sink = Sink::connect_new(stream.mixer());
                sink.pause();
                if sink_tx.send(Ok(sink)).is_err() {
                    return;
                }
                // Keep the stream alive until the output closes.
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|err| OutputError::Device(err.to_string()))?;

        let sink = match sink_rx.recv() {
            Ok(Ok(sink)) => sink,
            Ok(Err(err)) => {
                let _ = handle.join();
                return Err(err);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(OutputError::Device("device thread exited".to_string()));
            }
        };

        Ok((
            Self {
                shutdown: shutdown_tx,
                handle,
            },
            sink,
        ))
    }

    fn shutdown(self) {
        let _ = self.shutdown.send(());
        if self.handle.join().is_err() {
            warn!("output device thread panicked");
        }
    }
}

fn open_stream_with_retry() -> Result<OutputStream, OutputError> {
    let mut last_err = None;
    for attempt in 1..=OPEN_RETRIES {
        match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                warn!(
                    "open_default_stream attempt {}/{} failed: {}",
                    attempt, OPEN_RETRIES, err
                );
                last_err = Some(err);
                if attempt < OPEN_RETRIES {
                    thread::sleep(Duration::from_millis(OPEN_RETRY_MS));
                }
            }
        }
    }
    error!(
        "failed to open default output stream after {} attempts",
        OPEN_RETRIES
    );
    Err(last_err
        .map(OutputError::from)
        .unwrap_or_else(|| OutputError::Device("no output device".to_string())))
}

/// Plays through the default output device.
///
/// Writes are split into `SamplesBuffer` chunks appended to a `rodio::Sink`.
/// The total queued audio is bounded by the configured buffer duration, and
/// position is the sum of chunks the sink has finished plus a pause-aware
/// clock running inside the chunk currently playing.
///
/// Every chunk carries its own rate and channel count and the rodio mixer
/// converts them, so a format change keeps the sink and whatever it still
/// has queued.
pub struct RodioOutput {
    buffer: Duration,
    device: Option<DeviceThread>,
    sink: Option<Sink>,
    format: Option<AudioFormat>,
    /// Lengths of chunks handed to the sink, oldest first.
    queued: VecDeque<Duration>,
    played: Duration,
    clock: Timer,
    volume: f32,
    paused: bool,
    closed: bool,
}

impl RodioOutput {
    pub fn new(buffer: Duration) -> Self {
        Self {
            buffer: buffer.max(Duration::from_millis(20)),
            device: None,
            sink: None,
            format: None,
            queued: VecDeque::new(),
            played: Duration::ZERO,
            clock: Timer::new(),
            volume: 1.0,
            paused: true,
            closed: false,
        }
    }

    fn sink(&self) -> Result<&Sink, OutputError> {
        if self.closed {
            return Err(OutputError::Closed);
        }
        self.sink.as_ref().ok_or(OutputError::NotOpen)
    }

    /// Retire chunks the sink has finished playing.
    fn reclaim(&mut self) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        let finished = self.queued.len().saturating_sub(sink.len());
        for _ in 0..finished {
            if let Some(length) = self.queued.pop_front() {
                self.played += length;
                self.clock.consume(length);
            }
        }
        if self.queued.is_empty() {
            self.clock.restart();
        }
    }

    fn queued_duration(&self) -> Duration {
        self.queued.iter().sum()
    }

    fn teardown(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        if let Some(device) = self.device.take() {
            device.shutdown();
        }
        self.queued.clear();
        self.played = Duration::ZERO;
        self.clock = Timer::new();
        self.format = None;
    }
}

impl AudioOutput for RodioOutput {
    fn open(&mut self, format: AudioFormat) -> Result<(), OutputError> {
        if self.closed {
            return Err(OutputError::Closed);
        }
        if self.sink.is_some() {
            if self.format != Some(format) {
                debug!(
                    "output now {} Hz, {} channels; {} chunks still queued",
                    format.sample_rate,
                    format.channels,
                    self.queued.len()
                );
                self.format = Some(format);
            }
            return Ok(());
        }

        let (device, sink) = DeviceThread::spawn()?;
        sink.set_volume(self.volume);
        info!(
            "output opened: {} Hz, {} channels, {} ms buffer",
            format.sample_rate,
            format.channels,
            self.buffer.as_millis()
        );
        self.device = Some(device);
        self.sink = Some(sink);
        self.format = Some(format);
        self.paused = true;
        Ok(())
    }

    fn write(&mut self, samples: &[f32]) -> Result<usize, OutputError> {
        self.sink()?;
        let format = self.format.ok_or(OutputError::NotOpen)?;
        self.reclaim();

        let channels = format.channels.max(1) as usize;
        let free = format.samples_for(self.buffer.saturating_sub(self.latency()));
        let accepted = free.min(samples.len()) / channels * channels;
        if accepted == 0 {
            return Ok(0);
        }

        let chunk = samples[..accepted].to_vec();
        self.sink()?
            .append(SamplesBuffer::new(format.channels, format.sample_rate, chunk));
        self.queued.push_back(samples_to_duration(&format, accepted));
        Ok(accepted)
    }

    fn pause(&mut self) -> Result<(), OutputError> {
        let sink = self.sink()?;
        sink.pause();
        self.clock.pause();
        self.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), OutputError> {
        let sink = self.sink()?;
        sink.play();
        self.clock.resume();
        self.paused = false;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        let sink = self.sink()?;
        // `clear` also pauses the sink.
        sink.clear();
        if !self.paused {
            sink.play();
        }
        debug!("output flushed {} queued chunks", self.queued.len());
        self.queued.clear();
        self.played = Duration::ZERO;
        self.clock.restart();
        Ok(())
    }

    fn close(&mut self) -> Result<(), OutputError> {
        if self.closed {
            return Ok(());
        }
        self.teardown();
        self.closed = true;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = self.sink.as_ref() {
            sink.set_volume(self.volume);
        }
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn latency(&self) -> Duration {
        self.queued_duration().saturating_sub(self.clock.elapsed())
    }

    fn position(&self) -> Duration {
        let in_chunk = match self.queued.front() {
            Some(front) => self.clock.elapsed().min(*front),
            None => Duration::ZERO,
        };
        self.played + in_chunk
    }

    fn format(&self) -> Option<AudioFormat> {
        self.format
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
