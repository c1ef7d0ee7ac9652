//! Output that records everything written to it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{samples_to_duration, AudioOutput, OutputError};
use crate::decoder::AudioFormat;
use crate::tools::timer::Timer;

#[derive(Debug, Default)]
struct Capture {
    samples: Vec<f32>,
    format: Option<AudioFormat>,
    opens: usize,
    flushes: usize,
    writes: usize,
    fail_remaining: usize,
    fail_always: bool,
    playing: bool,
    closed: bool,
}

/// Shared view of what a [`MemoryOutput`] has received.
///
/// Clones observe the same capture, so a test can keep a handle while the
/// output itself is moved into a player.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutputHandle {
    inner: Arc<Mutex<Capture>>,
}

impl MemoryOutputHandle {
    /// Samples accepted so far, with volume applied.
    pub fn samples(&self) -> Vec<f32> {
        self.inner.lock().unwrap().samples.clone()
    }

    pub fn sample_count(&self) -> usize {
        self.inner.lock().unwrap().samples.len()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().samples.clear();
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.inner.lock().unwrap().format
    }

    pub fn open_count(&self) -> usize {
        self.inner.lock().unwrap().opens
    }

    pub fn flush_count(&self) -> usize {
        self.inner.lock().unwrap().flushes
    }

    pub fn write_count(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().playing
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Make the next `count` writes fail with a device error.
    pub fn fail_next_writes(&self, count: usize) {
        self.inner.lock().unwrap().fail_remaining = count;
    }

    /// Make every write fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_always = fail;
    }
}

/// Real-time pacing: the output accepts only as much audio as a device of
/// `buffer` depth would have room for, with time running `speedup` times
/// faster than the wall clock.
#[derive(Debug)]
struct Pacing {
    buffer: Duration,
    speedup: f64,
    clock: Timer,
}

/// In-memory [`AudioOutput`] for tests and offline rendering.
#[derive(Debug)]
pub struct MemoryOutput {
    handle: MemoryOutputHandle,
    max_write: Option<usize>,
    pacing: Option<Pacing>,
    /// Audio accepted since the last flush. Kept across format changes, as
    /// a device keeps playing what it already queued.
    written: Duration,
    volume: f32,
    format: Option<AudioFormat>,
    closed: bool,
}

impl Default for MemoryOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOutput {
    /// An unpaced output that accepts everything immediately.
    pub fn new() -> Self {
        Self {
            handle: MemoryOutputHandle::default(),
            max_write: None,
            pacing: None,
            written: Duration::ZERO,
            volume: 1.0,
            format: None,
            closed: false,
        }
    }

    /// Accept at most `samples` per `write` call.
    pub fn with_max_write(mut self, samples: usize) -> Self {
        self.max_write = Some(samples.max(1));
        self
    }

    /// Behave like a device that drains in real time, `speedup` times faster
    /// than the wall clock, with `buffer` of queue depth.
    pub fn paced(mut self, buffer: Duration, speedup: f64) -> Self {
        self.pacing = Some(Pacing {
            buffer,
            speedup: if speedup > 0.0 { speedup } else { 1.0 },
            clock: Timer::new(),
        });
        self
    }

    pub fn handle(&self) -> MemoryOutputHandle {
        self.handle.clone()
    }

    fn check_open(&self) -> Result<AudioFormat, OutputError> {
        if self.closed {
            return Err(OutputError::Closed);
        }
        self.format.ok_or(OutputError::NotOpen)
    }

    fn played(&self) -> Duration {
        match &self.pacing {
            Some(pacing) => pacing
                .clock
                .elapsed()
                .mul_f64(pacing.speedup)
                .min(self.written),
            None => self.written,
        }
    }

    fn room(&self, format: &AudioFormat) -> usize {
        let Some(pacing) = &self.pacing else {
            return usize::MAX;
        };
        let horizon = self.played() + pacing.buffer;
        format.samples_for(horizon.saturating_sub(self.written))
    }
}

impl AudioOutput for MemoryOutput {
    fn open(&mut self, format: AudioFormat) -> Result<(), OutputError> {
        if self.closed {
            return Err(OutputError::Closed);
        }
        if self.format == Some(format) {
            return Ok(());
        }
        self.format = Some(format);
        let mut capture = self.handle.inner.lock().unwrap();
        capture.format = Some(format);
        capture.opens += 1;
        Ok(())
    }

    fn write(&mut self, samples: &[f32]) -> Result<usize, OutputError> {
        let format = self.check_open()?;
        {
            let mut capture = self.handle.inner.lock().unwrap();
            if capture.fail_always {
                return Err(OutputError::Device("injected write failure".to_string()));
            }
            if capture.fail_remaining > 0 {
                capture.fail_remaining -= 1;
                return Err(OutputError::Device("injected write failure".to_string()));
            }
        }

        let channels = format.channels.max(1) as usize;
        let limit = self
            .max_write
            .unwrap_or(usize::MAX)
            .min(self.room(&format))
            .min(samples.len());
        let accepted = if limit == samples.len() {
            limit
        } else {
            limit / channels * channels
        };
        if accepted == 0 {
            return Ok(0);
        }

        let volume = self.volume;
        let mut capture = self.handle.inner.lock().unwrap();
        capture
            .samples
            .extend(samples[..accepted].iter().map(|s| s * volume));
        capture.writes += 1;
        self.written += samples_to_duration(&format, accepted);
        Ok(accepted)
    }

    fn pause(&mut self) -> Result<(), OutputError> {
        self.check_open()?;
        if let Some(pacing) = &mut self.pacing {
            pacing.clock.pause();
        }
        self.handle.inner.lock().unwrap().playing = false;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), OutputError> {
        self.check_open()?;
        if let Some(pacing) = &mut self.pacing {
            pacing.clock.resume();
        }
        self.handle.inner.lock().unwrap().playing = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        self.check_open()?;
        self.written = Duration::ZERO;
        if let Some(pacing) = &mut self.pacing {
            pacing.clock.restart();
        }
        self.handle.inner.lock().unwrap().flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), OutputError> {
        self.closed = true;
        self.format = None;
        let mut capture = self.handle.inner.lock().unwrap();
        capture.closed = true;
        capture.playing = false;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn latency(&self) -> Duration {
        self.written.saturating_sub(self.played())
    }

    fn position(&self) -> Duration {
        self.played()
    }

    fn format(&self) -> Option<AudioFormat> {
        self.format
    }
}
