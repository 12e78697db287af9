use super::RegisterReader;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::trace;

/// Hit count per sampled instruction address
pub type RawSamples = HashMap<u64, u64>;

/// Everything the sampler thread collected, handed back by [`Sampler::stop`]
#[derive(Debug, Clone, Default)]
pub struct SamplerOutput {
    pub samples: RawSamples,
    /// Ticks that fired
    pub ticks: u64,
    /// Ticks whose register read failed
    pub skipped: u64,
}

impl SamplerOutput {
    fn record(&mut self, ip: Option<u64>) {
        self.ticks += 1;
        match ip {
            Some(ip) => *self.samples.entry(ip).or_insert(0) += 1,
            None => {
                self.skipped += 1;
                trace!(tick = self.ticks, "sample skipped");
            }
        }
    }

    /// Sum of all recorded hits
    pub fn total(&self) -> u64 {
        self.samples.values().sum()
    }
}

/// Periodic sampler driving a [`RegisterReader`] from a dedicated thread.
///
/// The sample table is owned by the sampler thread while it runs and is
/// returned through the join handle, so nobody can read it mid-update.
pub struct Sampler {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<SamplerOutput>>,
}

impl Sampler {
    /// Spawn the sampler thread; the first tick fires after one `interval`
    pub fn start<R: RegisterReader>(reader: R, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidArgument(
                "Sampling interval must be greater than zero".to_string(),
            ));
        }

        let stop_flag = Arc::new(AtomicBool::new(false));

        let handle = thread::Builder::new()
            .name("selfprof-sampler".into())
            .spawn({
                let stop_flag = stop_flag.clone();
                move || run(reader, interval, &stop_flag)
            })
            .map_err(|e| {
                Error::ResourceAcquisition(format!("Failed to spawn sampler thread: {}", e))
            })?;

        Ok(Sampler {
            stop_flag,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop ticking and wait for the sampler thread to exit.
    ///
    /// Returns `Ok(None)` if the sampler was already stopped.
    pub fn stop(&mut self) -> Result<Option<SamplerOutput>> {
        let Some(handle) = self.handle.take() else {
            return Ok(None);
        };

        self.stop_flag.store(true, Ordering::Release);
        handle.thread().unpark();

        handle
            .join()
            .map(Some)
            .map_err(|_| Error::Sampler("sampler thread panicked".to_string()))
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn run<R: RegisterReader>(
    mut reader: R,
    interval: Duration,
    stop_flag: &AtomicBool,
) -> SamplerOutput {
    let mut output = SamplerOutput::default();
    let mut next_tick = Instant::now() + interval;

    loop {
        let now = Instant::now();
        if now < next_tick {
            thread::park_timeout(next_tick - now);
        }

        if stop_flag.load(Ordering::Acquire) {
            break;
        }

        // Spurious unpark
        let now = Instant::now();
        if now < next_tick {
            continue;
        }

        // Fell behind: skip the missed ticks instead of bursting
        next_tick += interval;
        if next_tick <= now {
            next_tick = now + interval;
        }

        output.record(reader.read_ip());
    }

    output
}
