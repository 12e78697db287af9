use crate::aggregate::aggregate;
use crate::config::ProfilerConfig;
use crate::cpu::{RegisterReader, Sampler, SamplerOutput, SignalReader};
use crate::error::{Error, Result};
use crate::report::Report;
use crate::symbols::{ProcessSymbols, Symbolizer};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info};

/// Set while a session exists in this process
static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Ownership of the process-wide session slot
struct ActiveGuard;

impl ActiveGuard {
    fn acquire() -> Result<Self> {
        ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ActiveGuard)
            .map_err(|_| Error::SessionActive)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE.store(false, Ordering::Release);
    }
}

/// A profiling session of the calling thread.
///
/// Sampling begins in [`Profiler::start`]. The report is written by
/// [`Profiler::stop`], or on drop if the session was never stopped
/// explicitly. Only one session may exist per process at a time.
pub struct Profiler {
    config: ProfilerConfig,
    symbolizer: Box<dyn Symbolizer>,
    sampler: Option<Sampler>,
    guard: Option<ActiveGuard>,
    /// Bound to the observed thread
    _marker: PhantomData<*const ()>,
}

impl Profiler {
    /// Profile the calling thread, resolving symbols of the running process
    pub fn start(config: ProfilerConfig) -> Result<Self> {
        config.validate()?;
        let guard = ActiveGuard::acquire()?;
        let reader = SignalReader::current_thread()?;

        info!(
            tid = reader.tid(),
            interval = ?config.interval,
            output = %config.output.display(),
            "profiling started"
        );

        Self::launch(config, reader, Box::new(ProcessSymbols::new()), guard)
    }

    /// Start a session with custom register and symbol backends
    pub fn with_backends<R, S>(config: ProfilerConfig, reader: R, symbolizer: S) -> Result<Self>
    where
        R: RegisterReader,
        S: Symbolizer + 'static,
    {
        config.validate()?;
        let guard = ActiveGuard::acquire()?;

        debug!(interval = ?config.interval, "profiling started with custom backends");

        Self::launch(config, reader, Box::new(symbolizer), guard)
    }

    fn launch<R: RegisterReader>(
        config: ProfilerConfig,
        reader: R,
        symbolizer: Box<dyn Symbolizer>,
        guard: ActiveGuard,
    ) -> Result<Self> {
        let sampler = Sampler::start(reader, config.interval)?;

        Ok(Profiler {
            config,
            symbolizer,
            sampler: Some(sampler),
            guard: Some(guard),
            _marker: PhantomData,
        })
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.sampler.is_some()
    }

    /// Stop sampling, then write the report.
    ///
    /// Returns the report that was written, or `Ok(None)` if the session had
    /// already been stopped.
    pub fn stop(&mut self) -> Result<Option<Report>> {
        let Some(mut sampler) = self.sampler.take() else {
            return Ok(None);
        };

        let result = self.finish(&mut sampler);

        // Sampler is joined at this point, the slot can be reused
        self.guard.take();
        result.map(Some)
    }

    fn finish(&self, sampler: &mut Sampler) -> Result<Report> {
        // A failed sampler still gets its (empty) report
        let output = match sampler.stop() {
            Ok(output) => output.unwrap_or_default(),
            Err(e) => {
                error!(error = %e, "sampler failed, samples lost");
                SamplerOutput::default()
            }
        };
        let profile = aggregate(&output.samples, self.symbolizer.as_ref());

        debug!(
            ticks = output.ticks,
            skipped = output.skipped,
            collected = output.total(),
            unresolved = profile.unresolved_samples,
            functions = profile.functions.len(),
            "sampling finished"
        );

        let report = Report::build(
            &profile,
            self.config.min_samples,
            self.config.min_percent,
            self.config.line_numbers,
            self.symbolizer.as_ref(),
        );
        report.write_to_path(&self.config.output)?;

        info!(
            total = report.total_samples,
            shown = report.entries.len(),
            output = %self.config.output.display(),
            "profile report written"
        );

        Ok(report)
    }
}

impl Drop for Profiler {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "failed to write profile report");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_exclusive() {
        let guard = ActiveGuard::acquire().unwrap();
        assert!(matches!(ActiveGuard::acquire(), Err(Error::SessionActive)));
        drop(guard);
        drop(ActiveGuard::acquire().unwrap());
    }
}
