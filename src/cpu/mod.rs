//! Instruction-pointer sampling of a single thread.
//!
//! The [`Sampler`] runs the periodic tick on its own thread. Reading the
//! register of the observed thread is platform specific and lives behind
//! [`RegisterReader`]:
//! - Linux x86_64 / aarch64: `SIGPROF` delivered with `pthread_kill`, the
//!   handler copies the program counter out of the signal `ucontext`
//! - elsewhere: a stub that refuses to start

mod sampler;

pub use sampler::{RawSamples, Sampler, SamplerOutput};

#[cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
mod signal;

#[cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
pub use signal::SignalReader;

#[cfg(not(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
)))]
mod stub;

#[cfg(not(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
)))]
pub use stub::SignalReader;

/// Reads the instruction pointer of the observed thread.
///
/// One call is one tick: interrupt the thread, read its program counter and
/// let it continue. `None` means the tick is skipped.
pub trait RegisterReader: Send + 'static {
    fn read_ip(&mut self) -> Option<u64>;
}

impl<F> RegisterReader for F
where
    F: FnMut() -> Option<u64> + Send + 'static,
{
    fn read_ip(&mut self) -> Option<u64> {
        self()
    }
}

/// Check if register sampling is available at compile time
pub const fn sampling_supported() -> bool {
    cfg!(all(
        target_os = "linux",
        any(target_arch = "x86_64", target_arch = "aarch64")
    ))
}
