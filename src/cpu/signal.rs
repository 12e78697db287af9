//! Register reads through `SIGPROF`.
//!
//! The sampler thread sends `SIGPROF` to the target with `pthread_kill`. The
//! handler runs on the target thread, which is stopped in its tracks while it
//! does; it copies the interrupted program counter out of the `ucontext` into
//! a static slot and returns, resuming the target. The sampler waits for the
//! handler's acknowledgement and only then touches the sample table.
//!
//! Signal handlers cannot carry state, so the slot is process-wide. Only one
//! profiling session may run at a time.

use super::RegisterReader;
use crate::error::{Error, Result};
use nix::errno::Errno;
use nix::sys::pthread::{Pthread, pthread_kill, pthread_self};
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Signal used to interrupt the target thread
const CAPTURE_SIGNAL: Signal = Signal::SIGPROF;

/// How long a tick waits for the handler before giving up on the sample
const ACK_TIMEOUT: Duration = Duration::from_millis(50);

/// Sequence number of the latest capture request
static REQUEST: AtomicU64 = AtomicU64::new(0);
/// Sequence number the handler last answered
static ACK: AtomicU64 = AtomicU64::new(0);
/// Program counter captured by the handler for `ACK`
static CAPTURED_IP: AtomicU64 = AtomicU64::new(0);

extern "C" fn capture_handler(
    _sig: libc::c_int,
    _info: *mut libc::siginfo_t,
    ucontext: *mut libc::c_void,
) {
    let seq = REQUEST.load(Ordering::Acquire);

    let ip = if ucontext.is_null() {
        0
    } else {
        unsafe { instruction_pointer(ucontext as *const libc::ucontext_t) }
    };

    CAPTURED_IP.store(ip, Ordering::Relaxed);
    ACK.store(seq, Ordering::Release);
}

#[cfg(target_arch = "x86_64")]
unsafe fn instruction_pointer(uc: *const libc::ucontext_t) -> u64 {
    unsafe { (*uc).uc_mcontext.gregs[libc::REG_RIP as usize] as u64 }
}

#[cfg(target_arch = "aarch64")]
unsafe fn instruction_pointer(uc: *const libc::ucontext_t) -> u64 {
    unsafe { (*uc).uc_mcontext.pc as u64 }
}

/// Install the capture handler once per process
fn install_handler() -> Result<()> {
    static INSTALLED: OnceLock<std::result::Result<(), Errno>> = OnceLock::new();

    let installed = *INSTALLED.get_or_init(|| {
        let action = SigAction::new(
            SigHandler::SigAction(capture_handler),
            SaFlags::SA_RESTART | SaFlags::SA_SIGINFO,
            SigSet::empty(),
        );
        // SAFETY: the handler only touches atomics
        unsafe { sigaction(CAPTURE_SIGNAL, &action) }.map(|_| ())
    });

    installed.map_err(|e| {
        Error::ResourceAcquisition(format!(
            "Cannot install {} handler: {}",
            CAPTURE_SIGNAL.as_str(),
            e
        ))
    })
}

/// [`RegisterReader`] for a thread of the current process
pub struct SignalReader {
    thread: Pthread,
    tid: i32,
}

impl SignalReader {
    /// Observe the calling thread
    pub fn current_thread() -> Result<Self> {
        install_handler()?;

        let thread = pthread_self();
        // Signal 0 only checks that the handle is valid
        pthread_kill(thread, None::<Signal>).map_err(|e| {
            Error::ResourceAcquisition(format!("Cannot open target thread: {}", e))
        })?;

        Ok(SignalReader {
            thread,
            tid: nix::unistd::gettid().as_raw(),
        })
    }

    /// Kernel thread id of the observed thread
    pub fn tid(&self) -> i32 {
        self.tid
    }
}

impl RegisterReader for SignalReader {
    fn read_ip(&mut self) -> Option<u64> {
        let seq = REQUEST.fetch_add(1, Ordering::AcqRel) + 1;

        if pthread_kill(self.thread, CAPTURE_SIGNAL).is_err() {
            return None;
        }

        let deadline = Instant::now() + ACK_TIMEOUT;
        while ACK.load(Ordering::Acquire) < seq {
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::yield_now();
        }

        match CAPTURED_IP.load(Ordering::Relaxed) {
            0 => None,
            ip => Some(ip),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc;
    use std::thread;

    #[inline(never)]
    fn spin(stop: &AtomicBool) -> u64 {
        let mut acc = 0u64;
        while !stop.load(Ordering::Relaxed) {
            acc = std::hint::black_box(acc.wrapping_mul(31).wrapping_add(7));
        }
        acc
    }

    #[test]
    fn test_reads_ip_of_busy_thread() {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let worker = thread::spawn({
            let stop = stop.clone();
            move || {
                let reader = SignalReader::current_thread();
                tx.send(reader).unwrap();
                spin(&stop)
            }
        });

        let mut reader = rx.recv().unwrap().unwrap();
        assert!(reader.tid() > 0);

        let captured: Vec<u64> = (0..20).filter_map(|_| reader.read_ip()).collect();

        stop.store(true, Ordering::Relaxed);
        worker.join().unwrap();

        assert!(!captured.is_empty());
        assert!(captured.iter().all(|&ip| ip != 0));
    }
}
