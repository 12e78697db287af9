//! Statistical sampling profiler for the calling thread.
//!
//! ```no_run
//! use selfprof::{Profiler, ProfilerConfig};
//!
//! # fn work() {}
//! let mut profiler = Profiler::start(ProfilerConfig::new().min_samples(5))?;
//! work();
//! profiler.stop()?;
//! # Ok::<(), selfprof::Error>(())
//! ```
//!
//! While the session runs, a sampler thread interrupts the profiled thread
//! at a fixed interval and counts hits per instruction address. On stop the
//! addresses are folded per function and a text report is written.

pub mod aggregate;
pub mod config;
pub mod cpu;
pub mod error;
pub mod process;
pub mod report;
pub mod session;
pub mod symbols;

pub use config::ProfilerConfig;
pub use error::{Error, Result};
pub use report::{Report, ReportEntry};
pub use session::Profiler;
