//! Profile a synthetic workload on the main thread.
//!
//! ```text
//! cargo run --release --example busy -- --duration 2s --line-numbers
//! RUST_LOG=selfprof=debug cargo run --example busy
//! ```

use anyhow::Context;
use clap::Parser;
use selfprof::config::{DEFAULT_OUTPUT, parse_duration};
use selfprof::{Profiler, ProfilerConfig};
use std::hint::black_box;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "busy")]
#[command(about = "Run a CPU-bound workload under selfprof")]
struct Args {
    /// Report file
    #[arg(long, short = 'o', default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Append source file and line to each function
    #[arg(long, short = 'l')]
    line_numbers: bool,

    /// Minimum samples for a function to be listed
    #[arg(long, default_value = "10")]
    min_samples: u64,

    /// Minimum percentage for a function to be listed
    #[arg(long, default_value = "1")]
    min_percent: u64,

    /// Sampling interval (e.g., 1ms, 500us)
    #[arg(long, short = 'i', default_value = "1ms", value_parser = parse_duration)]
    interval: Duration,

    /// How long to run the workload (e.g., 1s, 500ms)
    #[arg(long, short = 'd', default_value = "1s", value_parser = parse_duration)]
    duration: Duration,
}

#[inline(never)]
fn collatz_steps(mut n: u64) -> u64 {
    let mut steps = 0;
    while n != 1 {
        n = if n % 2 == 0 { n / 2 } else { 3 * n + 1 };
        steps += 1;
    }
    steps
}

#[inline(never)]
fn checksum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |acc, &b| acc.rotate_left(5) ^ u32::from(b))
}

fn workload(duration: Duration) -> u64 {
    let buffer: Vec<u8> = (0..4096u32).map(|i| (i * 7) as u8).collect();
    let deadline = Instant::now() + duration;
    let mut acc = 0u64;
    let mut n = 1u64;

    while Instant::now() < deadline {
        // Roughly three quarters of the time in collatz_steps
        for _ in 0..3 {
            acc = acc.wrapping_add(collatz_steps(black_box(n)));
            n += 1;
        }
        acc ^= u64::from(checksum(black_box(&buffer)));
    }

    acc
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = ProfilerConfig::new()
        .output(&args.output)
        .line_numbers(args.line_numbers)
        .min_samples(args.min_samples)
        .min_percent(args.min_percent)
        .interval(args.interval);

    let mut profiler = Profiler::start(config).context("Failed to start profiler")?;
    let result = workload(args.duration);
    let report = profiler
        .stop()
        .context("Failed to write report")?
        .context("Profiler already stopped")?;

    println!("workload result: {}", result);
    println!(
        "{} samples, {} functions listed in {}",
        report.total_samples,
        report.entries.len(),
        args.output.display()
    );

    Ok(())
}
