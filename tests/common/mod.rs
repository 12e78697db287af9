#![allow(dead_code)]

use selfprof::cpu::RegisterReader;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Sessions are process-wide; tests that start one take this lock
static SESSION_LOCK: Mutex<()> = Mutex::new(());

pub fn serial() -> MutexGuard<'static, ()> {
    SESSION_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Report path unique to this test process
pub fn report_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("selfprof-{}-{}.log", name, std::process::id()))
}

/// Replays a fixed list of addresses, then skips every tick
pub struct ScriptedReader {
    script: VecDeque<u64>,
    done: Option<Sender<()>>,
}

impl ScriptedReader {
    /// `(address, hits)` pairs, played in order
    pub fn new(hits: &[(u64, u64)]) -> (Self, Receiver<()>) {
        let script = hits
            .iter()
            .flat_map(|&(addr, n)| std::iter::repeat_n(addr, n as usize))
            .collect();
        let (tx, rx) = mpsc::channel();
        let reader = ScriptedReader {
            script,
            done: Some(tx),
        };
        (reader, rx)
    }
}

impl RegisterReader for ScriptedReader {
    fn read_ip(&mut self) -> Option<u64> {
        let ip = self.script.pop_front();
        if ip.is_none()
            && let Some(done) = self.done.take()
        {
            let _ = done.send(());
        }
        ip
    }
}

/// Block until the reader has played its whole script
pub fn wait_done(done: &Receiver<()>) {
    done.recv_timeout(Duration::from_secs(10))
        .expect("scripted reader did not finish");
}
