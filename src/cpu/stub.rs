//! Stub reader for targets without a register-sampling implementation

use super::RegisterReader;
use crate::error::{Error, Result};

pub struct SignalReader;

impl SignalReader {
    pub fn current_thread() -> Result<Self> {
        Err(Error::UnsupportedPlatform(
            "Instruction-pointer sampling is only implemented for Linux on x86_64 and aarch64"
                .to_string(),
        ))
    }

    pub fn tid(&self) -> i32 {
        0
    }
}

impl RegisterReader for SignalReader {
    fn read_ip(&mut self) -> Option<u64> {
        None
    }
}
