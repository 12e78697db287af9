mod maps;

pub use maps::{MappedFile, MemoryMapping, MemoryMaps};

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// The running executable, as seen through procfs
pub struct ProcessInfo {
    pid: u32,
    exe_path: PathBuf,
}

impl ProcessInfo {
    /// Describe the current process
    pub fn current() -> Result<Self> {
        let exe_path = fs::read_link("/proc/self/exe").map_err(|e| {
            Error::SymbolResolution(format!("Cannot read /proc/self/exe: {}", e))
        })?;

        Ok(ProcessInfo {
            pid: std::process::id(),
            exe_path,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Path of the executable as it appears in the memory maps
    pub fn exe_path(&self) -> &Path {
        &self.exe_path
    }

    /// Stable path to the executable image.
    ///
    /// Works even if the binary was deleted or rebuilt after start.
    pub fn proc_exe_path(&self) -> &Path {
        Path::new("/proc/self/exe")
    }
}
