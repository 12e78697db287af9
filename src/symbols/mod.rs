//! Address to function / source-line resolution.
//!
//! [`Symbolizer`] is the seam between the profiler and whatever knows about
//! symbols. Two implementations ship with the crate:
//! - [`ProcessSymbols`]: ELF symbol tables and DWARF line programs of the
//!   executable and its shared libraries, each loaded on first use
//! - [`SymbolMap`]: an explicit table, for hosts that generate code or
//!   already know their layout

mod dwarf;
mod resolver;
mod table;

pub use dwarf::{AddressRange, FunctionSymbol, FunctionTable, LineTable};
pub use resolver::ProcessSymbols;
pub use table::SymbolMap;

use crate::error::Result;
use std::fmt;

/// The function containing a sampled address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    /// Canonical entry address, used as the aggregation key
    pub address: u64,
    pub name: String,
}

/// A resolved source location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub file: String,
    pub line: u32,
}

impl fmt::Display for SourceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Debug-information backend used when the report is generated
pub trait Symbolizer {
    /// One-time setup. Calling it again has no further effect.
    fn initialize(&self) -> Result<()>;

    /// Function containing `addr`, or `None` if no symbol covers it
    fn resolve(&self, addr: u64) -> Option<FunctionInfo>;

    /// Source file and line of `addr`, if line information exists
    fn resolve_line(&self, addr: u64) -> Option<SourceLine>;
}

impl<S: Symbolizer + ?Sized> Symbolizer for &S {
    fn initialize(&self) -> Result<()> {
        (**self).initialize()
    }

    fn resolve(&self, addr: u64) -> Option<FunctionInfo> {
        (**self).resolve(addr)
    }

    fn resolve_line(&self, addr: u64) -> Option<SourceLine> {
        (**self).resolve_line(addr)
    }
}

/// Demangle a symbol and drop the `::h<hash>` suffix
pub fn display_name(raw: &str) -> String {
    let mut result = format!("{:#}", rustc_demangle::demangle(raw));

    // Remove the hash suffix (e.g., "::h1234567890abcdef")
    if let Some(idx) = result.rfind("::h") {
        let suffix = &result[idx + 3..];
        if suffix.len() == 16 && suffix.chars().all(|c| c.is_ascii_hexdigit()) {
            result.truncate(idx);
        }
    }

    result
}
