use super::{FunctionInfo, SourceLine, Symbolizer};
use crate::error::Result;
use std::collections::BTreeMap;

/// Symbols given explicitly as address ranges.
///
/// Useful for embedders that emit code at runtime, and for tests.
#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    /// start -> (len, name)
    functions: BTreeMap<u64, (u64, String)>,
    /// start -> (len, location)
    lines: BTreeMap<u64, (u64, SourceLine)>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function covering `start..start + len`
    pub fn function(mut self, start: u64, len: u64, name: impl Into<String>) -> Self {
        self.functions.insert(start, (len, name.into()));
        self
    }

    /// Register a source location covering `start..start + len`
    pub fn line(mut self, start: u64, len: u64, file: impl Into<String>, line: u32) -> Self {
        let location = SourceLine {
            file: file.into(),
            line,
        };
        self.lines.insert(start, (len, location));
        self
    }

    fn containing<T>(map: &BTreeMap<u64, (u64, T)>, addr: u64) -> Option<(u64, &T)> {
        let (&start, (len, value)) = map.range(..=addr).next_back()?;
        (addr - start < *len).then_some((start, value))
    }
}

impl Symbolizer for SymbolMap {
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn resolve(&self, addr: u64) -> Option<FunctionInfo> {
        let (start, name) = Self::containing(&self.functions, addr)?;
        Some(FunctionInfo {
            address: start,
            name: name.clone(),
        })
    }

    fn resolve_line(&self, addr: u64) -> Option<SourceLine> {
        Self::containing(&self.lines, addr).map(|(_, location)| location.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> SymbolMap {
        SymbolMap::new()
            .function(0x1000, 0x100, "Alpha")
            .function(0x2000, 0x80, "Beta")
            .line(0x1000, 0x10, "alpha.rs", 3)
    }

    #[test]
    fn test_resolves_to_entry_address() {
        let symbols = map();
        let info = symbols.resolve(0x1042).unwrap();
        assert_eq!(info.address, 0x1000);
        assert_eq!(info.name, "Alpha");

        assert_eq!(symbols.resolve(0x2000).unwrap().name, "Beta");
    }

    #[test]
    fn test_outside_ranges() {
        let symbols = map();
        assert!(symbols.resolve(0x0fff).is_none());
        assert!(symbols.resolve(0x1100).is_none());
        assert!(symbols.resolve(0x2080).is_none());
    }

    #[test]
    fn test_line_lookup() {
        let symbols = map();
        assert_eq!(
            symbols.resolve_line(0x1004).map(|l| l.to_string()),
            Some("alpha.rs:3".to_string())
        );
        assert!(symbols.resolve_line(0x1010).is_none());
        assert!(symbols.resolve_line(0x2000).is_none());
    }
}
