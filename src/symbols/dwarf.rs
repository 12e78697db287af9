use crate::error::{Error, Result};
use gimli::{EndianSlice, RunTimeEndian};
use object::{Object, ObjectSection, ObjectSymbol, SymbolKind};
use std::path::Path;

/// A function symbol from the ELF symbol table (link-time addresses)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSymbol {
    pub start: u64,
    pub size: u64,
    /// Raw (possibly mangled) symbol name
    pub name: String,
}

impl FunctionSymbol {
    fn covers(&self, addr: u64) -> bool {
        if self.size == 0 {
            addr == self.start
        } else {
            addr >= self.start && addr - self.start < self.size
        }
    }
}

/// Function symbols sorted by start address
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    symbols: Vec<FunctionSymbol>,
}

impl FunctionTable {
    pub fn new(mut symbols: Vec<FunctionSymbol>) -> Self {
        // Aliases share a start address; keep the widest one
        symbols.sort_by(|a, b| a.start.cmp(&b.start).then(b.size.cmp(&a.size)));
        symbols.dedup_by_key(|s| s.start);

        // Zero-sized labels inside a function would hide it from lookup
        let mut covered_until = 0;
        symbols.retain(|s| {
            if s.size == 0 {
                return s.start >= covered_until;
            }
            covered_until = covered_until.max(s.start.saturating_add(s.size));
            true
        });

        FunctionTable { symbols }
    }

    /// Collect text symbols, falling back to the dynamic table of stripped binaries
    pub fn from_object(object: &object::File<'_>) -> Self {
        let mut symbols = Self::collect(object.symbols());
        if symbols.is_empty() {
            symbols = Self::collect(object.dynamic_symbols());
        }
        Self::new(symbols)
    }

    fn collect<'data, S>(iter: impl Iterator<Item = S>) -> Vec<FunctionSymbol>
    where
        S: ObjectSymbol<'data>,
    {
        iter.filter(|symbol| symbol.kind() == SymbolKind::Text && symbol.is_definition())
            .filter(|symbol| symbol.address() != 0)
            .filter_map(|symbol| {
                let name = symbol.name().ok()?;
                if name.is_empty() {
                    return None;
                }
                Some(FunctionSymbol {
                    start: symbol.address(),
                    size: symbol.size(),
                    name: name.to_string(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The symbol whose extent contains `addr`
    pub fn lookup(&self, addr: u64) -> Option<&FunctionSymbol> {
        // Largest start address <= addr
        let idx = self.symbols.partition_point(|s| s.start <= addr);
        let symbol = self.symbols.get(idx.checked_sub(1)?)?;
        symbol.covers(addr).then_some(symbol)
    }
}

/// An address range mapped to a source location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRange {
    pub start: u64,
    pub end: u64,
    pub file: String,
    pub line: u32,
}

/// Rows of the DWARF line programs, as half-open address ranges
#[derive(Debug, Clone, Default)]
pub struct LineTable {
    /// Sorted by start address
    ranges: Vec<AddressRange>,
}

impl LineTable {
    pub fn new(mut ranges: Vec<AddressRange>) -> Self {
        ranges.sort_by_key(|r| r.start);
        LineTable { ranges }
    }

    /// Parse the line programs of an ELF file
    pub fn from_object(object: &object::File<'_>, path: &Path) -> Result<Self> {
        // Check for debug info
        if object.section_by_name(".debug_line").is_none() {
            return Err(Error::MissingDebugInfo {
                path: path.display().to_string(),
            });
        }

        let endian = if object.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        // Helper to load a section's data
        let load_section = |name: &str| -> &[u8] {
            object
                .section_by_name(name)
                .and_then(|s| s.data().ok())
                .unwrap_or(&[])
        };

        let dwarf = gimli::Dwarf {
            debug_abbrev: gimli::DebugAbbrev::new(load_section(".debug_abbrev"), endian),
            debug_info: gimli::DebugInfo::new(load_section(".debug_info"), endian),
            debug_line: gimli::DebugLine::new(load_section(".debug_line"), endian),
            debug_str: gimli::DebugStr::new(load_section(".debug_str"), endian),
            debug_line_str: gimli::DebugLineStr::new(load_section(".debug_line_str"), endian),
            ..Default::default()
        };

        Ok(Self::new(Self::parse_line_info(&dwarf)?))
    }

    fn parse_line_info(
        dwarf: &gimli::Dwarf<EndianSlice<'_, RunTimeEndian>>,
    ) -> Result<Vec<AddressRange>> {
        let mut ranges = Vec::new();
        let mut units = dwarf.units();

        while let Ok(Some(header)) = units.next() {
            let unit = dwarf
                .unit(header)
                .map_err(|e| Error::SymbolResolution(format!("Failed to parse unit: {}", e)))?;

            let Some(program) = unit.line_program.clone() else {
                continue;
            };

            let mut rows = program.rows();
            let mut prev_row: Option<(u64, String, u32)> = None;

            while let Ok(Some((header, row))) = rows.next_row() {
                let addr = row.address();

                let file = row
                    .file(header)
                    .map(|f| {
                        let mut path = String::new();

                        if let Some(dir) = f.directory(header)
                            && let Ok(dir_str) = dwarf.attr_string(&unit, dir)
                            && let Ok(s) = dir_str.to_string()
                        {
                            path.push_str(&s);
                            if !path.is_empty() && !path.ends_with('/') {
                                path.push('/');
                            }
                        }

                        if let Ok(name) = dwarf.attr_string(&unit, f.path_name())
                            && let Ok(s) = name.to_string()
                        {
                            // Absolute file names ignore the directory
                            if s.starts_with('/') {
                                path.clear();
                            }
                            path.push_str(&s);
                        }

                        path
                    })
                    .unwrap_or_default();
                let line = row.line().map(|l| l.get() as u32).unwrap_or(0);

                // Create range from previous row to this one
                if let Some((prev_addr, prev_file, prev_line)) = prev_row.take()
                    && addr > prev_addr
                    && !prev_file.is_empty()
                {
                    ranges.push(AddressRange {
                        start: prev_addr,
                        end: addr,
                        file: prev_file,
                        line: prev_line,
                    });
                }

                if !row.end_sequence() {
                    prev_row = Some((addr, file, line));
                }
            }
        }

        Ok(ranges)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The range containing `addr`
    pub fn lookup(&self, addr: u64) -> Option<&AddressRange> {
        let idx = self.ranges.partition_point(|r| r.start <= addr);
        let range = self.ranges.get(idx.checked_sub(1)?)?;
        (addr < range.end && range.line > 0).then_some(range)
    }
}
