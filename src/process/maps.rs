use crate::error::{Error, Result};
use std::fs;

/// A parsed memory mapping from /proc/[pid]/maps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMapping {
    pub start: u64,
    pub end: u64,
    pub perms: String,
    pub offset: u64,
    pub pathname: Option<String>,
}

/// Collection of memory mappings for a process
pub struct MemoryMaps {
    mappings: Vec<MemoryMapping>,
}

impl MemoryMaps {
    /// Parse /proc/self/maps
    pub fn current() -> Result<Self> {
        let content = fs::read_to_string("/proc/self/maps").map_err(|e| {
            Error::SymbolResolution(format!("Cannot read /proc/self/maps: {}", e))
        })?;

        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mappings = content.lines().filter_map(Self::parse_line).collect();
        MemoryMaps { mappings }
    }

    fn parse_line(line: &str) -> Option<MemoryMapping> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 {
            return None;
        }

        // Parse address range "start-end"
        let (start, end) = parts[0].split_once('-')?;
        let start = u64::from_str_radix(start, 16).ok()?;
        let end = u64::from_str_radix(end, 16).ok()?;
        let perms = parts[1].to_string();
        let offset = u64::from_str_radix(parts[2], 16).ok()?;

        // Pathname is the last field (if present)
        let pathname = if parts.len() >= 6 {
            Some(parts[5..].join(" "))
        } else {
            None
        };

        Some(MemoryMapping {
            start,
            end,
            perms,
            offset,
            pathname,
        })
    }

    /// Files with at least one executable mapping, in address order.
    ///
    /// The base of a file is the runtime address of file offset 0, taken
    /// from its first mapping. Using the executable segment would be wrong:
    /// its file offset is non-zero (typically 0x1000+).
    pub fn files(&self) -> Vec<MappedFile> {
        let mut files: Vec<MappedFile> = Vec::new();

        for mapping in &self.mappings {
            // Skip anonymous and pseudo mappings ([heap], [vdso], ...)
            let Some(path) = mapping.pathname.as_deref().filter(|p| p.starts_with('/')) else {
                continue;
            };

            let idx = match files.iter().position(|f| f.path == path) {
                Some(idx) => idx,
                None => {
                    files.push(MappedFile {
                        path: path.to_string(),
                        base: mapping.start.saturating_sub(mapping.offset),
                        text: Vec::new(),
                    });
                    files.len() - 1
                }
            };

            if mapping.perms.contains('x') {
                files[idx].text.push((mapping.start, mapping.end));
            }
        }

        files.retain(|f| !f.text.is_empty());
        files
    }
}

/// A file-backed module: executable, shared library or plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedFile {
    pub path: String,
    pub base: u64,
    /// Executable address ranges, half-open
    pub text: Vec<(u64, u64)>,
}

impl MappedFile {
    pub fn contains(&self, addr: u64) -> bool {
        self.text
            .iter()
            .any(|&(start, end)| addr >= start && addr < end)
    }
}
