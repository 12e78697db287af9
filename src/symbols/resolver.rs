use super::dwarf::{FunctionTable, LineTable};
use super::{FunctionInfo, SourceLine, Symbolizer, display_name};
use crate::error::{Error, Result};
use crate::process::{MappedFile, MemoryMaps, ProcessInfo};
use memmap2::Mmap;
use object::{Object, ObjectKind};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Modules of the running process, scanned once per process
static MODULES: OnceLock<Result<ModuleSet>> = OnceLock::new();

struct ModuleSet {
    modules: Vec<Module>,
}

impl ModuleSet {
    fn load() -> Result<Self> {
        let proc_info = ProcessInfo::current()?;

        let modules: Vec<Module> = MemoryMaps::current()?
            .files()
            .into_iter()
            .map(|file| Module::new(file, &proc_info))
            .collect();

        debug!(
            pid = proc_info.pid(),
            exe = %proc_info.exe_path().display(),
            modules = modules.len(),
            "scanned loaded modules for symbol resolution"
        );

        Ok(ModuleSet { modules })
    }

    fn find(&self, addr: u64) -> Option<&Module> {
        self.modules.iter().find(|m| m.mapping.contains(addr))
    }
}

/// One file-backed module; its symbols are read on first lookup
struct Module {
    mapping: MappedFile,
    /// File to open; `/proc/self/exe` for the main executable, which works
    /// even if the binary was deleted or rebuilt
    source: PathBuf,
    is_main: bool,
    image: OnceLock<Option<Image>>,
}

struct Image {
    mmap: Mmap,
    /// Runtime address minus link-time address
    bias: u64,
    functions: FunctionTable,
    /// Parsed on first `resolve_line`
    lines: OnceLock<Option<LineTable>>,
}

impl Module {
    fn new(mapping: MappedFile, proc_info: &ProcessInfo) -> Self {
        let is_main = Path::new(&mapping.path) == proc_info.exe_path();
        let source = if is_main {
            proc_info.proc_exe_path().to_path_buf()
        } else {
            PathBuf::from(&mapping.path)
        };

        Module {
            mapping,
            source,
            is_main,
            image: OnceLock::new(),
        }
    }

    fn image(&self) -> Option<&Image> {
        self.image
            .get_or_init(|| match self.load_image() {
                Ok(image) => {
                    debug!(
                        path = %self.mapping.path,
                        functions = image.functions.len(),
                        bias = format_args!("{:#x}", image.bias),
                        "loaded symbol table"
                    );
                    Some(image)
                }
                Err(e) => {
                    warn!(path = %self.mapping.path, error = %e, "cannot read symbol table");
                    None
                }
            })
            .as_ref()
    }

    fn load_image(&self) -> Result<Image> {
        let file = File::open(&self.source)?;
        let mmap = unsafe { Mmap::map(&file) }?;

        let object = object::File::parse(&*mmap)
            .map_err(|e| Error::SymbolResolution(format!("Failed to parse ELF: {}", e)))?;

        // Only position-independent images are relocated at load time
        let bias = match object.kind() {
            ObjectKind::Dynamic => self.mapping.base,
            _ => 0,
        };
        let functions = FunctionTable::from_object(&object);
        // Release the borrow of `mmap` before moving it
        drop(object);

        Ok(Image {
            mmap,
            bias,
            functions,
            lines: OnceLock::new(),
        })
    }

    fn lines<'a>(&self, image: &'a Image) -> Option<&'a LineTable> {
        image
            .lines
            .get_or_init(|| {
                let parsed = object::File::parse(&*image.mmap)
                    .map_err(|e| Error::SymbolResolution(format!("Failed to parse ELF: {}", e)))
                    .and_then(|object| {
                        LineTable::from_object(&object, Path::new(&self.mapping.path))
                    });

                match parsed {
                    Ok(table) => {
                        debug!(
                            path = %self.mapping.path,
                            ranges = table.len(),
                            "loaded line table"
                        );
                        Some(table)
                    }
                    // Shared libraries rarely ship debug info
                    Err(e) if self.is_main => {
                        warn!(error = %e, "line numbers unavailable");
                        None
                    }
                    Err(e) => {
                        debug!(path = %self.mapping.path, error = %e, "no line table");
                        None
                    }
                }
            })
            .as_ref()
    }
}

/// Symbols of the running process: the executable and every shared object
/// mapped when the backend is initialized.
///
/// All instances share one process-wide backend. Anonymous code (vdso, JIT)
/// does not resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSymbols;

impl ProcessSymbols {
    pub fn new() -> Self {
        ProcessSymbols
    }

    /// Module and its symbols for `addr`; `None` before `initialize`
    fn image_for(&self, addr: u64) -> Option<(&'static Module, &'static Image)> {
        let modules = MODULES.get()?.as_ref().ok()?;
        let module = modules.find(addr)?;
        Some((module, module.image()?))
    }
}

impl Symbolizer for ProcessSymbols {
    fn initialize(&self) -> Result<()> {
        match MODULES.get_or_init(ModuleSet::load) {
            Ok(_) => Ok(()),
            Err(e) => Err(Error::SymbolResolution(e.to_string())),
        }
    }

    fn resolve(&self, addr: u64) -> Option<FunctionInfo> {
        let (_, image) = self.image_for(addr)?;
        let symbol = image.functions.lookup(addr.checked_sub(image.bias)?)?;

        Some(FunctionInfo {
            address: symbol.start.wrapping_add(image.bias),
            name: display_name(&symbol.name),
        })
    }

    fn resolve_line(&self, addr: u64) -> Option<SourceLine> {
        let (module, image) = self.image_for(addr)?;
        let range = module.lines(image)?.lookup(addr.checked_sub(image.bias)?)?;

        Some(SourceLine {
            file: range.file.clone(),
            line: range.line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline(never)]
    fn marker_function(x: u64) -> u64 {
        std::hint::black_box(x.wrapping_mul(3))
    }

    fn marker_entry() -> u64 {
        let pointer: fn(u64) -> u64 = marker_function;
        std::hint::black_box(marker_function(1));
        pointer as usize as u64
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let symbols = ProcessSymbols::new();
        assert!(symbols.initialize().is_ok());
        assert!(symbols.initialize().is_ok());
    }

    #[test]
    fn test_resolves_own_function() {
        let symbols = ProcessSymbols::new();
        symbols.initialize().unwrap();

        let entry = marker_entry();
        let info = symbols.resolve(entry + 1).unwrap();
        assert_eq!(info.address, entry);
        assert!(info.name.ends_with("marker_function"), "{}", info.name);
        assert!(!info.name.contains("::h"));
    }

    #[test]
    fn test_resolves_own_line() {
        let symbols = ProcessSymbols::new();
        symbols.initialize().unwrap();

        let line = symbols.resolve_line(marker_entry()).unwrap();
        assert!(line.file.ends_with("resolver.rs"), "{}", line);
        assert!(line.line > 0);
    }

    #[test]
    fn test_resolves_shared_library_function() {
        let symbols = ProcessSymbols::new();
        symbols.initialize().unwrap();

        // memcpy is an IFUNC whose selected variant is not exported;
        // qsort is a plain exported function
        let addr = libc::qsort as usize as u64;
        let info = symbols.resolve(addr + 4).unwrap();
        assert!(info.name.contains("qsort"), "{}", info.name);
        assert!(info.address <= addr + 4);
    }

    #[test]
    fn test_unmapped_address_does_not_resolve() {
        let symbols = ProcessSymbols::new();
        symbols.initialize().unwrap();
        assert!(symbols.resolve(8).is_none());
    }
}
