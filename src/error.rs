use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("A profiling session is already active in this process")]
    SessionActive,

    #[error("Cannot acquire sampling resource: {0}")]
    ResourceAcquisition(String),

    #[error("Sampler error: {0}")]
    Sampler(String),

    #[error("Missing debug info in {path}. Recompile with `debug = true` in Cargo.toml")]
    MissingDebugInfo { path: String },

    #[error("Symbol resolution error: {0}")]
    SymbolResolution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

pub type Result<T> = std::result::Result<T, Error>;
