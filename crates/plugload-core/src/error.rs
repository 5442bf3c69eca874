use thiserror::Error;

/// Unified error type for the host side of the loader.
#[derive(Error, Debug)]
pub enum PlugloadError {
    // ── Lifecycle errors ───────────────────────────────────────
    #[error("plugin system is already initialized")]
    AlreadyInitialized,

    #[error("plugin system has been shut down and cannot be initialized again")]
    AlreadyShutDown,

    #[error("plugin system is busy: lifecycle call re-entered or overlapped")]
    Busy,

    #[error("failed to determine loader directory: {0}")]
    Residence(String),

    // ── Plugin errors ──────────────────────────────────────────
    #[error("plugin activation failed: {plugin}: {reason}")]
    Activation { plugin: String, reason: String },

    #[error("plugin shutdown failed: {plugin}: {reason}")]
    Teardown { plugin: String, reason: String },

    #[error("invalid plugin manifest: {path}: {reason}")]
    Manifest { path: String, reason: String },

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PlugloadError>;
