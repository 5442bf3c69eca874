use thiserror::Error;

/// Error returned by plugin code across the capability contract.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("construction failed: {0}")]
    Construction(String),

    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("shutdown failed: {0}")]
    Shutdown(String),

    #[error("dependency not found: {0}")]
    DependencyNotFound(String),

    /// The host refused a call because of the plugin's lifecycle state.
    #[error("invalid lifecycle transition: {0}")]
    Lifecycle(String),

    /// Plugin code panicked; the host caught the unwind.
    #[error("plugin panicked: {0}")]
    Panicked(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
