use std::{fmt, path::PathBuf};

#[derive(Debug)]
pub enum SenderError {
    /// The host exposes no event dispatcher; neither ticks nor frame events can be observed.
    DispatcherUnavailable,
    /// The host exposes no texture factory.
    FactoryUnavailable,
    /// No scene context is active (or the stage interface is missing).
    ContextUnavailable,
    /// The texture factory refused to start.
    FactoryStartup { msg: String },
    /// The rendering engine could not be attached to the active context.
    EngineAttach { engine_id: String, msg: String },
    /// The factory failed to create the shared texture.
    TextureCreate { name: String, msg: String },
    /// A shared texture is already live; only one is ever created.
    TextureLimit { live: usize },
    /// The sharing subsystem could not register the named channel.
    ChannelOpen { name: String, msg: String },
    /// I/O error reading a file.
    Io { path: PathBuf, source: std::io::Error },
    /// JSON parse error for a file.
    Json { path: PathBuf, source: serde_json::Error },
    /// Config is syntactically valid but semantically invalid.
    InvalidConfig { path: PathBuf, msg: String },
}

impl fmt::Display for SenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderError::DispatcherUnavailable => {
                write!(f, "event dispatcher unavailable (no update ticks, no frame events)")
            }
            SenderError::FactoryUnavailable => write!(f, "texture factory unavailable"),
            SenderError::ContextUnavailable => write!(f, "no active scene context"),
            SenderError::FactoryStartup { msg } => {
                write!(f, "texture factory failed to start: {msg}")
            }
            SenderError::EngineAttach { engine_id, msg } => {
                write!(f, "could not attach engine '{engine_id}': {msg}")
            }
            SenderError::TextureCreate { name, msg } => {
                write!(f, "could not create shared texture '{name}': {msg}")
            }
            SenderError::TextureLimit { live } => {
                write!(f, "a shared texture is already live ({live} live)")
            }
            SenderError::ChannelOpen { name, msg } => {
                write!(f, "could not open sender channel '{name}': {msg}")
            }
            SenderError::Io { path, source } => {
                write!(f, "I/O error for {}: {}", path.display(), source)
            }
            SenderError::Json { path, source } => {
                write!(f, "JSON parse error for {}: {}", path.display(), source)
            }
            SenderError::InvalidConfig { path, msg } => {
                write!(f, "Invalid config {}: {}", path.display(), msg)
            }
        }
    }
}

impl std::error::Error for SenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SenderError::Io { source, .. } => Some(source),
            SenderError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}
