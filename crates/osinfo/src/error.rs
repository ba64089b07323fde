//! Error taxonomy for template-defaults resolution.

use thiserror::Error;

/// Errors which may be returned while classifying the host or resolving
/// template defaults.
#[derive(Error, Debug)]
pub enum OsinfoError {
    /// The host machine type maps to no supported architecture family.
    /// Fatal at startup: no template defaults can be computed.
    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    /// The template override file is incomplete or contradictory.
    #[error("invalid template configuration: {0}")]
    InvalidTemplateConfig(String),

    /// A field requested from the merged template defaults does not exist.
    #[error("unknown template field: {0}")]
    UnknownField(String),

    /// Reading host facts or the override file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The override file is not valid TOML.
    #[error("cannot parse template configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serializing the merged defaults for a field query failed.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
