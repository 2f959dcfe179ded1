use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown building requested from observer table: {0}")]
    UnknownBuilding(String),

    #[error("Unknown ware: {0}")]
    UnknownWare(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Invalid profile: {0}")]
    Profile(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
