use std::io;
use std::path::PathBuf;

use crate::types::DrawMode;

/// All error types for the mesh2glb converter.
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("Input error: {0}")]
    Input(String),
    #[error("Unsupported primitive mode {mode:?} in drawable '{drawable}'")]
    UnsupportedTopology { drawable: String, mode: DrawMode },
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("Coordinate correction error: {0}")]
    Correction(String),
    #[error("Projection error: {0}")]
    Projection(String),
    #[error("Texture error: {0}")]
    Texture(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConvertError>;
