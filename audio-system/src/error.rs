use asset_manager::AssetError;
use audio_graph::GraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is not initialized")]
    NotInitialized,
    #[error("engine has been disposed")]
    Disposed,
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),
    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
