//! Error type for service composition.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("configuration: {0}")] Config(#[from] config::ConfigError),
    #[error("rpc: {0}")] Rpc(String),
    #[error("no tokio runtime: {0}")] Runtime(String),
    #[error("I/O error: {0}")] Io(#[from] std::io::Error),
}
