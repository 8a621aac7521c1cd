//! Error type shared by every extraction entry point.

use thiserror::Error;

use crate::model::FeatureKind;

/// Error returned by a caller supplied feature sink.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("feature kind {0:?} cannot be extracted from this source")]
    InvalidFeatureKind(FeatureKind),
    #[error("feature kind {0:?} requires a triangulated model")]
    NotTriangulated(FeatureKind),
    #[error("failed to build clip model from fence: {0}")]
    ClipModel(String),
    #[error("invalid surface model: {0}")]
    InvalidModel(String),
    #[error("callback aborted extraction")]
    Callback(#[source] SinkError),
    #[error("xml parse error: {0}")]
    Xml(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("failed to format output: {0}")]
    Format(#[from] std::fmt::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
