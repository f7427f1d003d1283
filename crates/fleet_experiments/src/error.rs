//! Errors raised while building, running or exporting experiments.

use fleet_core::error::SetupError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("scenario setup failed: {0}")]
    Setup(#[from] SetupError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("export error: {0}")]
    Export(String),
}

pub type ExperimentResult<T> = Result<T, ExperimentError>;
