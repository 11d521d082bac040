// src/handlers/error.rs
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;

use crate::error::{BatchError, ImportError, PortfolioError, ScoreError};

#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}

impl From<ImportError> for ApiError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::MissingColumns(_) | ImportError::Csv(_) => ApiError::bad_request(e.to_string()),
            ImportError::Io(_) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<ScoreError> for ApiError {
    fn from(e: ScoreError) -> Self {
        match e {
            ScoreError::WeightSum(_) => ApiError::bad_request(e.to_string()),
            ScoreError::NoFunds => ApiError::new(StatusCode::CONFLICT, e.to_string()),
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(e: BatchError) -> Self {
        ApiError::new(StatusCode::CONFLICT, e.to_string())
    }
}

impl From<PortfolioError> for ApiError {
    fn from(e: PortfolioError) -> Self {
        match e {
            PortfolioError::EmptySet(_) => ApiError::new(StatusCode::CONFLICT, e.to_string()),
            _ => ApiError::bad_request(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(ScoreError::WeightSum(9.0)).status, StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(ScoreError::NoFunds).status, StatusCode::CONFLICT);
        assert_eq!(ApiError::from(BatchError::AlreadyRunning).status, StatusCode::CONFLICT);
        let missing = ImportError::MissingColumns(vec!["Fon Kodu".to_string()]);
        assert_eq!(ApiError::from(missing).status, StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(PortfolioError::NegativeValue(-1.0)).status, StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(PortfolioError::EmptySet("planned")).status, StatusCode::CONFLICT);
    }
}
