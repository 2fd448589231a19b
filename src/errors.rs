use axum::http::StatusCode;
use std::error::Error as StdError;

use crate::db::StorageError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not supported: {0}")]
    MethodNotSupported(String),

    #[error("Conflict error: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error("An unexpected error occurred: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Parse(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotSupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// tRPC error name and its JSON-RPC number.
    pub fn rpc_code(&self) -> (&'static str, i32) {
        match self {
            AppError::Parse(_) => ("PARSE_ERROR", -32700),
            AppError::Validation(_) => ("BAD_REQUEST", -32600),
            AppError::NotFound(_) => ("NOT_FOUND", -32004),
            AppError::MethodNotSupported(_) => ("METHOD_NOT_SUPPORTED", -32005),
            AppError::Conflict(_) => ("CONFLICT", -32009),
            AppError::Database(_) | AppError::Unexpected(_) => ("INTERNAL_SERVER_ERROR", -32603),
        }
    }

    /// Message sent to the caller.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Parse(msg)
            | AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::MethodNotSupported(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::Database(e) => format!("{:#}", e),
            AppError::Unexpected(e) => format!("An unexpected error occurred: {}", e),
        }
    }

    /// Logs the error with its variant and, for server-side failures, the source chain.
    pub fn log(&self, path: &str) {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(
                error_type = %self,
                status_code = %status,
                path = path,
                "Procedure error"
            );
        } else {
            tracing::warn!(
                error_type = %self,
                status_code = %status,
                path = path,
                "Procedure rejected"
            );
        }

        if let AppError::Unexpected(e) | AppError::Database(e) = self {
            let mut source_chain = String::new();
            let mut current_err: Option<&(dyn StdError + 'static)> = e.source();
            while let Some(err) = current_err {
                source_chain.push_str(&format!("\n  Caused by: {}", err));
                current_err = err.source();
            }
            if !source_chain.is_empty() {
                tracing::error!("Error source chain:{}", source_chain);
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(detail) => AppError::NotFound(detail),
            StorageError::Conflict(detail) => AppError::Conflict(detail),
            _ => AppError::Database(anyhow::Error::new(err).context("Storage operation failed")),
        }
    }
}
