//! Error responses of the user gateway

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Gateway failures.
///
/// Every failure surfaces as a 500 with a static message, except a
/// fetch-by-key for an absent document, which is a 404.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("User not found")]
    NotFound,

    #[error("Error creating index")]
    CreateIndex,

    #[error("Error adding or updating user")]
    Upsert,

    #[error("Error retrieving user")]
    Retrieve,

    #[error("Error retrieving users")]
    RetrieveAll,

    #[error("Error deleting user")]
    Delete,

    #[error("Error deleting users")]
    DeleteAll,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::CreateIndex
            | Self::Upsert
            | Self::Retrieve
            | Self::RetrieveAll
            | Self::Delete
            | Self::DeleteAll => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn operation(&self) -> &'static str {
        match self {
            Self::NotFound | Self::Retrieve => "get_user",
            Self::CreateIndex => "create_index",
            Self::Upsert => "upsert_user",
            Self::RetrieveAll => "get_all_users",
            Self::Delete => "delete_user",
            Self::DeleteAll => "delete_all_users",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        metrics::counter!(
            "userdex_request_errors_total",
            "operation" => self.operation(),
            "status" => status.as_str().to_string(),
        )
        .increment(1);

        (status, self.to_string()).into_response()
    }
}
