use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, RepositoryError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(err) => domain_error_to_api(err),
            ApplicationError::Repository(repo_err) => match repo_err {
                RepositoryError::NotFound => ApiError::new(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "requested resource not found",
                ),
                RepositoryError::Conflict => {
                    ApiError::new(StatusCode::CONFLICT, "CONFLICT", "resource already exists")
                }
                RepositoryError::Storage { message } => {
                    // 存储层故障不外泄细节
                    tracing::error!(error = %message, "storage failure");
                    ApiError::new(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "DATABASE_ERROR",
                        "internal storage error",
                    )
                }
            },
            ApplicationError::Infrastructure(message) => {
                tracing::error!(error = %message, "infrastructure failure");
                ApiError::internal_server_error("internal error")
            }
        }
    }
}

fn domain_error_to_api(err: DomainError) -> ApiError {
    let message = err.to_string();
    match err {
        DomainError::InvalidInput { .. } => {
            ApiError::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
        }
        DomainError::RoomNotFound => {
            ApiError::new(StatusCode::NOT_FOUND, "ROOM_NOT_FOUND", message)
        }
        DomainError::UserNotFound => {
            ApiError::new(StatusCode::NOT_FOUND, "USER_NOT_FOUND", message)
        }
        DomainError::MessageNotFound => {
            ApiError::new(StatusCode::NOT_FOUND, "MESSAGE_NOT_FOUND", message)
        }
        DomainError::InvitationNotFound => {
            ApiError::new(StatusCode::NOT_FOUND, "INVITATION_NOT_FOUND", message)
        }
        DomainError::NotMember => {
            ApiError::new(StatusCode::FORBIDDEN, "NOT_ROOM_MEMBER", message)
        }
        DomainError::InsufficientPermissions => ApiError::new(
            StatusCode::FORBIDDEN,
            "INSUFFICIENT_PERMISSIONS",
            message,
        ),
        DomainError::DuplicateName => {
            ApiError::new(StatusCode::CONFLICT, "DUPLICATE_NAME", message)
        }
        DomainError::DuplicatePending => {
            ApiError::new(StatusCode::CONFLICT, "DUPLICATE_PENDING", message)
        }
        DomainError::AlreadyMember => {
            ApiError::new(StatusCode::CONFLICT, "ALREADY_MEMBER", message)
        }
        DomainError::AccountBanned => {
            ApiError::new(StatusCode::FORBIDDEN, "ACCOUNT_BANNED", message)
        }
        DomainError::AuthenticationFailed => {
            ApiError::new(StatusCode::UNAUTHORIZED, "AUTHENTICATION_FAILED", message)
        }
        DomainError::AlreadyResolved => {
            ApiError::new(StatusCode::CONFLICT, "ALREADY_RESOLVED", message)
        }
        DomainError::AlreadyDeleted => {
            ApiError::new(StatusCode::BAD_REQUEST, "ALREADY_DELETED", message)
        }
        DomainError::CannotLeaveGlobal => {
            ApiError::new(StatusCode::BAD_REQUEST, "CANNOT_LEAVE_GLOBAL", message)
        }
        DomainError::CannotDeleteGlobal => {
            ApiError::new(StatusCode::BAD_REQUEST, "CANNOT_DELETE_GLOBAL", message)
        }
        DomainError::OwnerMustTransferOrDelete => ApiError::new(
            StatusCode::FORBIDDEN,
            "OWNER_MUST_TRANSFER_OR_DELETE",
            message,
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
