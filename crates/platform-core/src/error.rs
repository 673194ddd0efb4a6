use rocket::http::Status;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::Request;
use serde::Serialize;

/// Wire error codes from the platform's error taxonomy.
/// -1 success; 1xxx client; 2xxx server; 3xxx state; 4xxx resource limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireCode(pub i32);

pub const CODE_SUCCESS: WireCode = WireCode(-1);
pub const CODE_INVALID_REQUEST: WireCode = WireCode(1000);
pub const CODE_MISSING_FIELD: WireCode = WireCode(1001);
pub const CODE_INVALID_VALUE: WireCode = WireCode(1002);
pub const CODE_UNAUTHORIZED: WireCode = WireCode(1003);
pub const CODE_FORBIDDEN: WireCode = WireCode(1005);
pub const CODE_DATABASE: WireCode = WireCode(2000);
pub const CODE_INTERNAL: WireCode = WireCode(2002);
pub const CODE_UNAVAILABLE: WireCode = WireCode(2003);
pub const CODE_NOT_FOUND: WireCode = WireCode(3000);
pub const CODE_CONFLICT: WireCode = WireCode(3001);
pub const CODE_ARCHIVED: WireCode = WireCode(3002);
pub const CODE_DELETED: WireCode = WireCode(3003);
pub const CODE_RATE_LIMITED: WireCode = WireCode(4000);
pub const CODE_MESSAGE_TOO_LARGE: WireCode = WireCode(4001);
pub const CODE_ATTACHMENT_TOO_LARGE: WireCode = WireCode(4002);
pub const CODE_QUOTA_EXCEEDED: WireCode = WireCode(4003);

/// Error taxonomy shared by all three services. Every route handler returns
/// `Result<T, AppError>` instead of an ad hoc `(Status, Json<Value>)` pair.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("missing field: {0}")]
    MissingField(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("archived: {0}")]
    Archived(String),
    #[error("deleted: {0}")]
    Deleted(String),
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64, limit: usize },
    #[error("message too large: {0}")]
    MessageTooLarge(String),
    #[error("attachment too large: {0}")]
    AttachmentTooLarge(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("dependency unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("internal error")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> Status {
        match self {
            AppError::Validation(_) | AppError::MissingField(_) => Status::BadRequest,
            AppError::Unauthorized(_) => Status::Unauthorized,
            AppError::Forbidden(_) => Status::Forbidden,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Conflict(_) | AppError::Archived(_) | AppError::Deleted(_) => Status::Conflict,
            AppError::RateLimited { .. } => Status::TooManyRequests,
            AppError::MessageTooLarge(_) | AppError::AttachmentTooLarge(_) => Status::PayloadTooLarge,
            AppError::QuotaExceeded(_) => Status::new(422),
            AppError::ServiceUnavailable(_) => Status::ServiceUnavailable,
            AppError::Database(_) | AppError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn code(&self) -> WireCode {
        match self {
            AppError::Validation(_) => CODE_INVALID_REQUEST,
            AppError::MissingField(_) => CODE_MISSING_FIELD,
            AppError::Unauthorized(_) => CODE_UNAUTHORIZED,
            AppError::Forbidden(_) => CODE_FORBIDDEN,
            AppError::NotFound(_) => CODE_NOT_FOUND,
            AppError::Conflict(_) => CODE_CONFLICT,
            AppError::Archived(_) => CODE_ARCHIVED,
            AppError::Deleted(_) => CODE_DELETED,
            AppError::RateLimited { .. } => CODE_RATE_LIMITED,
            AppError::MessageTooLarge(_) => CODE_MESSAGE_TOO_LARGE,
            AppError::AttachmentTooLarge(_) => CODE_ATTACHMENT_TOO_LARGE,
            AppError::QuotaExceeded(_) => CODE_QUOTA_EXCEEDED,
            AppError::ServiceUnavailable(_) => CODE_UNAVAILABLE,
            AppError::Database(_) => CODE_DATABASE,
            AppError::Internal(_) => CODE_INTERNAL,
        }
    }

    /// Internal invariant violations are logged with full context by the
    /// caller before being downgraded to a generic message here — the
    /// caller never leaks implementation detail to the wire.
    pub fn internal_invariant(context: &str) -> Self {
        tracing::error!(context, "internal invariant violation");
        AppError::Internal("internal error".to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for AppError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let code = self.code();
        let retry_after_secs = match &self {
            AppError::RateLimited { retry_after_secs, .. } => Some(*retry_after_secs),
            _ => None,
        };
        let message = self.to_string();
        let body = Json(ErrorBody {
            error: &message,
            code: code.0,
            retry_after_secs,
        });
        let mut response = Response::build_from(body.respond_to(req)?)
            .status(status)
            .finalize();
        if let Some(secs) = retry_after_secs {
            response.set_header(rocket::http::Header::new("Retry-After", secs.to_string()));
        }
        Ok(response)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Database(e.to_string())
    }
}
