use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    InternalServerError(String),
    ValidationError(String),
    DatabaseError(sqlx::Error),
    /// Ошибка хранилища, не связанная с SQL (in-memory адаптер, сериализация)
    StoreError(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::DatabaseError(err) => write!(f, "Database Error: {}", err),
            ApiError::StoreError(msg) => write!(f, "Store Error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        match self {
            ApiError::BadRequest(_) => HttpResponse::BadRequest().json(error_response),
            ApiError::NotFound(_) => HttpResponse::NotFound().json(error_response),
            ApiError::Conflict(_) => HttpResponse::Conflict().json(error_response),
            ApiError::ValidationError(_) => HttpResponse::UnprocessableEntity().json(error_response),
            ApiError::DatabaseError(_) => HttpResponse::InternalServerError().json(error_response),
            ApiError::StoreError(_) => HttpResponse::ServiceUnavailable().json(error_response),
            ApiError::InternalServerError(_) => HttpResponse::InternalServerError().json(error_response),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::StoreError(format!("Malformed stored JSON: {}", err))
    }
}

// Специфичные ошибки для модуля обслуживания
impl ApiError {
    pub fn bad_request(msg: &str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }

    pub fn configuration_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Maintenance configuration with ID '{}' not found", id))
    }

    pub fn occurrence_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Maintenance occurrence with ID '{}' not found", id))
    }

    pub fn template_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Maintenance template with ID '{}' not found", id))
    }

    pub fn section_out_of_range(index: usize, total: usize) -> Self {
        ApiError::BadRequest(format!(
            "Section index {} is out of range (result has {} sections)",
            index, total
        ))
    }

    pub fn occurrence_already_completed(id: &str) -> Self {
        ApiError::Conflict(format!("Maintenance occurrence '{}' is already completed", id))
    }

    /// Ошибки хранилища можно повторить; остальные нет
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::DatabaseError(_) | ApiError::StoreError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::configuration_not_found("c1").error_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::occurrence_already_completed("o1").error_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::ValidationError("x".into()).error_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_retryable() {
        assert!(ApiError::StoreError("down".into()).is_retryable());
        assert!(!ApiError::bad_request("nope").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = ApiError::section_out_of_range(4, 3);
        assert_eq!(
            err.to_string(),
            "Bad Request: Section index 4 is out of range (result has 3 sections)"
        );
    }
}
