use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Typed application error. Every failure a handler can produce is one of
/// these kinds; anything else is coerced to `Internal` with its detail
/// logged server-side and stripped from the client response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("An unexpected error occurred")]
    Internal,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Validation error with a field-level detail entry.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut details = serde_json::Map::new();
        details.insert(field.to_string(), Value::String(message.clone()));
        Self::Validation {
            message,
            details: Some(Value::Object(details)),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{} not found", what))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Auth(_) => "AUTHENTICATION_ERROR",
            Self::Forbidden(_) => "AUTHORIZATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Serializable error parts carried through response extensions so the
/// envelope middleware can stamp in the request path.
#[derive(Debug, Clone)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub status: u16,
    pub details: Option<Value>,
}

pub fn envelope(body: &ErrorBody, path: &str) -> Value {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    let mut inner = json!({
        "code": body.code,
        "message": body.message,
        "statusCode": body.status,
        "timestamp": timestamp,
        "path": path,
    });
    if let Some(details) = &body.details {
        inner["details"] = details.clone();
    }
    json!({ "error": inner })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
            status: self.status().as_u16(),
            details: match &self {
                Self::Validation { details, .. } => details.clone(),
                _ => None,
            },
        };
        // Fallback body without path; the envelope layer rewrites it.
        let mut res = (self.status(), Json(envelope(&body, ""))).into_response();
        res.extensions_mut().insert(body);
        res
    }
}

/// Rewrites error responses with the request path filled into the envelope.
pub async fn error_envelope(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let mut res = next.run(req).await;
    let status = res.status();
    if let Some(body) = res.extensions_mut().remove::<ErrorBody>() {
        return (status, Json(envelope(&body, &path))).into_response();
    }
    res
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::not_found("Resource"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::conflict("A record with this unique value already exists")
            }
            _ => {
                error!(error = %err, "database error");
                Self::Internal
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = %err, "unexpected error");
        Self::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_code_mapping() {
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::auth("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Internal.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::Internal.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn envelope_shape() {
        let body = ErrorBody {
            code: "NOT_FOUND",
            message: "Post not found".into(),
            status: 404,
            details: None,
        };
        let value = envelope(&body, "/api/v1/posts/missing");
        let error = &value["error"];
        assert_eq!(error["code"], "NOT_FOUND");
        assert_eq!(error["message"], "Post not found");
        assert_eq!(error["statusCode"], 404);
        assert_eq!(error["path"], "/api/v1/posts/missing");
        assert!(error["timestamp"].is_string());
        assert!(error.get("details").is_none());
    }

    #[test]
    fn envelope_includes_field_details() {
        let err = ApiError::field("email", "Invalid email");
        let details = match &err {
            ApiError::Validation { details, .. } => details.clone(),
            _ => None,
        };
        let body = ErrorBody {
            code: err.code(),
            message: err.to_string(),
            status: err.status().as_u16(),
            details,
        };
        let value = envelope(&body, "/api/v1/auth/register");
        assert_eq!(value["error"]["details"]["email"], "Invalid email");
    }

    #[test]
    fn sqlx_row_not_found_maps_to_404() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_message_is_generic() {
        let err: ApiError = anyhow::anyhow!("secret detail: db password").into();
        assert_eq!(err.to_string(), "An unexpected error occurred");
    }
}
