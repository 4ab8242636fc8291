//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Domain failures from
//! `portico_core` convert into `AppError` first, so every status code and body shape is
//! decided in one place.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use portico_core::{AppError, ErrorMetadata, LogLevel};
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Suggested action for the client (e.g., "Wait 60s and retry")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rule: `IntoResponse` and `AppError` are both foreign here)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<portico_core::access::ContextError> for HttpAppError {
    fn from(err: portico_core::access::ContextError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<portico_core::access::AccessDenial> for HttpAppError {
    fn from(err: portico_core::access::AccessDenial) -> Self {
        HttpAppError(err.into())
    }
}

impl From<portico_core::access::ApiKeyAuthError> for HttpAppError {
    fn from(err: portico_core::access::ApiKeyAuthError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<portico_core::access::InvitationError> for HttpAppError {
    fn from(err: portico_core::access::InvitationError) -> Self {
        HttpAppError(err.into())
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that answers deserialization failures with a 400 `ErrorResponse`.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = ?error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|env| matches!(env.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

fn error_body(app_error: &AppError, include_details: bool) -> ErrorResponse {
    let (details, error_type) = if include_details {
        (
            Some(app_error.detailed_message()),
            Some(app_error.error_type().to_string()),
        )
    } else {
        (None, None)
    };

    ErrorResponse {
        error: app_error.client_message(),
        details,
        error_type,
        code: app_error.error_code().to_string(),
        recoverable: app_error.is_recoverable(),
        suggested_action: app_error.suggested_action().map(String::from),
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        // Details never leave the process in production or for sensitive errors.
        let include_details = !is_production_env() && !app_error.is_sensitive();
        let mut response = (status, Json(error_body(app_error, include_details))).into_response();

        if let AppError::RateLimited { retry_after_secs } = app_error {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
