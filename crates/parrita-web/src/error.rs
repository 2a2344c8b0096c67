use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};

/// JSON API error type for all endpoints.
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// When set, emitted both as a `Retry-After` header and a `retryAfter`
    /// body field (seconds).
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
            retry_after_secs: None,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
            retry_after_secs: None,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
            retry_after_secs: None,
        }
    }

    pub fn too_many_requests(msg: impl Into<String>, retry_after_secs: u64) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: msg.into(),
            retry_after_secs: Some(retry_after_secs),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.retry_after_secs {
            Some(secs) => serde_json::json!({ "error": self.message, "retryAfter": secs }),
            None => serde_json::json!({ "error": self.message }),
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("retry-after", value);
            }
        }
        response
    }
}

impl From<parrita_core::ParritaError> for ApiError {
    fn from(err: parrita_core::ParritaError) -> Self {
        use parrita_core::ParritaError;
        match &err {
            ParritaError::NotFound(_) => Self::not_found(err.to_string()),
            ParritaError::InvalidInput(_) => Self::bad_request(err.to_string()),
            // Quota and billing codes pass through with stable user-facing
            // messages; the upstream detail stays in the log.
            ParritaError::Gateway { status: 429, .. } => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: "Trop de requêtes, réessayez dans un instant.".into(),
                retry_after_secs: None,
            },
            ParritaError::Gateway { status: 402, .. } => Self {
                status: StatusCode::PAYMENT_REQUIRED,
                message: "Service temporairement indisponible.".into(),
                retry_after_secs: None,
            },
            ParritaError::Gateway { status, .. } => {
                tracing::error!("gateway error {status}: {err}");
                Self::internal("AI gateway error")
            }
            _ => {
                tracing::error!("api error: {err}");
                Self::internal(err.to_string())
            }
        }
    }
}
