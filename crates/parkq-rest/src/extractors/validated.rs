//! Validated JSON extractor for automatic request validation.
//!
//! Deserializes the body and runs the `validator` rules on it. Malformed
//! JSON and failed rules are both reported as 400 Bad Request; the latter
//! carries field-level details.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parkq_core::{field_errors, ErrorResponse};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

/// JSON extractor that validates the deserialized value.
///
/// # Example
///
/// ```ignore
/// use parkq_rest::extractors::ValidatedJson;
/// use validator::Validate;
///
/// #[derive(Deserialize, Validate)]
/// struct RegisterRequest {
///     #[validate(custom(function = "parkq_core::rules::not_blank"))]
///     client_id: String,
/// }
///
/// async fn register(ValidatedJson(request): ValidatedJson<RegisterRequest>) {
///     // request is guaranteed to be valid here
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T> std::ops::Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Rejection type for validated JSON extraction.
#[derive(Debug)]
pub enum ValidatedJsonRejection {
    /// JSON parsing/deserialization error.
    JsonError(JsonRejection),
    /// Validation error with field-level details.
    ValidationError(ValidationErrors),
}

impl IntoResponse for ValidatedJsonRejection {
    fn into_response(self) -> Response {
        let error_response = match self {
            Self::JsonError(rejection) => ErrorResponse {
                code: "INVALID_JSON".to_string(),
                message: format!("Invalid JSON: {}", rejection.body_text()),
                details: None,
            },
            Self::ValidationError(errors) => ErrorResponse {
                code: "VALIDATION_ERROR".to_string(),
                message: "Request validation failed".to_string(),
                details: None,
            }
            .with_details(field_errors(&errors)),
        };
        (StatusCode::BAD_REQUEST, Json(error_response)).into_response()
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ValidatedJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidatedJsonRejection::JsonError)?;

        value
            .validate()
            .map_err(ValidatedJsonRejection::ValidationError)?;

        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct TestRequest {
        #[serde(default)]
        #[validate(custom(function = "parkq_core::rules::not_blank"))]
        client_id: String,
    }

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn rejection_body(rejection: ValidatedJsonRejection) -> (StatusCode, ErrorResponse) {
        let response = rejection.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_valid_request_passes() {
        let ValidatedJson(request) =
            ValidatedJson::<TestRequest>::from_request(json_request(r#"{"client_id":"w1"}"#), &())
                .await
                .unwrap();
        assert_eq!(request.client_id, "w1");
    }

    #[tokio::test]
    async fn test_blank_field_is_validation_error() {
        let rejection =
            ValidatedJson::<TestRequest>::from_request(json_request(r#"{"client_id":"  "}"#), &())
                .await
                .unwrap_err();

        let (status, body) = rejection_body(rejection).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert_eq!(body.details.unwrap()[0].field, "client_id");
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let rejection = ValidatedJson::<TestRequest>::from_request(json_request("{"), &())
            .await
            .unwrap_err();

        let (status, body) = rejection_body(rejection).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "INVALID_JSON");
    }
}
