use std::{collections::BTreeMap, convert::Infallible};

use serde::Serialize;
use serde_json::json;
use warp::{
    http::{header, StatusCode},
    reject::{self, Rejection},
    reply::{self, Reply, Response},
};

use crate::database::error::TypeError;

/// Per-field validation messages, serialized as `{"field": ["message"]}`.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct ValidationError {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn field(&self, field: &str) -> Option<&Vec<String>> {
        self.errors.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        match self.is_empty() {
            true => Ok(value),
            false => Err(self),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ApiError {
    Validation(ValidationError),
    Status { status: StatusCode, detail: String },
}

impl ApiError {
    pub fn new(status: StatusCode, detail: &str) -> Self {
        Self::Status {
            status,
            detail: detail.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Status { status, .. } => *status,
        }
    }

    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation(errors) => json_response(&errors, status),
            ApiError::Status { detail, .. } => json_response(&json!({ "detail": detail }), status),
        }
    }
}

impl reject::Reject for ApiError {}

impl From<potion::Error> for ApiError {
    fn from(value: potion::Error) -> Self {
        let status =
            StatusCode::from_u16(value.code as u16).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Server side details stay in the log.
        let detail = match status.is_server_error() {
            true => String::from("Internal server error."),
            false => value
                .info
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Error").to_string()),
        };

        Self::Status { status, detail }
    }
}

impl From<ValidationError> for ApiError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<TypeError> for ApiError {
    fn from(value: TypeError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, value.info())
    }
}

impl From<ApiError> for Rejection {
    fn from(value: ApiError) -> Self {
        reject::custom(value)
    }
}

pub trait OrReject<T> {
    fn or_reject(self) -> Result<T, Rejection>;
}

impl<T, E: Into<ApiError>> OrReject<T> for Result<T, E> {
    fn or_reject(self) -> Result<T, Rejection> {
        self.map_err(|e| reject::custom(e.into()))
    }
}

pub fn json_response<T: Serialize>(value: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(value), status).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub fn attachment(body: String, filename: &str) -> Response {
    let response = reply::with_header(body, header::CONTENT_TYPE, "text/plain; charset=utf-8");
    reply::with_header(
        response,
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{filename}\""),
    )
    .into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<ApiError>() {
        return Ok(e.clone().into_response());
    }

    let e = if err.is_not_found() {
        ApiError::new(StatusCode::NOT_FOUND, "Not found.")
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        ApiError::new(StatusCode::BAD_REQUEST, &format!("Malformed request body: {e}"))
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large.")
    } else if err.find::<reject::UnsupportedMediaType>().is_some() {
        ApiError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Expected a JSON body.")
    } else if err.find::<reject::LengthRequired>().is_some() {
        ApiError::new(StatusCode::LENGTH_REQUIRED, "Content length required.")
    } else if err.find::<reject::InvalidQuery>().is_some() {
        ApiError::new(StatusCode::BAD_REQUEST, "Malformed query string.")
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.")
    } else {
        log::error!("Unhandled rejection: {err:?}");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    };

    Ok(e.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn potion_errors_keep_their_status() {
        let e = ApiError::from(crate::database::error::forbidden("No."));
        assert_eq!(e.status(), StatusCode::FORBIDDEN);

        let e = ApiError::from(potion::Error {
            code: 500,
            info: Some(String::from("connection refused")),
            redirect: None,
        });
        match e {
            ApiError::Status { status, detail } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(detail, "Internal server error.");
            }
            _ => panic!("expected a status error"),
        }
    }

    #[test]
    fn rendered_errors_carry_their_status() {
        let response = ApiError::from(ValidationError::single("name", "Required.")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::from(crate::database::error::not_found("Gone.")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_errors_group_by_field() {
        let mut errors = ValidationError::new();
        errors.add("tags", "first");
        errors.add("tags", "second");
        errors.add("name", "third");

        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({ "name": ["third"], "tags": ["first", "second"] })
        );
        assert!(errors.into_result(()).is_err());
        assert!(ValidationError::new().into_result(()).is_ok());
    }
}
