use crate::error_kind::ErrorKind;
use crate::photo_store::PhotoStore;
use crate::session_controller::SessionController;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

use warp::http::StatusCode;
use warp::{reject, Filter, Rejection, Reply};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub code: u16,
    pub timestamp: String,
}

#[derive(Debug)]
pub struct DatabaseError {
    pub message: String,
}

impl reject::Reject for DatabaseError {}

#[derive(Debug)]
pub struct NotFoundError {
    pub message: String,
}

impl reject::Reject for NotFoundError {}

#[derive(Debug)]
pub struct ValidationError {
    pub message: String,
}

impl reject::Reject for ValidationError {}

/// A failed session operation, classified by its error kind
#[derive(Debug)]
pub struct OperationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl reject::Reject for OperationError {}

impl OperationError {
    pub fn rejection(kind: ErrorKind, message: impl Into<String>) -> Rejection {
        reject::custom(OperationError {
            kind,
            message: message.into(),
        })
    }
}

pub fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::Unsupported => StatusCode::NOT_IMPLEMENTED,
        ErrorKind::NoPhotos => StatusCode::NOT_FOUND,
        ErrorKind::PositionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::LocationTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::StorageUnavailable
        | ErrorKind::TransactionFailed
        | ErrorKind::CaptureFailed
        | ErrorKind::SessionEndFailed
        | ErrorKind::SwitchFailed
        | ErrorKind::ShareFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn with_store(
    store: PhotoStore,
) -> impl Filter<Extract = (PhotoStore,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

pub fn with_controller(
    controller: Arc<SessionController>,
) -> impl Filter<Extract = (Arc<SessionController>,), Error = Infallible> + Clone {
    warp::any().map(move || controller.clone())
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;
    let mut kind = None;
    let timestamp = chrono::Utc::now().to_rfc3339();

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(operation_error) = err.find::<OperationError>() {
        code = status_for_kind(operation_error.kind);
        message = operation_error.message.clone();
        kind = Some(operation_error.kind);
    } else if let Some(database_error) = err.find::<DatabaseError>() {
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = database_error.message.clone();
    } else if let Some(not_found) = err.find::<NotFoundError>() {
        code = StatusCode::NOT_FOUND;
        message = not_found.message.clone();
    } else if let Some(validation_error) = err.find::<ValidationError>() {
        code = StatusCode::BAD_REQUEST;
        message = validation_error.message.clone();
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        code = StatusCode::BAD_REQUEST;
        message = "Invalid request body".to_string();
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        code = StatusCode::PAYLOAD_TOO_LARGE;
        message = "Payload too large".to_string();
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        code = StatusCode::UNSUPPORTED_MEDIA_TYPE;
        message = "Unsupported media type".to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method not allowed".to_string();
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal server error".to_string();
    }

    let error_response = ErrorResponse {
        error: message,
        kind,
        code: code.as_u16(),
        timestamp,
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&error_response),
        code,
    ))
}

pub fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
}
