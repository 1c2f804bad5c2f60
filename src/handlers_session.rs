use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use warp::{reject, Filter, Rejection, Reply};

use crate::media::DeviceDescriptor;
use crate::session_controller::SessionController;
use crate::warp_helpers::{with_controller, DatabaseError, OperationError, ValidationError};

#[derive(Debug, Default, Deserialize)]
pub struct SwitchCameraRequest {
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SwitchCameraResponse {
    pub switched: bool,
    pub camera: Option<DeviceDescriptor>,
}

pub async fn get_session(controller: Arc<SessionController>) -> Result<impl Reply, Rejection> {
    match controller.status().await {
        Ok(status) => Ok(warp::reply::json(&status)),
        Err(e) => {
            log::error!("Failed to read session status: {}", e);
            Err(reject::custom(DatabaseError {
                message: format!("Database error: {}", e),
            }))
        }
    }
}

pub async fn start_session(controller: Arc<SessionController>) -> Result<impl Reply, Rejection> {
    controller
        .start_session()
        .await
        .map_err(|e| OperationError::rejection(e.kind(), e.to_string()))?;

    Ok(warp::reply::json(&json!({ "state": controller.state() })))
}

pub async fn capture_photo(controller: Arc<SessionController>) -> Result<impl Reply, Rejection> {
    let id = controller
        .capture_photo()
        .await
        .map_err(|e| OperationError::rejection(e.kind(), e.to_string()))?;

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "id": id })),
        warp::http::StatusCode::CREATED,
    ))
}

pub async fn end_session(controller: Arc<SessionController>) -> Result<impl Reply, Rejection> {
    let archived = controller
        .end_session()
        .await
        .map_err(|e| OperationError::rejection(e.kind(), e.to_string()))?;

    Ok(warp::reply::json(&json!({
        "state": controller.state(),
        "archived": archived
    })))
}

pub async fn switch_camera(
    request: SwitchCameraRequest,
    controller: Arc<SessionController>,
) -> Result<impl Reply, Rejection> {
    let camera = controller
        .switch_camera(request.device_id.as_deref())
        .await
        .map_err(|e| OperationError::rejection(e.kind(), e.to_string()))?;

    Ok(warp::reply::json(&SwitchCameraResponse {
        switched: camera.is_some(),
        camera,
    }))
}

pub async fn list_cameras(controller: Arc<SessionController>) -> Result<impl Reply, Rejection> {
    let cameras = controller
        .list_cameras()
        .await
        .map_err(|e| OperationError::rejection(e.kind(), e.to_string()))?;

    Ok(warp::reply::json(&cameras))
}

pub fn build_session_routes(
    controller: Arc<SessionController>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let api_session = warp::path("api")
        .and(warp::path("session"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_controller(controller.clone()))
        .and_then(get_session);

    let api_session_start = warp::path("api")
        .and(warp::path("session"))
        .and(warp::path("start"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_controller(controller.clone()))
        .and_then(start_session);

    let api_session_capture = warp::path("api")
        .and(warp::path("session"))
        .and(warp::path("capture"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_controller(controller.clone()))
        .and_then(capture_photo);

    let api_session_end = warp::path("api")
        .and(warp::path("session"))
        .and(warp::path("end"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_controller(controller.clone()))
        .and_then(end_session);

    // An empty body switches to the back camera
    let switch_request = warp::body::bytes().and_then(|body: warp::hyper::body::Bytes| async move {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(SwitchCameraRequest::default());
        }
        serde_json::from_slice::<SwitchCameraRequest>(&body).map_err(|e| {
            reject::custom(ValidationError {
                message: format!("Invalid switch request: {}", e),
            })
        })
    });

    let api_camera_switch = warp::path("api")
        .and(warp::path("session"))
        .and(warp::path("camera"))
        .and(warp::path("switch"))
        .and(warp::path::end())
        .and(warp::post())
        .and(switch_request)
        .and(with_controller(controller.clone()))
        .and_then(switch_camera);

    let api_cameras = warp::path("api")
        .and(warp::path("cameras"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_controller(controller))
        .and_then(list_cameras);

    api_session
        .or(api_session_start)
        .or(api_session_capture)
        .or(api_session_end)
        .or(api_camera_switch)
        .or(api_cameras)
}
