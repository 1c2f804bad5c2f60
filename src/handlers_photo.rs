use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use warp::{reject, Filter, Rejection, Reply};

use crate::models::Partition;
use crate::session_controller::SessionController;
use crate::warp_helpers::{with_controller, NotFoundError, OperationError};

fn parse_partition(name: &str) -> Result<Partition, Rejection> {
    Partition::from_str(name).map_err(|_| {
        reject::custom(NotFoundError {
            message: format!("Unknown photo partition '{}'", name),
        })
    })
}

pub async fn list_photos(
    partition: String,
    controller: Arc<SessionController>,
) -> Result<impl Reply, Rejection> {
    let partition = parse_partition(&partition)?;
    let photos = controller
        .list_photos(partition)
        .await
        .map_err(|e| OperationError::rejection(e.kind(), e.to_string()))?;

    Ok(warp::reply::json(&json!({
        "partition": partition,
        "total": photos.len(),
        "photos": photos
    })))
}

pub async fn get_photo_image(
    partition: String,
    id: i64,
    controller: Arc<SessionController>,
) -> Result<Box<dyn Reply>, Rejection> {
    let partition = parse_partition(&partition)?;
    let image_data = match controller.photo_image(partition, id).await {
        Ok(Some(image_data)) => image_data,
        Ok(None) => {
            return Err(reject::custom(NotFoundError {
                message: format!("Photo {} not found in {}", id, partition),
            }))
        }
        Err(e) => {
            log::error!("Database error: {}", e);
            return Err(OperationError::rejection(e.kind(), e.to_string()));
        }
    };

    let reply = warp::reply::with_header(image_data, "content-type", "image/png");
    // Ids are never reused, so an id always names the same image
    let reply = warp::reply::with_header(reply, "cache-control", "private, max-age=31536000");

    Ok(Box::new(reply))
}

pub async fn delete_session_photos(
    controller: Arc<SessionController>,
) -> Result<impl Reply, Rejection> {
    let deleted = controller
        .delete_session_photos()
        .await
        .map_err(|e| OperationError::rejection(e.kind(), e.to_string()))?;

    Ok(warp::reply::json(&json!({ "deleted": deleted })))
}

pub async fn share_session_photos(
    controller: Arc<SessionController>,
) -> Result<impl Reply, Rejection> {
    let shared = controller
        .share_session_photos()
        .await
        .map_err(|e| OperationError::rejection(e.kind(), e.to_string()))?;

    Ok(warp::reply::json(&json!({ "shared": shared })))
}

pub fn build_photo_routes(
    controller: Arc<SessionController>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let api_session_photos_delete = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path("session"))
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_controller(controller.clone()))
        .and_then(delete_session_photos);

    let api_session_photos_share = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path("session"))
        .and(warp::path("share"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_controller(controller.clone()))
        .and_then(share_session_photos);

    let api_photos_list = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_controller(controller.clone()))
        .and_then(list_photos);

    let api_photo_image = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path::param::<String>())
        .and(warp::path::param::<i64>())
        .and(warp::path("image"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_controller(controller))
        .and_then(get_photo_image);

    api_session_photos_delete
        .or(api_session_photos_share)
        .or(api_photos_list)
        .or(api_photo_image)
}
