use serde_json::json;
use std::convert::Infallible;
use warp::{reject, Filter, Rejection, Reply};

use crate::models::Partition;
use crate::photo_store::{PhotoStore, StoreError};
use crate::warp_helpers::{with_store, DatabaseError};

pub async fn health_check() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Ready once both partitions answer a query
pub async fn ready_check(store: PhotoStore) -> Result<impl Reply, Rejection> {
    let counts = async {
        let session = store.count(Partition::Session).await?;
        let archive = store.count(Partition::Archive).await?;
        Ok::<_, StoreError>((session, archive))
    };

    match counts.await {
        Ok((session_photos, archived_photos)) => Ok(warp::reply::json(&json!({
            "status": "ready",
            "database": "connected",
            "session_photos": session_photos,
            "archived_photos": archived_photos,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))),
        Err(e) => {
            log::error!("Photo store is not ready: {}", e);
            Err(reject::custom(DatabaseError {
                message: format!("Photo store unavailable: {}", e),
            }))
        }
    }
}

pub fn build_health_routes(
    store: PhotoStore,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check);

    let ready = warp::path("ready")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_store(store))
        .and_then(ready_check);

    health.or(ready)
}
