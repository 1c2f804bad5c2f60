use std::sync::Arc;
use warp::Filter;

use crate::handlers_health::build_health_routes;
use crate::handlers_photo::build_photo_routes;
use crate::handlers_session::build_session_routes;
use crate::session_controller::SessionController;
use crate::warp_helpers::{cors, handle_rejection};

/// Every route of the service, with the shared rejection handler
pub fn build_routes(
    controller: Arc<SessionController>,
) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
    let health_routes = build_health_routes(controller.store().clone());
    let session_routes = build_session_routes(controller.clone());
    let photo_routes = build_photo_routes(controller);

    health_routes
        .or(session_routes)
        .or(photo_routes)
        .with(cors())
        .with(warp::log("photo_session"))
        .recover(handle_rejection)
}
