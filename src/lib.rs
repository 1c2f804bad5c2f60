pub mod annotation;
pub mod capture_session;
pub mod config;
pub mod db_pool;
pub mod db_schema;
pub mod error_channel;
pub mod error_kind;
pub mod file_camera;
pub mod geocoder;
pub mod handlers_health;
pub mod handlers_photo;
pub mod handlers_session;
pub mod location;
pub mod media;
pub mod models;
pub mod photo_store;
pub mod routes;
pub mod session_controller;
pub mod share_dir;
pub mod sharing;
pub mod warp_helpers;

#[cfg(test)]
mod test_support;
