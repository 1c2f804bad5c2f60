use log::{error, info, warn};
use mimalloc::MiMalloc;
use std::net::{IpAddr, TcpListener};
use std::sync::Arc;

use photo_session::annotation::{FrameAnnotator, TextOverlay};
use photo_session::config::Config;
use photo_session::error_channel::ErrorChannel;
use photo_session::file_camera::StillFileCamera;
use photo_session::geocoder::NominatimGeocoder;
use photo_session::location::{FixedGeolocation, GeolocationProvider, LocationResolver};
use photo_session::media::DeviceMediaManager;
use photo_session::photo_store::PhotoStore;
use photo_session::routes::build_routes;
use photo_session::session_controller::SessionController;
use photo_session::share_dir::DirectoryShareTarget;
use photo_session::sharing::{ShareTarget, SharingGateway};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_env()?;
    let port = config.port;
    let host: IpAddr = config.host.parse()?;

    info!("Starting photo session server on {}:{}", host, port);
    info!("Database: {}", config.db_path);
    info!("Cameras: {:?}", config.cameras);

    // Check if port is available BEFORE initializing services
    if !is_port_available(host, port) {
        error!(
            "Port {} is already in use. Please stop any existing photo-session instance or use a different port.",
            port
        );
        error!("You can check what's using the port with: lsof -i :{}", port);
        return Err(format!("Port {} is already in use", port).into());
    }

    let controller = Arc::new(initialize_services(&config).await?);
    let routes = build_routes(controller);

    info!(
        "Server started successfully, listening on http://{}:{}",
        host, port
    );

    warp::serve(routes)
        .bind_with_graceful_shutdown((host, port), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .1
        .await;

    Ok(())
}

fn is_port_available(host: IpAddr, port: u16) -> bool {
    TcpListener::bind((host, port)).is_ok()
}

async fn initialize_services(
    config: &Config,
) -> Result<SessionController, Box<dyn std::error::Error>> {
    let store = PhotoStore::open(&config.db_path).await?;
    info!("Photo database initialized successfully");

    let font_path = TextOverlay::locate_font(config.font_path.as_deref()).ok_or(
        "No overlay font found; set PHOTO_SESSION_FONT_PATH to a TrueType font",
    )?;
    let annotator: Arc<dyn FrameAnnotator> = Arc::new(TextOverlay::from_file(&font_path)?);

    if config.cameras.is_empty() {
        warn!("No cameras configured, session start will be denied");
    }
    let media = Arc::new(DeviceMediaManager::new(Arc::new(StillFileCamera::new(
        config.cameras.clone(),
    ))));

    let provider = config.fixed_position.map(|position| {
        info!(
            "Using fixed position {}, {}",
            position.latitude, position.longitude
        );
        Arc::new(FixedGeolocation::new(position)) as Arc<dyn GeolocationProvider>
    });
    if provider.is_none() {
        warn!("No position configured, session start will fail with geolocation unsupported");
    }
    let geocoder = NominatimGeocoder::new(
        &config.geocoder.url,
        &config.geocoder.user_agent,
        config.geocoder.timeout,
    );
    let location = Arc::new(LocationResolver::new(
        provider,
        Arc::new(geocoder),
        config.location_timeout,
        config.geocoder.timeout,
    ));

    let share_target = config.share_dir.as_ref().map(|dir| {
        info!("Shared photos are exported to {}", dir.display());
        Arc::new(DirectoryShareTarget::new(dir)) as Arc<dyn ShareTarget>
    });
    let sharing = SharingGateway::new(store.clone(), share_target);

    Ok(SessionController::new(
        store,
        media,
        location,
        annotator,
        sharing,
        ErrorChannel::new(),
    ))
}
