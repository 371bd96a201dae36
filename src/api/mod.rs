//! REST surface consumed by the front-ends. Served over TCP, optionally
//! guarded by a bearer token, and over a root-only Unix socket.
pub mod auth;
pub mod image;
pub mod routes;

use std::{
    fs,
    net::{IpAddr, Ipv4Addr},
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use thiserror::Error;
use tokio::net::{TcpListener, UnixListener};

use crate::config::{profile::ProfileStore, state::State, HttpConfig, LoadError};

/// Protocol revision reported by `/api/v1/version`
pub const API_VERSION: u32 = 5;
pub const SOCKET_PATH: &str = "/run/hhd/api";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Authentication is on and you did not supply the proper bearer token.")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Config(#[from] LoadError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, header) = match &self {
            ApiError::BadRequest(_) | ApiError::Config(_) => {
                (StatusCode::BAD_REQUEST, "Handheld Daemon Error:")
            }
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Handheld Daemon Error:"),
            ApiError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "Handheld Daemon Error (404, invalid endpoint):",
            ),
        };
        // Keep control characters out of the response
        let message: String = self
            .to_string()
            .chars()
            .filter(|c| !c.is_control() || *c == '\n')
            .collect();
        (status, format!("{header}\n{message}")).into_response()
    }
}

/// Shared state of the handlers
#[derive(Debug, Clone)]
pub struct ApiState {
    pub state: State,
    pub profiles: ProfileStore,
    /// Steam library cache with the game artwork
    pub images: Option<PathBuf>,
}

impl ApiState {
    pub fn new(state: State, profiles: ProfileStore, images: Option<PathBuf>) -> Self {
        Self {
            state,
            profiles,
            images,
        }
    }
}

/// Build the router. Requests must carry `token` when one is given.
pub fn router(api: ApiState, token: Option<String>) -> Router {
    let app = Router::new()
        .route("/api/v1/version", get(routes::version))
        .route("/api/v1/settings", get(routes::settings))
        .route("/api/v1/state", get(routes::get_state).post(routes::post_state))
        .route("/api/v1/sections", get(routes::sections))
        .route("/api/v1/profile/list", get(routes::list_profiles))
        .route("/api/v1/profile/get", get(routes::get_profile))
        .route("/api/v1/profile/set", post(routes::set_profile))
        .route("/api/v1/profile/del", delete(routes::delete_profile))
        .route("/api/v1/profile/apply", post(routes::apply_profile))
        .route("/api/v1/image/{game}/{kind}", get(image::get_image))
        .fallback(routes::not_found)
        .with_state(api);

    match token.filter(|t| !t.is_empty()) {
        Some(token) => app.layer(middleware::from_fn_with_state(
            Arc::<str>::from(token),
            auth::require_token,
        )),
        None => app,
    }
}

/// Serve the API over TCP until the listener fails
pub async fn serve_tcp(api: ApiState, config: &HttpConfig) -> std::io::Result<()> {
    let ip: IpAddr = if config.localhost {
        Ipv4Addr::LOCALHOST.into()
    } else {
        Ipv4Addr::UNSPECIFIED.into()
    };
    let listener = TcpListener::bind((ip, config.port)).await?;
    log::info!(
        "Serving API on http://{ip}:{} (auth: {})",
        config.port,
        config.token.is_some()
    );
    axum::serve(listener, router(api, config.token.clone())).await
}

/// Serve the API without authentication on a Unix socket. Its directory
/// is only accessible by the owner.
pub async fn serve_unix(api: ApiState, path: &Path) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    if path.exists() {
        fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    log::info!("Serving API on {path:?}");
    axum::serve(listener, router(api, None)).await
}
