pub mod auth;
pub mod bridge;
pub mod chats;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod images;
pub mod presence;
pub mod session;
pub mod users;
pub mod ws;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::FromRef,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::error;

use crate::{
    auth::Verifier,
    bridge::Bridge,
    config::Config,
    dispatch::Dispatcher,
    error::{AuthError, ChatError},
    images::ImageStore,
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub verifier: Arc<Verifier>,
    pub hub: Arc<Dispatcher>,
    pub bridge: Bridge,
    pub images: Arc<dyn ImageStore>,
}

pub fn app(app_state: AppState, config: &Config) -> Router {
    let origin = match config
        .frontend_url
        .as_deref()
        .and_then(|url| HeaderValue::from_str(url).ok())
    {
        Some(url) => AllowOrigin::exact(url),
        None => AllowOrigin::mirror_request(),
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/ws", get(ws::chat_ws))
        .route("/presence", get(users::online_count))
        .nest("/chats", chats::router(config.max_upload_bytes))
        .nest("/users", users::router())
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Body shape for every HTTP response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> ApiResponse<T> {
        ApiResponse {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<ChatError>() {
            err.status()
        } else if let Some(err) = self.0.downcast_ref::<AuthError>() {
            err.status()
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = ?self.0, "request failed");
            "Internal server error".to_owned()
        } else {
            self.0.to_string()
        };

        (status, ApiResponse::failure(message)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
