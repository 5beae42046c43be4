use std::sync::Arc;

use anyhow::Context;
use campus_chat::{
    AppState,
    auth::Verifier,
    bridge::{self, Bridge},
    config::Config,
    db,
    dispatch::Dispatcher,
    images::HttpImageStore,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "campus_chat=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db_pool = db::connect(&config.database_url)
        .await
        .context("opening database")?;
    db::migrate(&db_pool).await.context("creating schema")?;

    let hub = Arc::new(Dispatcher::default());
    let (bridge, facts) = Bridge::channel(config.bridge_capacity);
    tokio::spawn(bridge::run(facts, hub.clone()));

    let app_state = AppState {
        db_pool,
        verifier: Arc::new(Verifier::new(&config.jwt_secret, config.auth_mode, config.auth_cookie.clone())),
        hub,
        bridge,
        images: Arc::new(HttpImageStore::new(
            config.image_upload_url.clone(),
            config.image_upload_key.clone(),
        )),
    };

    let app = campus_chat::app(app_state, &config);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, auth_mode = %config.auth_mode, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
