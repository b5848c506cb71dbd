use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use crate::app::create_app;
use crate::configs::Settings;

pub mod app;
pub mod configs;
pub mod errors;
pub mod handles;
pub mod services;

pub async fn run(settings: &Arc<Settings>) -> anyhow::Result<()> {
    let app = create_app(settings).await?;

    let ip_addr = settings
        .server
        .host
        .parse::<IpAddr>()
        .with_context(|| format!("invalid server host `{}`", settings.server.host))?;

    let address = SocketAddr::from((ip_addr, settings.server.port));

    let listener = TcpListener::bind(&address).await?;

    tracing::info!("listening on {:?}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
