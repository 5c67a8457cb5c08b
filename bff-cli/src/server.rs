// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use bff::{
  common::{auth::CredentialCodec, downstream::ServiceClients},
  config::GatewayConfig,
  service::UserFacade,
};

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => tracing::info!("Shutdown requested"),
    Err(error) => tracing::error!(%error, "Failed to listen for the shutdown signal"),
  }
}

pub async fn server_main(config: GatewayConfig) -> Result<()> {
  if config.signing_key.is_default() {
    tracing::warn!("Serving with the development signing key; set a real key before deploying");
  }
  let codec = Arc::new(CredentialCodec::new(&config.signing_key));
  let (clients, release) = ServiceClients::connect(&config.downstream, &config.quic)
    .await
    .context("Downstream connection setup failed")?;
  let facade = UserFacade::new(clients, codec);

  tracing::info!(listen = %config.listen, "Serving gateway");
  let served = tonic::transport::Server::builder()
    .add_service(facade.into_server())
    .serve_with_shutdown(config.listen, shutdown_signal())
    .await;
  release.release();
  served.context("Gateway server failed")
}
