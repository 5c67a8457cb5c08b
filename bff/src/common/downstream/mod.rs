// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
//! All-or-nothing connection setup for the user and resource downstream services
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::{
  common::transport::DialError,
  config::DownstreamConfig,
  util::release::{Release, ReleaseStack},
};

mod channel;
pub use channel::{ChannelDialer, ConnectionState, DownstreamChannel};

mod clients;
pub use clients::*;

/// The downstream services the gateway depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Downstream {
  User,
  Resource,
}

impl Downstream {
  pub fn name(self) -> &'static str {
    match self {
      Self::User => "user",
      Self::Resource => "resource",
    }
  }

  /// Configuration field holding this service's address
  pub fn address_field(self) -> &'static str {
    match self {
      Self::User => "service.user.addr",
      Self::Resource => "service.resource.addr",
    }
  }
}

impl std::fmt::Display for Downstream {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
  #[error("{field} is required")]
  Config { field: &'static str },
  #[error("Failed to dial {service} service at {address:?}: {source}")]
  Dial {
    service: Downstream,
    address: String,
    #[source]
    source: DialError,
  },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CloseError {
  #[error("Connection was already closed")]
  AlreadyClosed,
}

/// An established connection to one downstream service
pub trait DownstreamConnection: Send + Sync + 'static {
  fn close(&self) -> Result<(), CloseError>;
}

/// Establishes connections to downstream services
pub trait Dialer: Send + Sync {
  type Connection: DownstreamConnection;

  fn dial<'a>(
    &'a self,
    service: Downstream,
    address: &'a str,
  ) -> BoxFuture<'a, Result<Self::Connection, DialError>>;
}

/// Connections to both downstream services, acquired together
pub struct ConnectedPair<C> {
  pub user: Arc<C>,
  pub resource: Arc<C>,
}

fn required(address: &str, service: Downstream) -> Result<&str, ConnectError> {
  if address.is_empty() {
    return Err(ConnectError::Config {
      field: service.address_field(),
    });
  }
  Ok(address)
}

async fn dial_one<D: Dialer>(
  dialer: &D,
  service: Downstream,
  address: &str,
) -> Result<Arc<D::Connection>, ConnectError> {
  match dialer.dial(service, address).await {
    Ok(connection) => {
      tracing::info!(%service, address, "connected to downstream service");
      Ok(Arc::new(connection))
    }
    Err(source) => {
      tracing::error!(%service, address, error = %source, "failed to dial downstream service");
      Err(ConnectError::Dial {
        service,
        address: address.to_owned(),
        source,
      })
    }
  }
}

fn closer<C: DownstreamConnection>(
  service: Downstream,
  connection: Arc<C>,
) -> impl FnOnce() + Send + 'static {
  move || match connection.close() {
    Ok(()) => tracing::info!(%service, "closed downstream connection"),
    Err(error) => tracing::error!(%service, %error, "failed to close downstream connection"),
  }
}

/// Connects to the user service, then the resource service.
///
/// Both addresses are checked before anything is dialed. If the second dial fails, the
/// first connection is closed before the error is returned, so a failed call never leaves
/// a connection open. On success the returned [Release] closes the resource connection
/// and then the user connection.
pub async fn connect_pair<D: Dialer>(
  dialer: &D,
  config: &DownstreamConfig,
) -> Result<(ConnectedPair<D::Connection>, Release), ConnectError> {
  let user_addr = required(&config.user_addr, Downstream::User)?;
  let resource_addr = required(&config.resource_addr, Downstream::Resource)?;

  let mut acquired = ReleaseStack::new();
  let user = dial_one(dialer, Downstream::User, user_addr).await?;
  acquired.push("user", closer(Downstream::User, user.clone()));
  // Dropping `acquired` on the error path closes the user connection.
  let resource = dial_one(dialer, Downstream::Resource, resource_addr).await?;
  acquired.push("resource", closer(Downstream::Resource, resource.clone()));

  Ok((ConnectedPair { user, resource }, acquired.into_release()))
}
