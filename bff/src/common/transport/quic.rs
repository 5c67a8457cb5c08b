// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::{
  net::{Ipv4Addr, Ipv6Addr, SocketAddr},
  sync::Arc,
};

use super::{client_crypto_config, stream::QuicStream, DialError, QuicSettings};

/// Opens QUIC connections to a single tunneled downstream target
///
/// Every call to [QuicConnector::open] establishes a fresh connection carrying one
/// bidirectional stream. Closing the connector closes its endpoint, which tears down
/// every connection it opened.
pub struct QuicConnector {
  endpoint: quinn::Endpoint,
  remote: SocketAddr,
  server_name: String,
}

impl QuicConnector {
  /// Resolves `target` and binds a local endpoint of the matching address family
  #[tracing::instrument(level = "debug", skip(settings), err)]
  pub async fn bind(target: &str, settings: &QuicSettings) -> Result<Self, DialError> {
    let remote = tokio::net::lookup_host(target)
      .await?
      .next()
      .ok_or_else(|| DialError::Unresolved(target.to_owned()))?;
    let server_name = server_name(target)
      .ok_or_else(|| DialError::InvalidAddress(target.to_owned()))?
      .to_owned();
    let local: SocketAddr = if remote.is_ipv6() {
      (Ipv6Addr::UNSPECIFIED, 0).into()
    } else {
      (Ipv4Addr::UNSPECIFIED, 0).into()
    };
    let mut endpoint = quinn::Endpoint::client(local)?;
    endpoint.set_default_client_config(quinn::ClientConfig::new(Arc::new(
      client_crypto_config(settings),
    )));
    Ok(Self {
      endpoint,
      remote,
      server_name,
    })
  }

  pub async fn open(&self) -> Result<QuicStream, DialError> {
    let connection = self.endpoint.connect(self.remote, &self.server_name)?.await?;
    let streams = connection.open_bi().await?;
    tracing::trace!(remote = ?self.remote, "opened tunneled stream");
    Ok(QuicStream::new(connection, streams))
  }

  pub fn close(&self) {
    self.endpoint.close(0u32.into(), b"released");
  }
}

impl std::fmt::Debug for QuicConnector {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QuicConnector")
      .field("remote", &self.remote)
      .field("server_name", &self.server_name)
      .finish()
  }
}

/// Host portion of a `host:port` target, as presented during the TLS handshake
///
/// IPv6 literals lose their brackets; a target without a port is returned whole.
pub fn server_name(target: &str) -> Option<&str> {
  let target = target.trim();
  let host = if let Some(bracketed) = target.strip_prefix('[') {
    bracketed.split_once(']')?.0
  } else {
    match target.rsplit_once(':') {
      Some((host, _port)) => host,
      None => target,
    }
  };
  (!host.is_empty()).then_some(host)
}
