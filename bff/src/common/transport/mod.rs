// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
//! Per-address transport selection and the byte streams downstream channels run over
use crate::util::{validators::is_falsy_toggle, ALPN_GRPC_QUIC};

pub mod quic;
pub mod stream;
mod tls;

pub use tls::client_crypto_config;

/// Address prefixes requesting the tunneled transport, checked in order
pub const TUNNEL_SCHEME_PREFIXES: [&str; 4] =
  ["quic://", "quic-grpc://", "grpc-quic://", "quic+grpc://"];

/// Wire transport used to reach a downstream target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
  /// Plaintext HTTP/2 over TCP
  Standard,
  /// HTTP/2 carried over a QUIC bidirectional stream
  Tunneled,
}

impl std::fmt::Display for TransportKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Self::Standard => "standard",
      Self::Tunneled => "tunneled",
    })
  }
}

/// Chooses the transport for `address`, returning the target with any tunnel prefix stripped.
///
/// Addresses without a recognized prefix use the standard transport and are returned unchanged.
pub fn select_transport(address: &str) -> (&str, TransportKind) {
  let trimmed = address.trim();
  TUNNEL_SCHEME_PREFIXES
    .iter()
    .find_map(|prefix| trimmed.strip_prefix(prefix))
    .map(|target| (target, TransportKind::Tunneled))
    .unwrap_or((address, TransportKind::Standard))
}

/// Security parameters for tunneled connections
///
/// Certificate verification is skipped unless explicitly disabled. That default is a
/// development convenience carried over from the deployed service, not a recommendation:
/// production deployments should set the toggle to a falsy value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuicSettings {
  pub alpn: String,
  pub insecure_skip_verify: bool,
}

impl Default for QuicSettings {
  fn default() -> Self {
    Self {
      alpn: ALPN_GRPC_QUIC.to_owned(),
      insecure_skip_verify: true,
    }
  }
}

impl QuicSettings {
  /// Builds settings from raw environment-style values
  ///
  /// A blank ALPN falls back to [ALPN_GRPC_QUIC]; verification is skipped unless the toggle
  /// is one of `0`, `false`, `no` or `off` in any case.
  pub fn from_env_values(alpn: Option<&str>, insecure_skip_verify: Option<&str>) -> Self {
    let alpn = alpn
      .map(str::trim)
      .filter(|alpn| !alpn.is_empty())
      .unwrap_or(ALPN_GRPC_QUIC)
      .to_owned();
    let insecure_skip_verify = !insecure_skip_verify.map_or(false, is_falsy_toggle);
    Self {
      alpn,
      insecure_skip_verify,
    }
  }
}

#[derive(thiserror::Error, Debug)]
pub enum DialError {
  #[error("Invalid downstream address {0:?}")]
  InvalidAddress(String),
  #[error("No addresses were resolved for {0:?}")]
  Unresolved(String),
  #[error("I/O failure while dialing: {0}")]
  Io(#[from] std::io::Error),
  #[error("QUIC endpoint refused the connection attempt: {0}")]
  Endpoint(#[from] quinn::ConnectError),
  #[error("QUIC connection failed: {0}")]
  Connection(#[from] quinn::ConnectionError),
  #[error("Channel setup failed: {0}")]
  Channel(#[from] tonic::transport::Error),
  #[error("Downstream connection has been closed")]
  Closed,
}
