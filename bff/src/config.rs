// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::net::SocketAddr;

use crate::common::{auth::SigningKey, transport::QuicSettings};

/// Environment variables backing each setting
pub mod env {
  pub const LISTEN: &str = "BFF_LISTEN";
  pub const USER_ADDR: &str = "BFF_USER_ADDR";
  pub const RESOURCE_ADDR: &str = "BFF_RESOURCE_ADDR";
  pub const JWT_KEY: &str = "BFF_JWT_KEY";
  pub const QUIC_ALPN: &str = "BFF_QUIC_ALPN";
  pub const QUIC_INSECURE_SKIP_VERIFY: &str = "BFF_QUIC_INSECURE_SKIP_VERIFY";
}

pub const DEFAULT_LISTEN: &str = "0.0.0.0:9000";

/// Network addresses of the downstream services
///
/// Either address may carry a tunnel prefix such as `quic://`; see
/// [crate::common::transport::select_transport].
#[derive(Eq, PartialEq, Clone, Debug, Default)]
pub struct DownstreamConfig {
  pub user_addr: String,
  pub resource_addr: String,
}

/// Everything the gateway needs at startup, resolved before any component is built
#[derive(Debug)]
pub struct GatewayConfig {
  pub listen: SocketAddr,
  pub downstream: DownstreamConfig,
  pub signing_key: SigningKey,
  pub quic: QuicSettings,
}
