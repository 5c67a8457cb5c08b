// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::{sync::Arc, time::SystemTime};

use rustls::{
  client::{ServerCertVerified, ServerCertVerifier},
  Certificate, ClientConfig, RootCertStore, ServerName,
};

use super::QuicSettings;

/// Accepts any server certificate; installed only when verification is skipped
struct SkipServerVerification;

impl ServerCertVerifier for SkipServerVerification {
  fn verify_server_cert(
    &self,
    _end_entity: &Certificate,
    _intermediates: &[Certificate],
    _server_name: &ServerName,
    _scts: &mut dyn Iterator<Item = &[u8]>,
    _ocsp_response: &[u8],
    _now: SystemTime,
  ) -> Result<ServerCertVerified, rustls::Error> {
    Ok(ServerCertVerified::assertion())
  }
}

fn native_roots() -> RootCertStore {
  let mut roots = RootCertStore::empty();
  match rustls_native_certs::load_native_certs() {
    Ok(certs) => {
      let der: Vec<Vec<u8>> = certs.into_iter().map(|cert| cert.0).collect();
      let (added, ignored) = roots.add_parsable_certificates(&der);
      tracing::trace!(added, ignored, "loaded native root certificates");
    }
    Err(error) => tracing::warn!(%error, "could not load native root certificates"),
  }
  roots
}

/// TLS client configuration for tunneled connections
pub fn client_crypto_config(settings: &QuicSettings) -> ClientConfig {
  let mut crypto = ClientConfig::builder()
    .with_safe_defaults()
    .with_root_certificates(native_roots())
    .with_no_client_auth();
  crypto.alpn_protocols = vec![settings.alpn.as_bytes().to_vec()];
  if settings.insecure_skip_verify {
    tracing::warn!(
      alpn = %settings.alpn,
      "QUIC server certificate verification is disabled"
    );
    crypto
      .dangerous()
      .set_certificate_verifier(Arc::new(SkipServerVerification));
  }
  crypto
}
