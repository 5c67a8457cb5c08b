// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};

use super::Claims;

/// Signing secret used when none is configured.
///
/// This is a development convenience inherited from the deployed service and is
/// deliberately kept as an overridable default: any deployment reachable by untrusted
/// callers must supply its own key, or anyone reading this source can mint tokens.
pub const DEFAULT_SIGNING_KEY: &str = "is_a_very_secret_key_and_it_is_this";

/// Algorithm used when issuing tokens
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Tokens signed with anything outside the HMAC family are refused before the signature is checked
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
  #[error("Failed to sign token: {0}")]
  Signing(#[source] jsonwebtoken::errors::Error),
  /// Covers every way a presented token can be unacceptable
  #[error("invalid token")]
  InvalidToken,
}

/// The shared secret tokens are signed and verified with
#[derive(Debug)]
pub struct SigningKey {
  secret: SecretString,
  is_default: bool,
}

impl SigningKey {
  pub fn new<T: Into<String>>(secret: T) -> Self {
    Self {
      secret: SecretString::from(secret.into()),
      is_default: false,
    }
  }

  /// Builds the key from an optional environment-sourced value, falling back to
  /// [DEFAULT_SIGNING_KEY] when the value is missing or empty.
  pub fn from_env_value(value: Option<String>) -> Self {
    match value.filter(|v| !v.is_empty()) {
      Some(secret) => Self::new(secret),
      None => {
        tracing::warn!("No signing key configured; using the built-in development key");
        Self {
          secret: SecretString::from(DEFAULT_SIGNING_KEY),
          is_default: true,
        }
      }
    }
  }

  pub fn is_default(&self) -> bool {
    self.is_default
  }

  fn as_bytes(&self) -> &[u8] {
    self.secret.expose_secret().as_bytes()
  }
}

/// Issues and validates signed identity tokens under a single shared key
pub struct CredentialCodec {
  encoding: EncodingKey,
  decoding: DecodingKey,
  validation: Validation,
}

impl CredentialCodec {
  pub fn new(key: &SigningKey) -> Self {
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
    // `exp` is optional; when present it and `nbf` are enforced to the second.
    validation.required_spec_claims.clear();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;
    validation.validate_aud = false;
    Self {
      encoding: EncodingKey::from_secret(key.as_bytes()),
      decoding: DecodingKey::from_secret(key.as_bytes()),
      validation,
    }
  }

  /// Serializes and signs `claims`
  pub fn issue(&self, claims: &Claims) -> Result<String, CredentialError> {
    jsonwebtoken::encode(&Header::new(SIGNING_ALGORITHM), claims, &self.encoding)
      .map_err(CredentialError::Signing)
  }

  /// Verifies `token` and returns the claims it carries
  ///
  /// Empty, malformed, wrongly-signed, wrong-algorithm, expired and not-yet-valid
  /// tokens all fail with [CredentialError::InvalidToken].
  pub fn validate(&self, token: &str) -> Result<Claims, CredentialError> {
    if token.is_empty() {
      return Err(CredentialError::InvalidToken);
    }
    jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
      .map(|data| data.claims)
      .map_err(|error| {
        tracing::debug!(%error, "token rejected");
        CredentialError::InvalidToken
      })
  }
}

impl std::fmt::Debug for CredentialCodec {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CredentialCodec")
      .field("algorithms", &self.validation.algorithms)
      .finish_non_exhaustive()
  }
}
