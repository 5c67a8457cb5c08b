// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use bff::common::auth::{Claims, CredentialCodec, RegisteredClaims, SigningKey};

/// Claims to place in a development token
#[derive(Debug)]
pub struct TokenArgs {
  pub user_id: String,
  pub subject: String,
  pub id: i64,
  pub email: String,
  pub nickname: String,
  pub issuer: String,
  pub roles: Vec<String>,
  /// Zero issues a token that never expires
  pub ttl_secs: u64,
  pub signing_key: SigningKey,
}

impl TokenArgs {
  fn claims(&self, now: u64) -> Result<Claims> {
    let expires_at = match self.ttl_secs {
      0 => None,
      ttl => Some(
        now
          .checked_add(ttl)
          .ok_or_else(|| anyhow!("Token lifetime of {} seconds is out of range", ttl))?,
      ),
    };
    Ok(Claims {
      id: self.id,
      user_id: self.user_id.clone(),
      email: self.email.clone(),
      roles: self.roles.iter().cloned().collect(),
      nickname: self.nickname.clone(),
      authority_time: 0,
      registered: RegisteredClaims {
        issuer: self.issuer.clone(),
        subject: self.subject.clone(),
        issued_at: Some(now),
        expires_at,
        ..Default::default()
      },
    })
  }
}

pub fn token_main(args: TokenArgs) -> Result<()> {
  let now = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .context("System clock is set before the unix epoch")?
    .as_secs();
  let claims = args.claims(now)?;
  let token = CredentialCodec::new(&args.signing_key)
    .issue(&claims)
    .context("Token signing failed")?;
  tracing::info!(user_id = %claims.user_id, expires_at = ?claims.registered.expires_at, "issued token");
  println!("{}", token);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args(ttl_secs: u64) -> TokenArgs {
    TokenArgs {
      user_id: "u1".into(),
      subject: String::new(),
      id: 7,
      email: String::new(),
      nickname: String::new(),
      issuer: "bff-cli".into(),
      roles: vec!["ops".into(), "admin".into(), "ops".into()],
      ttl_secs,
      signing_key: SigningKey::new("token-test-key"),
    }
  }

  #[test]
  fn minted_tokens_validate_under_the_same_key() {
    let args = args(60);
    let codec = CredentialCodec::new(&args.signing_key);
    let now = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap()
      .as_secs();
    let claims = codec.validate(&codec.issue(&args.claims(now).unwrap()).unwrap()).unwrap();
    assert_eq!(claims.user_id, "u1");
    assert_eq!(claims.id, 7);
    assert_eq!(claims.roles.len(), 2);
    assert_eq!(claims.registered.expires_at, Some(now + 60));
  }

  #[test]
  fn zero_ttl_omits_expiry() {
    assert_eq!(args(0).claims(100).unwrap().registered.expires_at, None);
  }

  #[test]
  fn oversized_ttl_is_an_error() {
    assert!(args(u64::MAX).claims(100).is_err());
    assert!(token_main(args(u64::MAX)).is_err());
  }
}
