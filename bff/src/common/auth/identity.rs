// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use super::Claims;

/// Which claim an effective identity was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
  UserId,
  Subject,
  NumericId,
}

type IdentityField = fn(&Claims) -> Option<String>;

/// Claim fields that can identify the bearer, strongest first
static IDENTITY_FIELDS: [(IdentitySource, IdentityField); 3] = [
  (IdentitySource::UserId, user_id),
  (IdentitySource::Subject, subject),
  (IdentitySource::NumericId, Claims::numeric_id),
];

fn user_id(claims: &Claims) -> Option<String> {
  non_empty(&claims.user_id)
}

fn subject(claims: &Claims) -> Option<String> {
  non_empty(&claims.registered.subject)
}

fn non_empty(field: &str) -> Option<String> {
  (!field.is_empty()).then(|| field.to_owned())
}

/// The identity a call is trusted to act as, derived from validated claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveIdentity {
  id: String,
  source: Option<IdentitySource>,
}

impl EffectiveIdentity {
  pub fn as_str(&self) -> &str {
    &self.id
  }

  /// The claim the identity came from; `None` when the claims identify nobody
  pub fn source(&self) -> Option<IdentitySource> {
    self.source
  }

  pub fn is_empty(&self) -> bool {
    self.id.is_empty()
  }

  pub fn into_string(self) -> String {
    self.id
  }
}

impl std::fmt::Display for EffectiveIdentity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.id)
  }
}

fn candidates(claims: &Claims) -> impl Iterator<Item = (IdentitySource, String)> + '_ {
  IDENTITY_FIELDS
    .iter()
    .filter_map(move |(source, field)| field(claims).map(|id| (*source, id)))
}

/// Decides whether `claims` may act on behalf of `requested`.
///
/// An empty `requested` means the caller is asking about itself: the call is always
/// authorized and acts as the strongest identity the claims carry (which may be empty
/// when they carry none). Otherwise the call is authorized only if `requested` equals one
/// of the claim identities, and then acts as that identity.
pub fn authorize(claims: &Claims, requested: &str) -> Option<EffectiveIdentity> {
  if requested.is_empty() {
    let effective = match candidates(claims).next() {
      Some((source, id)) => EffectiveIdentity {
        id,
        source: Some(source),
      },
      None => EffectiveIdentity {
        id: String::new(),
        source: None,
      },
    };
    return Some(effective);
  }
  candidates(claims)
    .find(|(_, id)| id == requested)
    .map(|(source, id)| EffectiveIdentity {
      id,
      source: Some(source),
    })
}
