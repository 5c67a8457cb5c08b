// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Identity payload carried inside a signed token
///
/// Issued once at login and never mutated afterwards; every authorization
/// decision is made against a validated copy of this structure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  #[serde(default, skip_serializing_if = "is_zero_i64")]
  pub id: i64,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub user_id: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub email: String,
  #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
  pub roles: BTreeSet<String>,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub nickname: String,
  /// Expiry of the holder's authority; carried through but not enforced.
  #[serde(default, skip_serializing_if = "is_zero_u64")]
  pub authority_time: u64,
  #[serde(flatten)]
  pub registered: RegisteredClaims,
}

/// The standard claim names from RFC 7519 section 4.1
///
/// Times are seconds since the unix epoch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
  #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
  pub issuer: String,
  #[serde(rename = "sub", default, skip_serializing_if = "String::is_empty")]
  pub subject: String,
  #[serde(rename = "aud", default, skip_serializing_if = "Option::is_none")]
  pub audience: Option<Audience>,
  #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
  pub expires_at: Option<u64>,
  #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
  pub not_before: Option<u64>,
  #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
  pub issued_at: Option<u64>,
  #[serde(rename = "jti", default, skip_serializing_if = "String::is_empty")]
  pub id: String,
}

/// `aud` may be encoded either as a single string or as a list of strings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
  Single(String),
  Many(Vec<String>),
}

impl Claims {
  /// Stable textual form of the numeric identifier; `None` when unset (zero)
  pub fn numeric_id(&self) -> Option<String> {
    (self.id != 0).then(|| self.id.to_string())
  }
}

fn is_zero_i64(v: &i64) -> bool {
  *v == 0
}

fn is_zero_u64(v: &u64) -> bool {
  *v == 0
}
