// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::{collections::HashMap, hash::BuildHasher};

use tonic::metadata::MetadataMap;

/// Literal, case-sensitive scheme prefix of a bearer credential
pub const BEARER_PREFIX: &str = "Bearer ";

/// Header names consulted, in order; inbound metadata is not guaranteed to be case-normalized
pub const AUTHORIZATION_KEYS: [&str; 2] = ["Authorization", "authorization"];

/// Read access to inbound request headers by name
pub trait HeaderSource {
  fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for MetadataMap {
  fn header(&self, name: &str) -> Option<&str> {
    self.get(name).and_then(|value| value.to_str().ok())
  }
}

impl<S: BuildHasher> HeaderSource for HashMap<String, String, S> {
  fn header(&self, name: &str) -> Option<&str> {
    self.get(name).map(String::as_str)
  }
}

/// Extracts the token from a single `Authorization` header value
///
/// Yields nothing when the value lacks the `Bearer ` prefix or holds only whitespace after it.
pub fn bearer_from_header_value(value: &str) -> Option<&str> {
  let token = value.strip_prefix(BEARER_PREFIX)?.trim();
  (!token.is_empty()).then_some(token)
}

/// Extracts the bearer token from request headers, trying each of [AUTHORIZATION_KEYS] in turn
pub fn bearer_from_headers<H>(headers: &H) -> Option<&str>
where
  H: HeaderSource + ?Sized,
{
  AUTHORIZATION_KEYS
    .iter()
    .filter_map(|key| headers.header(key))
    .find_map(bearer_from_header_value)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn header_value_parsing() {
    assert_eq!(bearer_from_header_value("Bearer abc.def.ghi"), Some("abc.def.ghi"));
    assert_eq!(bearer_from_header_value("Bearer   abc  "), Some("abc"));
    assert_eq!(bearer_from_header_value("Bearer   "), None);
    assert_eq!(bearer_from_header_value("Bearer "), None);
    assert_eq!(bearer_from_header_value("Bearer"), None);
    assert_eq!(bearer_from_header_value(""), None);
    assert_eq!(bearer_from_header_value("bearer abc"), None);
    assert_eq!(bearer_from_header_value("Basic dXNlcjpwYXNz"), None);
  }

  #[test]
  fn capitalized_key_preferred() {
    let h = headers(&[
      ("Authorization", "Bearer first"),
      ("authorization", "Bearer second"),
    ]);
    assert_eq!(bearer_from_headers(&h), Some("first"));
  }

  #[test]
  fn lower_case_key_consulted() {
    let h = headers(&[("authorization", "Bearer lower")]);
    assert_eq!(bearer_from_headers(&h), Some("lower"));

    let h = headers(&[
      ("Authorization", "Basic dXNlcjpwYXNz"),
      ("authorization", "Bearer lower"),
    ]);
    assert_eq!(bearer_from_headers(&h), Some("lower"));
  }

  #[test]
  fn absent_header_yields_nothing() {
    assert_eq!(bearer_from_headers(&headers(&[])), None);
    let h = headers(&[("x-api-key", "Bearer nope")]);
    assert_eq!(bearer_from_headers(&h), None);
  }

  #[test]
  fn grpc_metadata() {
    let mut metadata = MetadataMap::new();
    metadata.insert("authorization", "Bearer abc.def.ghi".parse().unwrap());
    assert_eq!(bearer_from_headers(&metadata), Some("abc.def.ghi"));
  }
}
