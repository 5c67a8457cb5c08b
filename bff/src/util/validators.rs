// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::net::SocketAddr;

#[derive(thiserror::Error, Debug)]
pub enum AddressParseError {
  #[error("Could not resolve address: {0}")]
  Resolve(#[from] std::io::Error),
  #[error("No addresses were resolved from the given host")]
  NoAddresses,
}

pub fn parse_socketaddr(v: &str) -> Result<SocketAddr, AddressParseError> {
  use std::net::ToSocketAddrs;
  ToSocketAddrs::to_socket_addrs(v)?
    .next()
    .ok_or(AddressParseError::NoAddresses)
}

pub fn validate_socketaddr(v: &str) -> Result<(), String> {
  parse_socketaddr(v).map(|_| ()).map_err(|e| e.to_string())
}

/// Rejects blank values for settings that have no usable default
pub fn validate_non_empty(v: &str) -> Result<(), String> {
  if v.trim().is_empty() {
    Err(String::from("A non-empty value is required"))
  } else {
    Ok(())
  }
}

/// Recognizes the tokens that switch an on-by-default toggle off
///
/// Matching ignores case and surrounding whitespace; anything else,
/// including the empty string, leaves the toggle on.
pub fn is_falsy_toggle(v: &str) -> bool {
  matches!(
    v.trim().to_ascii_lowercase().as_str(),
    "0" | "false" | "no" | "off"
  )
}
