// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use tonic::{metadata::MetadataValue, Status};

/// Metadata key carrying the machine-readable reason of an internal failure
pub const ERROR_REASON_KEY: &str = "x-error-reason";

/// Downstream replies that break an expectation the gateway relies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractViolation {
  EmptyLoginToken,
  InvalidLoginToken,
  EmptyUserId,
}

impl ContractViolation {
  pub fn reason(self) -> &'static str {
    match self {
      Self::EmptyLoginToken => "EMPTY_LOGIN_TOKEN",
      Self::InvalidLoginToken => "INVALID_LOGIN_TOKEN",
      Self::EmptyUserId => "EMPTY_USER_ID",
    }
  }

  pub fn message(self) -> &'static str {
    match self {
      Self::EmptyLoginToken => "downstream login returned empty token",
      Self::InvalidLoginToken => "downstream login returned invalid token",
      Self::EmptyUserId => "downstream user id is empty",
    }
  }
}

#[derive(thiserror::Error, Debug)]
pub enum FacadeError {
  #[error("Unauthenticated: {0}")]
  Unauthenticated(&'static str),
  #[error("Token identity does not match the requested user")]
  Unauthorized,
  #[error("{}: {}", .0.reason(), .0.message())]
  UpstreamContractViolation(ContractViolation),
  #[error("Downstream call failed: {0}")]
  Downstream(#[from] Status),
}

impl From<FacadeError> for Status {
  fn from(error: FacadeError) -> Self {
    match error {
      FacadeError::Unauthenticated(reason) => Status::unauthenticated(reason),
      FacadeError::Unauthorized => Status::permission_denied("token user mismatch"),
      FacadeError::UpstreamContractViolation(violation) => {
        let mut status = Status::internal(violation.message());
        status.metadata_mut().insert(
          ERROR_REASON_KEY,
          MetadataValue::from_static(violation.reason()),
        );
        status
      }
      FacadeError::Downstream(status) => status,
    }
  }
}
