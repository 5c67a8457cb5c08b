// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
//! Generated message shapes and service stubs
#![allow(clippy::all)]

/// The gateway's public surface
pub mod bff {
  pub mod user {
    pub mod v1 {
      tonic::include_proto!("bff.user.v1");
    }
  }
}

/// Downstream services the gateway fronts
pub mod service {
  pub mod user {
    pub mod v1 {
      tonic::include_proto!("service.user.v1");
    }
  }

  pub mod resource {
    pub mod v1 {
      tonic::include_proto!("service.resource.v1");
    }
  }
}
