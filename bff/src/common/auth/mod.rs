// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
//! Bearer credentials: extraction from inbound metadata, signing and validation,
//! and reconciliation of claim identities against a requested target identity
mod bearer;
pub use bearer::*;

mod claims;
pub use claims::{Audience, Claims, RegisteredClaims};

mod codec;
pub use codec::{
  CredentialCodec, CredentialError, SigningKey, DEFAULT_SIGNING_KEY, SIGNING_ALGORITHM,
};

mod identity;
pub use identity::{authorize, EffectiveIdentity, IdentitySource};
