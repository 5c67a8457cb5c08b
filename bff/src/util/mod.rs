// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
pub mod release;
pub mod validators;

/// ALPN protocol name offered on tunneled downstream connections unless configured otherwise
pub const ALPN_GRPC_QUIC: &str = "grpc-quic";
