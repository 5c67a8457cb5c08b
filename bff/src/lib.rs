// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
//! Core of a backend-for-frontend gateway: bearer-token authorization in front of a
//! user service and a resource service, reached over plain HTTP/2 or QUIC tunnels.

pub mod common;
pub mod config;
pub mod proto;
pub mod service;
pub mod util;
