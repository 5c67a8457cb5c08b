// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
pub mod auth;
pub mod downstream;
pub mod transport;
