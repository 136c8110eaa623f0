// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line interface for alm-bridge.
//!
//! `alm-bridge upload` writes test runs to an ALM project, `alm-bridge convert` turns an ALM
//! Octane tests-to-run list into the format a test framework expects, and
//! `alm-bridge check-config` checks that an ALM Octane server can be reached with the configured
//! credentials.
//!
//! Exit codes are documented in [`alm_bridge_metadata::AlmBridgeExitCode`].

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter};
