// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to alm-bridge machine-readable output.
//!
//! `alm-bridge convert --message-format json` and `alm-bridge upload --message-format json`
//! print the summaries defined here to stdout. Exit codes are documented in
//! [`AlmBridgeExitCode`].

mod exit_codes;
mod summary;

pub use exit_codes::*;
pub use summary::*;
