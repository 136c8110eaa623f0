// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `alm-bridge` failures.
///
/// `alm-bridge` invocations may fail for a variety of reasons. This structure documents the exit
/// codes that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum AlmBridgeExitCode {}

impl AlmBridgeExitCode {
    /// No errors occurred and alm-bridge exited normally.
    ///
    /// Runs skipped by the version policy do not count as errors.
    pub const OK: i32 = 0;

    /// Creating or updating an entity on the ALM server produced an error.
    pub const UPLOAD_FAILED: i32 = 100;

    /// Converting the tests-to-run list failed, and the build step was marked as failed.
    pub const CONVERT_FAILED: i32 = 101;

    /// The server configuration check reported an error.
    pub const CONFIG_CHECK_FAILED: i32 = 102;

    /// A user issue happened while setting up an alm-bridge invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// Writing data to stdout, stderr or an output file produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
