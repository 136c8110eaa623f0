// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [alm-bridge](https://crates.io/crates/alm-bridge-cli): uploading test
//! runs to ALM, converting ALM Octane tests-to-run lists for a test framework, and checking ALM
//! Octane server configuration.
//!
//! The basic flow for an upload is:
//!
//! 1. [`mapper::RunMapper`] fills relations and computed fields on the run record.
//! 2. [`policy::UploadPolicy`] decides whether the run may be uploaded, given version metadata.
//! 3. [`uploader::RunUploader`] writes the run through a [`rest::EntityService`].

pub mod build_step;
pub mod config;
pub mod convert;
pub mod entity;
pub mod errors;
pub mod mapper;
pub mod policy;
pub mod rest;
pub mod uploader;
pub mod validate;
