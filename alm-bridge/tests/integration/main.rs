// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod convert;
mod fixtures;
mod upload;
mod validate;
