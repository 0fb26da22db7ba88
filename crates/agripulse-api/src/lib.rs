// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

pub const CRATE_NAME: &str = "agripulse-api";

mod dto;
mod errors;

pub use dto::*;
pub use errors::{ApiError, ApiErrorCode};
