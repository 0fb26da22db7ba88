// SPDX-License-Identifier: Apache-2.0

//! Deterministic subscription and access-code logic.
//!
//! Nothing in this crate reads the clock or performs I/O: every operation
//! takes `now` as an argument so the server, the store transaction bodies,
//! and the tests all evaluate the same functions.

#![forbid(unsafe_code)]

pub const CRATE_NAME: &str = "agripulse-ledger";

pub mod redemption;
pub mod subscription;

pub use redemption::{decide_redemption, Redemption, RedemptionError, DEFAULT_MAX_USES};
pub use subscription::{is_active, next_payment_date, prorate, settle_charge, Proration};
