// SPDX-License-Identifier: Apache-2.0

pub mod access_code;
pub mod admin;
pub mod advisory;
pub mod payments;

pub use access_code::{AccessCodeError, AccessCodeService};
pub use admin::AdminService;
pub use advisory::AdvisoryService;
pub use payments::{PaymentError, PaymentService};
