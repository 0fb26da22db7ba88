// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

pub const CRATE_NAME: &str = "agripulse-model";

mod access_code;
mod advisory;
mod news;
mod payment;
mod plan;
mod subscription;
mod weather;

pub use access_code::{AccessCodeState, CodeUseRecord};
pub use advisory::{
    AdviceItem, AdviceOutcome, CropAdvice, FragilityAdvisory, FragilityOutcome, FragilitySection,
    Severity,
};
pub use news::NewsItem;
pub use payment::PaymentEvent;
pub use plan::{Plan, PlanPrices};
pub use subscription::SubscriptionView;
pub use weather::WeatherSummary;

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}
