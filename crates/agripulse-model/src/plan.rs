// SPDX-License-Identifier: Apache-2.0

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Billing cycle a farmer subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Monthly,
    Yearly,
}

impl Plan {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim() {
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(ValidationError(format!("unknown plan: {other}"))),
        }
    }

    /// Tolerant variant for reading stored documents: anything that is not a
    /// known plan string reads as absent rather than failing the caller.
    #[must_use]
    pub fn parse_lenient(input: Option<&str>) -> Option<Self> {
        input.and_then(|s| Self::parse(s).ok())
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Monthly => "Monthly",
            Self::Yearly => "Yearly",
        }
    }

    /// Nominal cycle length used by the proration arithmetic.
    #[must_use]
    pub const fn cycle_days(self) -> u32 {
        match self {
            Self::Monthly => 30,
            Self::Yearly => 365,
        }
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Package price table in major currency units. Minor units (what the
/// payment gateway bills in) are major x 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPrices {
    pub monthly_major: u64,
    pub yearly_major: u64,
}

impl Default for PlanPrices {
    fn default() -> Self {
        Self {
            monthly_major: 1_500,
            yearly_major: 15_000,
        }
    }
}

impl PlanPrices {
    #[must_use]
    pub const fn price_major(&self, plan: Plan) -> u64 {
        match plan {
            Plan::Monthly => self.monthly_major,
            Plan::Yearly => self.yearly_major,
        }
    }

    #[must_use]
    pub const fn price_minor(&self, plan: Plan) -> u64 {
        self.price_major(plan) * 100
    }
}
