// SPDX-License-Identifier: Apache-2.0

use agripulse_model::{Plan, PlanPrices, SubscriptionView};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

/// Access-active invariant:
/// `accessCodeUsed OR (paidAccess AND expiry > now)`.
///
/// `accessCodeUsed` is a terminal override with no expiry path. Activity is
/// derived, never stored; callers re-evaluate this from already-fetched
/// farmer data whenever they need a fresh answer.
#[must_use]
pub fn is_active(view: &SubscriptionView, now: DateTime<Utc>) -> bool {
    if view.access_code_used {
        return true;
    }
    view.paid_access
        && view
            .effective_expiry()
            .is_some_and(|expiry| expiry > now)
}

/// Expiry for a payment made at `paid_at`: one calendar month for monthly,
/// twelve for yearly. Days past the end of the target month clamp to its
/// last valid day (Jan 31 + 1 month = Feb 28, or Feb 29 in a leap year).
#[must_use]
pub fn next_payment_date(plan: Plan, paid_at: DateTime<Utc>) -> DateTime<Utc> {
    let months = match plan {
        Plan::Monthly => Months::new(1),
        Plan::Yearly => Months::new(12),
    };
    // Addition only fails at the far end of the representable range.
    paid_at.checked_add_months(months).unwrap_or(paid_at)
}

/// Credit for the unused remainder of a billing cycle when switching plans
/// mid-cycle. Informational: it is reported to the caller, not refunded by
/// the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proration {
    pub days_left: u64,
    pub unused_major: u64,
    pub discount_minor: u64,
}

/// Proration applies only when the farmer already has a plan with a
/// recorded, unexpired expiry and the incoming plan differs. Every other
/// combination is a zero discount.
#[must_use]
pub fn prorate(
    old_plan: Option<Plan>,
    old_expiry: Option<DateTime<Utc>>,
    new_plan: Option<Plan>,
    now: DateTime<Utc>,
    prices: &PlanPrices,
) -> Proration {
    let (Some(old_plan), Some(old_expiry), Some(new_plan)) = (old_plan, old_expiry, new_plan)
    else {
        return Proration::default();
    };
    if old_plan == new_plan || old_expiry <= now {
        return Proration::default();
    }

    let days_left = (old_expiry - now).num_days().max(0) as u64;
    let total_days = u64::from(old_plan.cycle_days());
    let price_major = prices.price_major(old_plan);
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
    let unused_major = ((days_left as f64 / total_days as f64) * price_major as f64).round() as u64;

    Proration {
        days_left,
        unused_major,
        discount_minor: unused_major * 100,
    }
}

/// Final charge after the informational discount, floored at zero.
#[must_use]
pub fn settle_charge(amount_minor: u64, discount_minor: u64) -> u64 {
    amount_minor.saturating_sub(discount_minor)
}
