// SPDX-License-Identifier: Apache-2.0

use crate::clock::Clock;
use crate::store::{DocPath, DocumentStore, StoreError, WriteOp};
use crate::upstream::{
    IdentityProvider, InitializedTransaction, PaymentGateway, UpstreamError,
};
use agripulse_api::VerifyData;
use agripulse_ledger::{next_payment_date, prorate, settle_charge};
use agripulse_model::{PaymentEvent, Plan, PlanPrices, SubscriptionView};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug)]
pub enum PaymentError {
    /// Gateway call failed outright; nothing was trusted, nothing written.
    Upstream(UpstreamError),
    /// Gateway answered but the payment itself did not succeed.
    Unsuccessful,
}

impl Display for PaymentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upstream(err) => write!(f, "payment verification failed: {err}"),
            Self::Unsuccessful => write!(f, "Payment unsuccessful"),
        }
    }
}

impl std::error::Error for PaymentError {}

struct AppliedPayment {
    prorate_discount: u64,
    final_charge: u64,
    next_payment_date: Option<DateTime<Utc>>,
    plan: Option<Plan>,
}

/// Bridge between the payment gateway and the subscription ledger: verify a
/// client-reported reference server-to-server, then drive the farmer's
/// subscription fields.
pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    prices: PlanPrices,
    public_app_url: String,
}

impl PaymentService {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        prices: PlanPrices,
        public_app_url: String,
    ) -> Self {
        Self {
            gateway,
            identity,
            store,
            clock,
            prices,
            public_app_url,
        }
    }

    pub async fn initialize(
        &self,
        email: &str,
        plan: Plan,
    ) -> Result<InitializedTransaction, PaymentError> {
        let callback_url = format!(
            "{}/signup/verify",
            self.public_app_url.trim_end_matches('/')
        );
        self.gateway
            .initialize(email, self.prices.price_minor(plan), &callback_url, plan)
            .await
            .map_err(PaymentError::Upstream)
    }

    /// Verifies a reference with the gateway and, when the payer maps to a
    /// known farmer, applies the payment to the ledger. Account linkage is
    /// best-effort: a failed lookup or store write leaves the ledger alone
    /// but still reports the (real) payment success to the caller.
    pub async fn verify(&self, reference: &str) -> Result<VerifyData, PaymentError> {
        let verification = self
            .gateway
            .verify(reference)
            .await
            .map_err(PaymentError::Upstream)?;
        if !verification.succeeded {
            return Err(PaymentError::Unsuccessful);
        }

        let now = self.clock.now();
        let event = PaymentEvent {
            reference: if verification.reference.is_empty() {
                reference.to_string()
            } else {
                verification.reference.clone()
            },
            email: verification.email.clone(),
            amount_minor: verification.amount_minor,
            plan: Plan::parse_lenient(verification.plan_raw.as_deref()),
        };

        let farmer_uid = match event.email.as_deref() {
            Some(email) => match self.identity.lookup_uid_by_email(email).await {
                Ok(uid) => uid,
                Err(err) => {
                    warn!("auth lookup failed: {err}");
                    None
                }
            },
            None => None,
        };

        let mut data = VerifyData {
            email: event.email.clone(),
            plan: event.plan,
            paid_at: now,
            reference_id: event.reference.clone(),
            farmer_uid: farmer_uid.clone(),
            prorate_discount: 0,
            final_charge: event.amount_minor,
            next_payment_date: event.plan.map(|p| next_payment_date(p, now)),
        };

        if let Some(uid) = &farmer_uid {
            match self.apply_payment(uid, &event, now).await {
                Ok(Some(applied)) => {
                    data.prorate_discount = applied.prorate_discount;
                    data.final_charge = applied.final_charge;
                    data.next_payment_date = applied.next_payment_date;
                    data.plan = applied.plan;
                }
                Ok(None) => {}
                Err(err) => warn!("farmer data processing failed: {err}"),
            }
        }

        Ok(data)
    }

    /// Merge the payment event into the farmer document. Merge only; the
    /// farmer's unrelated profile fields must survive untouched.
    async fn apply_payment(
        &self,
        uid: &str,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<AppliedPayment>, StoreError> {
        let path = DocPath::new(["farmers", uid])?;
        let Some(doc) = self.store.get(&path).await? else {
            return Ok(None);
        };
        let view = SubscriptionView::from_document(&doc);

        // A reference the ledger already holds is a replayed verify call:
        // answer from the stored state instead of extending the expiry again.
        if view.paid_access && view.payment_reference.as_deref() == Some(&event.reference) {
            return Ok(Some(AppliedPayment {
                prorate_discount: 0,
                final_charge: event.amount_minor,
                next_payment_date: view.next_payment_date,
                plan: view.plan.or(event.plan),
            }));
        }

        let proration = prorate(
            view.plan,
            view.next_payment_date,
            event.plan,
            now,
            &self.prices,
        );
        let final_charge = settle_charge(event.amount_minor, proration.discount_minor);
        let next = event.plan.map(|p| next_payment_date(p, now));

        let mut fields = json!({
            "paidAccess": true,
            "paymentReference": event.reference,
            "paymentDate": now.to_rfc3339(),
        });
        if let Some(plan) = event.plan {
            fields["plan"] = json!(plan.as_str());
        }
        if let Some(next) = next {
            fields["nextPaymentDate"] = json!(next.to_rfc3339());
        }
        self.store.apply(WriteOp::Merge { path, fields }).await?;

        Ok(Some(AppliedPayment {
            prorate_discount: proration.discount_minor,
            final_charge,
            next_payment_date: next,
            plan: event.plan,
        }))
    }
}
