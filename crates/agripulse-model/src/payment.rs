// SPDX-License-Identifier: Apache-2.0

use crate::Plan;
use serde::{Deserialize, Serialize};

/// Details extracted from a gateway verification payload. Ephemeral: merged
/// into the farmer document, never stored as its own record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub amount_minor: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
}
