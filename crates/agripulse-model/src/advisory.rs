// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// One advice entry for a single crop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceItem {
    pub crop: String,
    pub advice: String,
}

/// Structured crop advisory: a short header plus one item per crop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropAdvice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    pub items: Vec<AdviceItem>,
}

/// What the advisory generator hands back. Model output is free text that
/// usually, but not always, contains the requested JSON; callers must
/// handle both shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdviceOutcome {
    Structured(CropAdvice),
    Unstructured { advice: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragilitySection {
    pub title: String,
    pub summary: String,
    pub severity: Severity,
}

/// Regional risk summary: flood/drought, conflict, market access, health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragilityAdvisory {
    pub header: String,
    pub sections: Vec<FragilitySection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FragilityOutcome {
    Structured(FragilityAdvisory),
    Unstructured { advisory: String },
}
