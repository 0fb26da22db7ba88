// SPDX-License-Identifier: Apache-2.0

use agripulse_model::AccessCodeState;
use std::fmt::{Display, Formatter};

/// Cap applied to a code document that has never had one written.
pub const DEFAULT_MAX_USES: u64 = 50;

/// Outcome of a redemption attempt, decided inside the store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redemption {
    /// A fresh slot was granted; `uses` is the post-increment counter the
    /// transaction must write back.
    Granted { uses: u64, max_uses: u64 },
    /// This consumer already holds an audit record; nothing is written and
    /// no second slot is burned.
    AlreadyRedeemed { uses: u64, max_uses: u64 },
}

impl Redemption {
    #[must_use]
    pub const fn counters(self) -> (u64, u64) {
        match self {
            Self::Granted { uses, max_uses } | Self::AlreadyRedeemed { uses, max_uses } => {
                (uses, max_uses)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionError {
    /// `uses` has reached `maxUses`; the transaction must abort with no
    /// mutation at all.
    Expired { uses: u64, max_uses: u64 },
}

impl Display for RedemptionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired { .. } => write!(f, "Code has expired"),
        }
    }
}

impl std::error::Error for RedemptionError {}

/// The read-check-decide step of the cap transaction. Pure: the caller
/// supplies the counter state and whether this consumer's audit record
/// already exists, and performs whatever writes the decision demands inside
/// the same atomic transaction that produced the reads.
pub fn decide_redemption(
    state: &AccessCodeState,
    already_redeemed: bool,
) -> Result<Redemption, RedemptionError> {
    if already_redeemed {
        return Ok(Redemption::AlreadyRedeemed {
            uses: state.uses,
            max_uses: state.max_uses,
        });
    }
    if state.exhausted() {
        return Err(RedemptionError::Expired {
            uses: state.uses,
            max_uses: state.max_uses,
        });
    }
    Ok(Redemption::Granted {
        uses: state.uses + 1,
        max_uses: state.max_uses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(uses: u64, max_uses: u64) -> AccessCodeState {
        AccessCodeState {
            uses,
            max_uses,
            last_used: None,
        }
    }

    #[test]
    fn grants_increment_until_the_cap() {
        assert_eq!(
            decide_redemption(&state(0, 50), false),
            Ok(Redemption::Granted {
                uses: 1,
                max_uses: 50
            })
        );
        assert_eq!(
            decide_redemption(&state(49, 50), false),
            Ok(Redemption::Granted {
                uses: 50,
                max_uses: 50
            })
        );
    }

    #[test]
    fn cap_reached_aborts_without_mutation() {
        assert_eq!(
            decide_redemption(&state(50, 50), false),
            Err(RedemptionError::Expired {
                uses: 50,
                max_uses: 50
            })
        );
    }

    #[test]
    fn prior_audit_record_short_circuits_the_counter() {
        assert_eq!(
            decide_redemption(&state(50, 50), true),
            Ok(Redemption::AlreadyRedeemed {
                uses: 50,
                max_uses: 50
            })
        );
    }
}
