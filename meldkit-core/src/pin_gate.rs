//! The PIN gate policy.
//!
//! A pure decision function: no I/O, no clock, no state. The orchestrator
//! gathers the facts and this module answers whether a PIN challenge stands
//! between the tap and access.

/// Outcome of the PIN gate.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum PinDecision {
    /// Access may proceed without a PIN challenge. For accounts that do not
    /// exist yet this covers creation only; the caller must still prompt
    /// for PIN setup afterwards.
    NotRequired,
    /// A PIN challenge is required before granting access.
    Required {
        /// Human-readable reason, for diagnostics.
        reason: String,
    },
    /// The bonding attempt is refused outright: bonding must not be usable
    /// to silently attach to an account that never opted into PIN
    /// protection.
    BondingBlocked {
        /// Human-readable reason, for diagnostics.
        reason: String,
    },
}

impl PinDecision {
    /// Stable name of the decision for trace notes.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NotRequired => "not_required",
            Self::Required { .. } => "required",
            Self::BondingBlocked { .. } => "bonding_blocked",
        }
    }
}

/// Decides whether a PIN challenge is required before granting access.
///
/// `account_exists` means the account existed before this tap (a brand-new
/// account created by the tap itself counts as not existing). Same-chip taps
/// are deliberately not exempted from the PIN requirement by matching the
/// active session: a tap does not prove the session owner is still holding
/// the device, so the PIN is re-proven on every physical tap.
#[uniffi::export]
#[must_use]
pub fn requires_pin(
    account_exists: bool,
    has_pin: bool,
    is_same_chip_as_active_session: bool,
    is_bonding_attempt: bool,
) -> PinDecision {
    if is_bonding_attempt && account_exists && !has_pin {
        return PinDecision::BondingBlocked {
            reason: "target account is not PIN-protected".to_string(),
        };
    }
    if !account_exists {
        return PinDecision::NotRequired;
    }
    if has_pin {
        let reason = if is_same_chip_as_active_session {
            "PIN is re-proven on every tap, including same-chip taps"
        } else {
            "account is PIN-protected"
        };
        return PinDecision::Required {
            reason: reason.to_string(),
        };
    }
    PinDecision::NotRequired
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_bonding_to_pinless_existing_account_is_blocked() {
        let decision = requires_pin(true, false, false, true);
        assert!(matches!(decision, PinDecision::BondingBlocked { .. }));
    }

    #[test_case(false; "plain tap")]
    #[test_case(true; "bonding tap")]
    fn test_new_account_never_requires_pin(is_bonding: bool) {
        assert_eq!(
            requires_pin(false, false, false, is_bonding),
            PinDecision::NotRequired
        );
    }

    #[test]
    fn test_existing_pin_account_requires_pin() {
        let decision = requires_pin(true, true, false, false);
        assert!(matches!(decision, PinDecision::Required { .. }));
    }

    #[test]
    fn test_same_chip_tap_is_not_exempted() {
        // Matching the active session does not skip the PIN: a stolen
        // unlocked device with the paired tag nearby must still be stopped.
        let decision = requires_pin(true, true, true, false);
        assert!(matches!(decision, PinDecision::Required { .. }));
    }

    #[test]
    fn test_existing_pinless_account_passes_outside_bonding() {
        assert_eq!(
            requires_pin(true, false, false, false),
            PinDecision::NotRequired
        );
        assert_eq!(
            requires_pin(true, false, true, false),
            PinDecision::NotRequired
        );
    }

    #[test]
    fn test_bonding_to_pin_protected_account_requires_pin() {
        let decision = requires_pin(true, true, false, true);
        assert!(matches!(decision, PinDecision::Required { .. }));
    }
}
