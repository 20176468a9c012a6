//! Terminal outcomes of tap resolution, consumed by the UI/redirect layer.

use crate::{bonds::BondProposal, error::ErrorKind, trace::TraceNote};

/// Redirect payload emitted on a direct pass.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct RedirectPayload {
    /// Chip the session was created for.
    pub chip_id: String,
    /// Opaque session token minted by the authentication engine.
    pub session_token: String,
    /// Correlation id for the tap, minted with the token.
    pub moment_id: String,
    /// Decode strategy that sourced the credential, snake_case.
    pub source: String,
}

/// Context for the PIN entry step, so it can tell a "verify" flow from a
/// "set up" flow without re-deriving anything.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct PinChallengePayload {
    /// Chip the challenge applies to.
    pub chip_id: String,
    /// Whether this tap created the account (PIN setup flow).
    pub is_new_account: bool,
    /// Whether this device held no session for the chip before this tap.
    pub is_new_device: bool,
    /// Whether the account is PIN-protected (PIN verify flow).
    pub has_pin: bool,
    /// Display name of the account, when known.
    pub display_name: Option<String>,
    /// Set when the challenge gates a bonding attempt: the chip bound to
    /// the session that was active when the tap happened.
    pub bonding_with: Option<String>,
}

/// The discriminated outcome of one resolved tap.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum TapOutcome {
    /// Silent pass: the session was created/refreshed and the UI should
    /// follow the redirect.
    DirectPass {
        /// Redirect payload.
        redirect: RedirectPayload,
    },
    /// A PIN challenge stands between the tap and access.
    PinChallenge {
        /// Context for the PIN entry step.
        challenge: PinChallengePayload,
    },
    /// A bonding handshake was proposed; the original session is preserved
    /// and the confirmation UI decides whether to create the bond.
    BondingProposal {
        /// The proposed bond.
        proposal: BondProposal,
    },
    /// The tap failed or was refused by policy. The session is untouched.
    Failed {
        /// Failure kind.
        kind: ErrorKind,
        /// Human-readable detail.
        message: String,
    },
}

/// A resolved tap: the authoritative outcome plus the advisory trace.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct TapResolution {
    /// The outcome. This is the only value authorization may act on.
    pub outcome: TapOutcome,
    /// Ordered diagnostic notes from the decode, authentication and
    /// decision stages. Advisory only.
    pub trace: Vec<TraceNote>,
}
