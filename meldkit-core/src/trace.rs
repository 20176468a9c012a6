//! Advisory trace log for tap resolution.
//!
//! Every pipeline run produces an ordered list of typed notes covering the
//! decode, authentication and decision stages. The trace exists for
//! diagnostics and support tooling only; it must never feed back into an
//! authorization decision.

use crate::tap::DecodeNote;

/// A single entry in the tap-resolution trace.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum TraceNote {
    /// A note emitted by the parameter decoder.
    Decode {
        /// The decoder note.
        note: DecodeNote,
    },
    /// Authentication completed successfully.
    Authenticated {
        /// Decode strategy that drove verification.
        strategy: String,
        /// Opaque session token minted for this tap.
        session_token: String,
    },
    /// Authentication failed.
    AuthenticationFailed {
        /// Failure kind, as a stable snake_case name.
        kind: String,
    },
    /// The account backing the chip was looked up or created.
    AccountEnsured {
        /// Chip id the account is keyed by.
        chip_id: String,
        /// Whether the account was created by this tap.
        created: bool,
    },
    /// The account upsert failed and was swallowed; verification stands.
    AccountStoreSkipped {
        /// Underlying store error.
        error: String,
    },
    /// Which decision branch the orchestrator took.
    Branch {
        /// Branch name: `same_chip`, `bonding` or `plain`.
        taken: String,
    },
    /// Result of the bond store lookup during a bonding attempt.
    BondLookup {
        /// Whether the two chips are already bonded.
        already_bonded: bool,
    },
    /// Outcome of the PIN gate policy.
    PinGate {
        /// The decision, as a stable name.
        decision: String,
    },
}
