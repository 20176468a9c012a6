//! The device-local session.
//!
//! Exactly one session is active per device at a time; creating a new one
//! implicitly invalidates the previous holder's claim to "current user"
//! without revoking the previous chip's remote account. The store itself is
//! owned by the embedding shell (browser local storage, mobile keychain) and
//! implemented behind [`SessionStore`].

use crate::error::MeldKitError;

/// Snapshot of the device's session.
#[derive(Debug, Clone, Default, PartialEq, Eq, uniffi::Record)]
pub struct SessionState {
    /// Whether a session is currently active.
    pub active: bool,
    /// Chip id the active session is bound to.
    pub current_chip_id: Option<String>,
    /// Identity handle of the active session's holder, when known.
    pub current_identity_uri: Option<String>,
    /// Unix-millisecond expiry of the active session (0 when inactive).
    pub expires_at: u64,
}

/// Device-owned session persistence.
///
/// All access is single-writer (the tap resolver) and last-write-wins; no
/// optimistic concurrency control is applied.
#[uniffi::export(with_foreign)]
pub trait SessionStore: Send + Sync {
    /// Reads the current session state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read. This is fatal
    /// to the tap being resolved.
    fn get_current(&self) -> Result<SessionState, MeldKitError>;

    /// Creates (or refreshes) the session for `chip_id`, replacing any
    /// previous session.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn create(
        &self,
        chip_id: String,
        identity_uri: Option<String>,
    ) -> Result<SessionState, MeldKitError>;

    /// Whether the active session is bound to `chip_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn is_same_chip(&self, chip_id: String) -> Result<bool, MeldKitError>;

    /// Clears the session (explicit logout).
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn clear(&self) -> Result<(), MeldKitError>;
}
