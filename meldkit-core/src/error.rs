use thiserror::Error;

/// Error outputs from `MeldKit`.
#[derive(Debug, Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum MeldKitError {
    /// No decode strategy matched the tap parameters. Non-fatal: the caller
    /// should route to a manual-entry fallback.
    #[error("decode_failure")]
    DecodeFailure,
    /// The tap carried no usable credential parameters.
    #[error("missing_parameters")]
    MissingParameters,
    /// Proof-of-possession verification failed.
    #[error("invalid_signature")]
    InvalidSignature,
    /// No local identity is registered for the tapped chip.
    #[error("no_local_identity: {chip_id}")]
    NoLocalIdentity {
        /// Chip id the registry lookup missed.
        chip_id: String,
    },
    /// The device id carried by the tap is not in the local registry.
    #[error("device_not_registered: {device_id}")]
    DeviceNotRegistered {
        /// Device id the registry lookup missed.
        device_id: String,
    },
    /// The session store could not be read or written. Fatal: without a
    /// session the resolver cannot tell a same-chip tap from a bonding tap.
    #[error("session_store_failure: {error}")]
    SessionStoreFailure {
        /// Underlying store error.
        error: String,
    },
    /// Unexpected error serializing information.
    #[error("serialization_error: {error}")]
    SerializationError {
        /// Underlying serialization error.
        error: String,
    },
    /// Network connection error with details.
    #[error("network_error ({url}): {error}")]
    NetworkError {
        /// URL of the failed request.
        url: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Underlying transport error.
        error: String,
    },
    /// HTTP request failure.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

/// Wire-facing error taxonomy carried in [`crate::AuthenticationResult`] and
/// [`crate::TapOutcome::Failed`].
///
/// Policy refusals (`AlreadyBonded`, `NoAccount`, `BondingBlocked`) are not
/// errors in the transport sense; they are surfaced here so the UI can show
/// an explicit message while the session is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// No decode strategy matched; route to manual entry.
    DecodeFailure,
    /// The tap carried no usable credential parameters.
    MissingParameters,
    /// Proof-of-possession verification failed.
    InvalidSignature,
    /// No local identity is registered for the tapped chip.
    NoLocalIdentity,
    /// The tap's device id is not in the local registry.
    DeviceNotRegistered,
    /// A bond between the two chips already exists.
    AlreadyBonded,
    /// The tapped chip does not resolve to an existing account.
    NoAccount,
    /// Bonding refused: the target account never opted into PIN protection.
    BondingBlocked,
    /// The remote account store could not be reached.
    AccountStoreUnavailable,
    /// The remote bond store could not be reached.
    BondStoreUnavailable,
    /// The local session store failed; the tap was aborted.
    SessionStoreFailure,
}
