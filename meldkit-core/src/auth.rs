//! The authentication engine: proof-of-possession verification.
//!
//! Dispatch is a total function over [`TapFormat`], so the verification
//! strategy can never diverge from the decode strategy that produced the
//! record. Verification itself is delegated: identity-handle and
//! device-local records go through the local device registry (sign then
//! verify against the registered key), signature records go through the
//! pure signature verifier.

use std::sync::Arc;

use crate::{
    accounts::{AccountRecord, AccountStore},
    error::{ErrorKind, MeldKitError},
    tap::{default_challenge, CredentialRecord, TapFormat},
};

/// Registered device material resolved from the local device registry.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct DeviceIdentity {
    /// Registry key of the device.
    pub device_id: String,
    /// Public key registered for the device.
    pub public_key: Vec<u8>,
}

/// Local identity/device registry, implemented by the embedding shell.
#[uniffi::export(with_foreign)]
pub trait DeviceRegistry: Send + Sync {
    /// Looks up a registered device by chip id.
    fn resolve_device(&self, chip_id: String) -> Option<DeviceIdentity>;

    /// Looks up a registered device by its device id.
    fn resolve_by_device_id(&self, device_id: String) -> Option<DeviceIdentity>;

    /// Signs `challenge` with the device's private material.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is unknown or signing fails.
    fn sign_locally(
        &self,
        device_id: String,
        challenge: String,
    ) -> Result<Vec<u8>, MeldKitError>;
}

/// Pure signature verification, implemented by the embedding shell.
#[uniffi::export(with_foreign)]
pub trait SignatureVerifier: Send + Sync {
    /// Verifies `signature` over `message` using `public_key`.
    fn verify(&self, signature: Vec<u8>, message: String, public_key: Vec<u8>)
        -> bool;
}

/// Result of one authentication attempt.
///
/// Produced exactly once per tap; never partially populated on failure
/// (`verified == false` implies no token).
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct AuthenticationResult {
    /// Whether proof-of-possession was verified.
    pub verified: bool,
    /// Normalized chip id of the tap.
    pub chip_id: String,
    /// Identity handle of the credential, when the format carries one.
    pub identity_uri: Option<String>,
    /// Opaque session token, minted fresh on every successful call.
    pub session_token: Option<String>,
    /// Synthetic correlation id for the tap, minted with the token.
    pub moment_id: Option<String>,
    /// Failure kind when `verified` is false.
    pub error: Option<ErrorKind>,
    /// The account backing the chip, when the store could be reached.
    /// `None` with `verified == true` means the upsert was swallowed.
    pub account: Option<AccountRecord>,
    /// Whether this tap created the account.
    pub is_new_account: bool,
}

impl AuthenticationResult {
    fn failure(record: &CredentialRecord, error: ErrorKind) -> Self {
        Self {
            verified: false,
            chip_id: record.chip_id.clone(),
            identity_uri: record.identity_uri.clone(),
            session_token: None,
            moment_id: None,
            error: Some(error),
            account: None,
            is_new_account: false,
        }
    }
}

/// The authentication engine.
#[derive(uniffi::Object)]
pub struct AuthEngine {
    registry: Arc<dyn DeviceRegistry>,
    verifier: Arc<dyn SignatureVerifier>,
    accounts: Arc<AccountStore>,
}

#[uniffi::export]
impl AuthEngine {
    /// Creates an engine from its collaborators.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        verifier: Arc<dyn SignatureVerifier>,
        accounts: Arc<AccountStore>,
    ) -> Self {
        Self {
            registry,
            verifier,
            accounts,
        }
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl AuthEngine {
    /// Verifies proof-of-possession for a decoded tap and, on success,
    /// ensures a backing account exists for the chip.
    ///
    /// Verification success is never contingent on account-store
    /// availability: a failed upsert is logged and swallowed, the result
    /// stays `verified` with its token. `now_ms` feeds token minting; pass
    /// `None` to use the system clock.
    pub async fn authenticate(
        &self,
        record: CredentialRecord,
        format: TapFormat,
        now_ms: Option<u64>,
    ) -> AuthenticationResult {
        let now_ms = now_ms.unwrap_or_else(crate::time::unix_millis);

        if let Err(error) = self.verify_possession(&record, format) {
            return AuthenticationResult::failure(&record, error);
        }

        let (account, is_new_account) = self.ensure_account(&record).await;
        AuthenticationResult {
            verified: true,
            chip_id: record.chip_id.clone(),
            identity_uri: record.identity_uri.clone(),
            session_token: Some(format!("{}_session_{now_ms}", format.as_ref())),
            moment_id: Some(format!("moment_{now_ms}")),
            error: None,
            account,
            is_new_account,
        }
    }
}

impl AuthEngine {
    /// Runs the verification strategy implied by the format. No downstream
    /// calls are made for [`TapFormat::None`].
    fn verify_possession(
        &self,
        record: &CredentialRecord,
        format: TapFormat,
    ) -> Result<(), ErrorKind> {
        match format {
            TapFormat::None => Err(ErrorKind::MissingParameters),
            TapFormat::IdentityHandle => {
                let Some(device) = self.registry.resolve_device(record.chip_id.clone())
                else {
                    return Err(ErrorKind::NoLocalIdentity);
                };
                self.sign_and_verify(record, &device, ErrorKind::NoLocalIdentity)
            }
            TapFormat::DeviceLocal => {
                let Some(device_id) = record.device_id.clone() else {
                    return Err(ErrorKind::MissingParameters);
                };
                let Some(device) = self.registry.resolve_by_device_id(device_id)
                else {
                    return Err(ErrorKind::DeviceNotRegistered);
                };
                self.sign_and_verify(record, &device, ErrorKind::DeviceNotRegistered)
            }
            TapFormat::SignatureFull
            | TapFormat::SignatureCompressedSafe
            | TapFormat::SignatureCompressedLegacy
            | TapFormat::SignatureUltraCompressed => {
                let (Some(signature), Some(public_key)) =
                    (record.signature.clone(), record.public_key.clone())
                else {
                    return Err(ErrorKind::MissingParameters);
                };
                if self
                    .verifier
                    .verify(signature, self.challenge_for(record), public_key)
                {
                    Ok(())
                } else {
                    Err(ErrorKind::InvalidSignature)
                }
            }
        }
    }

    /// The local-identity path: sign the challenge with the registered
    /// device's private material, then verify against its registered key.
    fn sign_and_verify(
        &self,
        record: &CredentialRecord,
        device: &DeviceIdentity,
        sign_failure: ErrorKind,
    ) -> Result<(), ErrorKind> {
        let challenge = self.challenge_for(record);
        let signature = self
            .registry
            .sign_locally(device.device_id.clone(), challenge.clone())
            .map_err(|_| sign_failure)?;
        if self
            .verifier
            .verify(signature, challenge, device.public_key.clone())
        {
            Ok(())
        } else {
            Err(ErrorKind::InvalidSignature)
        }
    }

    #[allow(clippy::unused_self)]
    fn challenge_for(&self, record: &CredentialRecord) -> String {
        record
            .challenge
            .clone()
            .unwrap_or_else(|| default_challenge(&record.chip_id))
    }

    /// Idempotent account upsert: create if absent, otherwise leave
    /// untouched. Store failures never downgrade a proven signature; they
    /// are logged and swallowed.
    async fn ensure_account(
        &self,
        record: &CredentialRecord,
    ) -> (Option<AccountRecord>, bool) {
        match self.accounts.get(&record.chip_id).await {
            Ok(Some(account)) => (Some(account), false),
            Ok(None) => match self.accounts.upsert(&record.chip_id, None).await {
                Ok(account) => (Some(account), true),
                Err(err) => {
                    log::warn!(
                        "account upsert failed for {}; keeping verification: {err}",
                        record.chip_id
                    );
                    (None, true)
                }
            },
            Err(err) => {
                log::warn!(
                    "account lookup failed for {}; keeping verification: {err}",
                    record.chip_id
                );
                (None, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tap::{decode_tap, TapParams};
    use std::collections::HashMap;

    struct StaticRegistry {
        device: Option<DeviceIdentity>,
    }

    impl DeviceRegistry for StaticRegistry {
        fn resolve_device(&self, _chip_id: String) -> Option<DeviceIdentity> {
            self.device.clone()
        }

        fn resolve_by_device_id(&self, _device_id: String) -> Option<DeviceIdentity> {
            self.device.clone()
        }

        fn sign_locally(
            &self,
            _device_id: String,
            challenge: String,
        ) -> Result<Vec<u8>, MeldKitError> {
            Ok(challenge.into_bytes())
        }
    }

    struct StaticVerifier {
        accept: bool,
    }

    impl SignatureVerifier for StaticVerifier {
        fn verify(
            &self,
            _signature: Vec<u8>,
            _message: String,
            _public_key: Vec<u8>,
        ) -> bool {
            self.accept
        }
    }

    fn engine(
        device: Option<DeviceIdentity>,
        accept: bool,
        base_url: &str,
    ) -> AuthEngine {
        AuthEngine::new(
            Arc::new(StaticRegistry { device }),
            Arc::new(StaticVerifier { accept }),
            Arc::new(AccountStore::with_base_url(base_url)),
        )
    }

    fn signature_record() -> (CredentialRecord, TapFormat) {
        let pairs: HashMap<String, String> = [
            ("c".to_string(), "AABBCC".to_string()),
            ("s".to_string(), "a1".repeat(64)),
            ("p".to_string(), "b2".repeat(32)),
        ]
        .into_iter()
        .collect();
        let decoded = decode_tap(&TapParams::from_pairs(pairs), Some(0));
        (decoded.record, decoded.format)
    }

    async fn mock_account_endpoints(server: &mut mockito::Server) {
        server
            .mock("GET", mockito::Matcher::Regex("/v1/accounts.*".to_string()))
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/accounts")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "chip_id": "04:AA:BB:CC",
                    "account_id": "acc_new",
                    "display_name": null,
                    "has_pin": false
                })
                .to_string(),
            )
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_format_none_never_calls_account_store() {
        let mut server = mockito::Server::new_async().await;
        let untouched = server
            .mock("GET", mockito::Matcher::Regex(".*".to_string()))
            .expect(0)
            .create_async()
            .await;

        let engine = engine(None, true, &server.url());
        let result = engine
            .authenticate(CredentialRecord::default(), TapFormat::None, Some(0))
            .await;

        assert!(!result.verified);
        assert_eq!(result.error, Some(ErrorKind::MissingParameters));
        assert!(result.session_token.is_none());
        untouched.assert_async().await;
    }

    #[tokio::test]
    async fn test_signature_format_mints_token_and_creates_account() {
        let mut server = mockito::Server::new_async().await;
        mock_account_endpoints(&mut server).await;

        let engine = engine(None, true, &server.url());
        let (record, format) = signature_record();
        let result = engine.authenticate(record, format, Some(42)).await;

        assert!(result.verified);
        assert_eq!(
            result.session_token.as_deref(),
            Some("signature_compressed_safe_session_42")
        );
        assert_eq!(result.moment_id.as_deref(), Some("moment_42"));
        assert!(result.is_new_account);
        assert_eq!(result.account.unwrap().account_id, "acc_new");
    }

    #[tokio::test]
    async fn test_rejected_signature_yields_invalid_signature() {
        let mut server = mockito::Server::new_async().await;
        let untouched = server
            .mock("GET", mockito::Matcher::Regex(".*".to_string()))
            .expect(0)
            .create_async()
            .await;

        let engine = engine(None, false, &server.url());
        let (record, format) = signature_record();
        let result = engine.authenticate(record, format, Some(0)).await;

        assert!(!result.verified);
        assert_eq!(result.error, Some(ErrorKind::InvalidSignature));
        assert!(result.session_token.is_none());
        untouched.assert_async().await;
    }

    #[tokio::test]
    async fn test_identity_handle_without_registered_device_fails() {
        let server = mockito::Server::new_async().await;
        let engine = engine(None, true, &server.url());
        let record = CredentialRecord {
            chip_id: "04:AA:BB".to_string(),
            challenge: Some("MELD_Challenge_04:AA:BB".to_string()),
            ..CredentialRecord::default()
        };

        let result = engine
            .authenticate(record, TapFormat::IdentityHandle, Some(0))
            .await;
        assert!(!result.verified);
        assert_eq!(result.error, Some(ErrorKind::NoLocalIdentity));
    }

    #[tokio::test]
    async fn test_device_local_unknown_device_fails() {
        let server = mockito::Server::new_async().await;
        let engine = engine(None, true, &server.url());
        let record = CredentialRecord {
            chip_id: "04:AA:BB".to_string(),
            device_id: Some("node-7".to_string()),
            challenge: Some("MELD-Local-node-7-0".to_string()),
            ..CredentialRecord::default()
        };

        let result = engine
            .authenticate(record, TapFormat::DeviceLocal, Some(0))
            .await;
        assert!(!result.verified);
        assert_eq!(result.error, Some(ErrorKind::DeviceNotRegistered));
    }

    #[tokio::test]
    async fn test_swallowed_upsert_keeps_verification() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex("/v1/accounts.*".to_string()))
            .with_status(500)
            .create_async()
            .await;

        let engine = engine(None, true, &server.url());
        let (record, format) = signature_record();
        let result = engine.authenticate(record, format, Some(9)).await;

        assert!(result.verified);
        assert!(result.session_token.is_some());
        assert!(result.account.is_none());
    }

    #[tokio::test]
    async fn test_device_local_happy_path() {
        let mut server = mockito::Server::new_async().await;
        mock_account_endpoints(&mut server).await;

        let device = DeviceIdentity {
            device_id: "node-7".to_string(),
            public_key: vec![1, 2, 3],
        };
        let engine = engine(Some(device), true, &server.url());
        let record = CredentialRecord {
            chip_id: "04:AA:BB:CC".to_string(),
            device_id: Some("node-7".to_string()),
            challenge: Some("MELD-Local-node-7-5".to_string()),
            ..CredentialRecord::default()
        };

        let result = engine
            .authenticate(record, TapFormat::DeviceLocal, Some(5))
            .await;
        assert!(result.verified);
        assert_eq!(
            result.session_token.as_deref(),
            Some("device_local_session_5")
        );
    }
}
