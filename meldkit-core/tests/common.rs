//! Common test utilities shared across integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use meldkit_core::{
    AccountStore, BondStore, DeviceIdentity, DeviceRegistry, MeldKitError,
    SessionState, SessionStore, SignatureVerifier, TapConfig, TapResolver,
};

/// Session store backed by a plain in-process mutex.
pub struct InMemorySessionStore {
    state: Mutex<SessionState>,
}

impl InMemorySessionStore {
    /// Creates an empty store with no active session.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Pre-seeds an active session, as if an earlier tap had created it.
    pub fn with_active_session(chip_id: &str) -> Self {
        Self {
            state: Mutex::new(SessionState {
                active: true,
                current_chip_id: Some(chip_id.to_string()),
                current_identity_uri: None,
                expires_at: u64::MAX,
            }),
        }
    }

    /// Returns a copy of the current session state.
    pub fn snapshot(&self) -> SessionState {
        self.state.lock().expect("session mutex poisoned").clone()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_current(&self) -> Result<SessionState, MeldKitError> {
        let guard = self.state.lock().map_err(|_| {
            MeldKitError::SessionStoreFailure {
                error: "mutex poisoned".to_string(),
            }
        })?;
        Ok(guard.clone())
    }

    fn create(
        &self,
        chip_id: String,
        identity_uri: Option<String>,
    ) -> Result<SessionState, MeldKitError> {
        let mut guard = self.state.lock().map_err(|_| {
            MeldKitError::SessionStoreFailure {
                error: "mutex poisoned".to_string(),
            }
        })?;
        *guard = SessionState {
            active: true,
            current_chip_id: Some(chip_id),
            current_identity_uri: identity_uri,
            expires_at: u64::MAX,
        };
        Ok(guard.clone())
    }

    fn is_same_chip(&self, chip_id: String) -> Result<bool, MeldKitError> {
        let guard = self.state.lock().map_err(|_| {
            MeldKitError::SessionStoreFailure {
                error: "mutex poisoned".to_string(),
            }
        })?;
        Ok(guard.current_chip_id.as_deref() == Some(chip_id.as_str()))
    }

    fn clear(&self) -> Result<(), MeldKitError> {
        let mut guard = self.state.lock().map_err(|_| {
            MeldKitError::SessionStoreFailure {
                error: "mutex poisoned".to_string(),
            }
        })?;
        *guard = SessionState::default();
        Ok(())
    }
}

/// Device registry with a fixed set of registered devices.
///
/// `sign_locally` produces `public_key || challenge bytes`, which
/// [`TestVerifier`] accepts. Anything else fails verification.
pub struct TestRegistry {
    by_chip: HashMap<String, DeviceIdentity>,
    by_device: HashMap<String, DeviceIdentity>,
}

impl TestRegistry {
    /// Creates a registry with no registered devices.
    pub fn new() -> Self {
        Self {
            by_chip: HashMap::new(),
            by_device: HashMap::new(),
        }
    }

    /// Registers a device under both its chip ID and device ID.
    #[must_use]
    pub fn with_device(mut self, chip_id: &str, device_id: &str) -> Self {
        let identity = DeviceIdentity {
            device_id: device_id.to_string(),
            public_key: format!("pk:{device_id}").into_bytes(),
        };
        self.by_chip.insert(chip_id.to_string(), identity.clone());
        self.by_device.insert(device_id.to_string(), identity);
        self
    }
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry for TestRegistry {
    fn resolve_device(&self, chip_id: String) -> Option<DeviceIdentity> {
        self.by_chip.get(&chip_id).cloned()
    }

    fn resolve_by_device_id(&self, device_id: String) -> Option<DeviceIdentity> {
        self.by_device.get(&device_id).cloned()
    }

    fn sign_locally(
        &self,
        device_id: String,
        challenge: String,
    ) -> Result<Vec<u8>, MeldKitError> {
        let identity = self.by_device.get(&device_id).ok_or_else(|| {
            MeldKitError::DeviceNotRegistered {
                device_id: device_id.clone(),
            }
        })?;
        Ok(test_signature(&identity.public_key, &challenge))
    }
}

/// Verifier matching the deterministic signatures [`TestRegistry`] mints.
pub struct TestVerifier;

impl SignatureVerifier for TestVerifier {
    fn verify(
        &self,
        signature: Vec<u8>,
        message: String,
        public_key: Vec<u8>,
    ) -> bool {
        signature == test_signature(&public_key, &message)
    }
}

/// The deterministic test signature: `public_key || message bytes`.
pub fn test_signature(public_key: &[u8], message: &str) -> Vec<u8> {
    let mut out = public_key.to_vec();
    out.extend_from_slice(message.as_bytes());
    out
}

/// Builds a resolver wired to a mock HTTP server and the given fakes.
#[allow(dead_code, reason = "used in tests")]
pub fn test_resolver(
    server_url: &str,
    registry: TestRegistry,
    sessions: Arc<InMemorySessionStore>,
) -> TapResolver {
    TapResolver::with_config(
        Arc::new(registry),
        Arc::new(TestVerifier),
        sessions,
        Arc::new(AccountStore::with_base_url(server_url)),
        Arc::new(BondStore::with_base_url(server_url)),
        TapConfig {
            debounce_window_ms: 0,
            inflight_timeout_ms: 10_000,
        },
    )
}

/// As [`test_resolver`], but keeping the default debounce window.
#[allow(dead_code, reason = "used in tests")]
pub fn debouncing_resolver(
    server_url: &str,
    registry: TestRegistry,
    sessions: Arc<InMemorySessionStore>,
) -> TapResolver {
    TapResolver::new(
        Arc::new(registry),
        Arc::new(TestVerifier),
        sessions,
        Arc::new(AccountStore::with_base_url(server_url)),
        Arc::new(BondStore::with_base_url(server_url)),
    )
}
