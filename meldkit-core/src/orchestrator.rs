//! The tap resolution orchestrator.
//!
//! One tap goes through three stages: decode, authenticate, decide. The
//! resolver serializes taps through a single pipeline slot so a burst of
//! physical taps (NFC re-reads fire several times per contact) produces
//! exactly one resolution, and it owns the only code path that writes the
//! session.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    accounts::AccountStore,
    auth::{AuthEngine, AuthenticationResult, DeviceRegistry, SignatureVerifier},
    bonds::{BondProposal, BondRecord, BondStore},
    error::{ErrorKind, MeldKitError},
    outcome::{PinChallengePayload, RedirectPayload, TapOutcome, TapResolution},
    pin_gate::{requires_pin, PinDecision},
    session::{SessionState, SessionStore},
    tap::{decode_tap, TapFormat, TapParams},
    trace::TraceNote,
};

/// Taps arriving within this window of the last accepted tap are dropped.
const DEBOUNCE_WINDOW_MS: u64 = 3_000;

/// A pipeline run older than this is presumed stuck and force-reset by the
/// next tap, so the reader is never left permanently disabled.
const INFLIGHT_TIMEOUT_MS: u64 = 10_000;

/// Tuning knobs for the tap pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Record)]
pub struct TapConfig {
    /// Debounce window in milliseconds.
    pub debounce_window_ms: u64,
    /// In-flight timeout in milliseconds, after which a stuck pipeline is
    /// force-reset by the next tap.
    pub inflight_timeout_ms: u64,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: DEBOUNCE_WINDOW_MS,
            inflight_timeout_ms: INFLIGHT_TIMEOUT_MS,
        }
    }
}

/// Occupancy of the single pipeline slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Idle,
    InFlight { since_ms: u64 },
}

/// Pipeline bookkeeping, held under one lock.
///
/// The generation counter is bumped whenever a stuck pipeline is
/// force-reset; a run that comes back with a stale generation lost its slot
/// and must discard its result instead of committing a session.
#[derive(Debug)]
struct PipelineGuard {
    state: PipelineState,
    last_accepted_ms: Option<u64>,
    generation: u64,
}

/// Deferred session write, applied only when the run still owns its
/// generation at commit time.
struct SessionAction {
    chip_id: String,
    identity_uri: Option<String>,
}

/// The tap resolver.
#[derive(uniffi::Object)]
pub struct TapResolver {
    engine: AuthEngine,
    sessions: Arc<dyn SessionStore>,
    bonds: Arc<BondStore>,
    config: TapConfig,
    guard: Mutex<PipelineGuard>,
}

#[uniffi::export]
impl TapResolver {
    /// Creates a resolver from its collaborators, with default pipeline
    /// tuning.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        verifier: Arc<dyn SignatureVerifier>,
        sessions: Arc<dyn SessionStore>,
        accounts: Arc<AccountStore>,
        bonds: Arc<BondStore>,
    ) -> Self {
        Self::with_config(
            registry,
            verifier,
            sessions,
            accounts,
            bonds,
            TapConfig::default(),
        )
    }

    /// Creates a resolver with explicit pipeline tuning.
    #[uniffi::constructor]
    #[must_use]
    pub fn with_config(
        registry: Arc<dyn DeviceRegistry>,
        verifier: Arc<dyn SignatureVerifier>,
        sessions: Arc<dyn SessionStore>,
        accounts: Arc<AccountStore>,
        bonds: Arc<BondStore>,
        config: TapConfig,
    ) -> Self {
        Self {
            engine: AuthEngine::new(registry, verifier, accounts),
            sessions,
            bonds,
            config,
            guard: Mutex::new(PipelineGuard {
                state: PipelineState::Idle,
                last_accepted_ms: None,
                generation: 0,
            }),
        }
    }

    /// Clears the device session (explicit logout).
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be written.
    pub fn logout(&self) -> Result<(), MeldKitError> {
        self.sessions.clear()
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl TapResolver {
    /// Resolves one tap end to end.
    ///
    /// Returns `None` when the tap was dropped without a pipeline run:
    /// inside the debounce window of the last accepted tap, while another
    /// tap is still in flight, or when a force reset overtook this run
    /// before it could commit. `None` never carries a session change.
    pub async fn resolve_tap(&self, params: &TapParams) -> Option<TapResolution> {
        let now_ms = crate::time::unix_millis();
        let generation = self.begin(now_ms).await?;
        let (resolution, session_action) = self.run(params, now_ms).await;
        self.commit(generation, resolution, session_action).await
    }

    /// Creates the bond a previously returned [`TapOutcome::BondingProposal`]
    /// described, once the confirmation UI accepts it.
    ///
    /// Returns `None` when the bond already exists (the server refused the
    /// duplicate).
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or an invalid response.
    pub async fn confirm_bond(
        &self,
        proposal: &BondProposal,
    ) -> Result<Option<BondRecord>, MeldKitError> {
        self.bonds.create(proposal).await
    }
}

impl TapResolver {
    /// Claims the pipeline slot. Returns the generation owning the run, or
    /// `None` when the tap is debounced or the slot is legitimately busy.
    async fn begin(&self, now_ms: u64) -> Option<u64> {
        let mut guard = self.guard.lock().await;

        if let PipelineState::InFlight { since_ms } = guard.state {
            let age_ms = now_ms.saturating_sub(since_ms);
            if age_ms < self.config.inflight_timeout_ms {
                log::debug!("tap dropped: pipeline busy for {age_ms}ms");
                return None;
            }
            log::warn!("force-resetting tap pipeline stuck for {age_ms}ms");
            guard.generation += 1;
            guard.state = PipelineState::Idle;
        }

        if let Some(last_ms) = guard.last_accepted_ms {
            if now_ms.saturating_sub(last_ms) < self.config.debounce_window_ms {
                log::debug!("tap dropped: inside debounce window");
                return None;
            }
        }

        guard.generation += 1;
        guard.state = PipelineState::InFlight { since_ms: now_ms };
        guard.last_accepted_ms = Some(now_ms);
        Some(guard.generation)
    }

    /// Commits a finished run: applies the deferred session write and frees
    /// the slot, unless a force reset overtook the run while it was
    /// suspended.
    async fn commit(
        &self,
        generation: u64,
        mut resolution: TapResolution,
        session_action: Option<SessionAction>,
    ) -> Option<TapResolution> {
        let mut guard = self.guard.lock().await;
        if guard.generation != generation {
            log::warn!("discarding late tap result from a superseded pipeline run");
            return None;
        }

        if let Some(action) = session_action {
            if let Err(err) = self
                .sessions
                .create(action.chip_id, action.identity_uri)
            {
                log::error!("session create failed at commit: {err}");
                resolution.outcome = TapOutcome::Failed {
                    kind: ErrorKind::SessionStoreFailure,
                    message: err.to_string(),
                };
            }
        }

        guard.state = PipelineState::Idle;
        Some(resolution)
    }

    /// One pipeline run: decode, authenticate, decide. Session writes are
    /// returned to the caller rather than applied, so commit can discard
    /// them if the run lost its generation.
    async fn run(
        &self,
        params: &TapParams,
        now_ms: u64,
    ) -> (TapResolution, Option<SessionAction>) {
        let mut trace = Vec::new();

        let decoded = decode_tap(params, Some(now_ms));
        trace.extend(
            decoded
                .notes
                .iter()
                .cloned()
                .map(|note| TraceNote::Decode { note }),
        );
        if decoded.format == TapFormat::None {
            return (
                fail(
                    trace,
                    ErrorKind::DecodeFailure,
                    "no decode strategy matched the tap parameters",
                ),
                None,
            );
        }

        // Session state is read before deciding anything: without it the
        // same-chip and bonding branches cannot be told apart.
        let session = match self.sessions.get_current() {
            Ok(session) => session,
            Err(err) => {
                return (
                    fail(trace, ErrorKind::SessionStoreFailure, &err.to_string()),
                    None,
                )
            }
        };

        let auth = self
            .engine
            .authenticate(decoded.record, decoded.format, Some(now_ms))
            .await;
        if !auth.verified {
            let kind = auth.error.unwrap_or(ErrorKind::InvalidSignature);
            trace.push(TraceNote::AuthenticationFailed {
                kind: kind.as_ref().to_string(),
            });
            return (
                fail(trace, kind, "proof-of-possession verification failed"),
                None,
            );
        }
        trace.push(TraceNote::Authenticated {
            strategy: decoded.format.as_ref().to_string(),
            session_token: auth.session_token.clone().unwrap_or_default(),
        });
        match &auth.account {
            Some(account) => trace.push(TraceNote::AccountEnsured {
                chip_id: account.chip_id.clone(),
                created: auth.is_new_account,
            }),
            None => trace.push(TraceNote::AccountStoreSkipped {
                error: "account store unreachable; verification stands".to_string(),
            }),
        }

        let same_chip = match self.sessions.is_same_chip(auth.chip_id.clone()) {
            Ok(same) => same && session.active,
            Err(err) => {
                return (
                    fail(trace, ErrorKind::SessionStoreFailure, &err.to_string()),
                    None,
                )
            }
        };

        let source = decoded.format.as_ref();
        if same_chip {
            trace.push(TraceNote::Branch {
                taken: "same_chip".to_string(),
            });
            Self::decide_access(trace, &auth, source, true)
        } else if session.active {
            trace.push(TraceNote::Branch {
                taken: "bonding".to_string(),
            });
            self.decide_bonding(trace, &auth, &session).await
        } else {
            trace.push(TraceNote::Branch {
                taken: "plain".to_string(),
            });
            Self::decide_access(trace, &auth, source, false)
        }
    }

    /// Decision for the plain and same-chip branches: the tap is trying to
    /// become (or re-prove) the device's current user.
    fn decide_access(
        mut trace: Vec<TraceNote>,
        auth: &AuthenticationResult,
        source: &str,
        same_chip: bool,
    ) -> (TapResolution, Option<SessionAction>) {
        let Some(account) = &auth.account else {
            // Granting or gating access without knowing the account's PIN
            // state would turn a store outage into a policy bypass.
            return (
                fail(
                    trace,
                    ErrorKind::AccountStoreUnavailable,
                    "account state unknown; refusing to decide the PIN gate",
                ),
                None,
            );
        };

        let account_exists = !auth.is_new_account;
        let decision = requires_pin(account_exists, account.has_pin, same_chip, false);
        trace.push(TraceNote::PinGate {
            decision: decision.name().to_string(),
        });

        match decision {
            PinDecision::NotRequired if account_exists => {
                let redirect = RedirectPayload {
                    chip_id: auth.chip_id.clone(),
                    session_token: auth.session_token.clone().unwrap_or_default(),
                    moment_id: auth.moment_id.clone().unwrap_or_default(),
                    source: source.to_string(),
                };
                let action = SessionAction {
                    chip_id: auth.chip_id.clone(),
                    identity_uri: auth.identity_uri.clone(),
                };
                (
                    resolution(trace, TapOutcome::DirectPass { redirect }),
                    Some(action),
                )
            }
            PinDecision::NotRequired => {
                // Brand-new account: the session waits until the PIN setup
                // step completes.
                let challenge = PinChallengePayload {
                    chip_id: auth.chip_id.clone(),
                    is_new_account: true,
                    is_new_device: !same_chip,
                    has_pin: false,
                    display_name: account.display_name.clone(),
                    bonding_with: None,
                };
                (
                    resolution(trace, TapOutcome::PinChallenge { challenge }),
                    None,
                )
            }
            PinDecision::Required { .. } => {
                let challenge = PinChallengePayload {
                    chip_id: auth.chip_id.clone(),
                    is_new_account: false,
                    is_new_device: !same_chip,
                    has_pin: true,
                    display_name: account.display_name.clone(),
                    bonding_with: None,
                };
                (
                    resolution(trace, TapOutcome::PinChallenge { challenge }),
                    None,
                )
            }
            PinDecision::BondingBlocked { reason } => {
                // Unreachable with `is_bonding_attempt == false`; surfaced
                // rather than swallowed if the gate ever changes.
                (fail(trace, ErrorKind::BondingBlocked, &reason), None)
            }
        }
    }

    /// Decision for the bonding branch: another chip tapped while a session
    /// is active. The active session is never replaced here.
    async fn decide_bonding(
        &self,
        mut trace: Vec<TraceNote>,
        auth: &AuthenticationResult,
        session: &SessionState,
    ) -> (TapResolution, Option<SessionAction>) {
        let Some(from_chip_id) = session.current_chip_id.clone() else {
            return (
                fail(
                    trace,
                    ErrorKind::SessionStoreFailure,
                    "active session is missing its chip id",
                ),
                None,
            );
        };
        let to_chip_id = auth.chip_id.clone();

        match self.bonds.are_bonded(&from_chip_id, &to_chip_id).await {
            Ok(true) => {
                trace.push(TraceNote::BondLookup {
                    already_bonded: true,
                });
                return (
                    fail(
                        trace,
                        ErrorKind::AlreadyBonded,
                        "these chips are already bonded",
                    ),
                    None,
                );
            }
            Ok(false) => trace.push(TraceNote::BondLookup {
                already_bonded: false,
            }),
            Err(err) => {
                return (
                    fail(trace, ErrorKind::BondStoreUnavailable, &err.to_string()),
                    None,
                )
            }
        }

        let Some(account) = &auth.account else {
            // A missing record means one of two things: the store confirmed
            // no account existed and the creating upsert failed
            // (is_new_account), or the lookup itself failed and the account
            // state is simply unknown.
            let (kind, message) = if auth.is_new_account {
                (
                    ErrorKind::NoAccount,
                    "the tapped chip does not resolve to an account",
                )
            } else {
                (
                    ErrorKind::AccountStoreUnavailable,
                    "account state unknown; refusing to decide bonding",
                )
            };
            return (fail(trace, kind, message), None);
        };

        let decision = requires_pin(!auth.is_new_account, account.has_pin, false, true);
        trace.push(TraceNote::PinGate {
            decision: decision.name().to_string(),
        });

        match decision {
            PinDecision::BondingBlocked { reason } => {
                (fail(trace, ErrorKind::BondingBlocked, &reason), None)
            }
            PinDecision::Required { .. } => {
                let challenge = PinChallengePayload {
                    chip_id: to_chip_id,
                    is_new_account: auth.is_new_account,
                    is_new_device: true,
                    has_pin: account.has_pin,
                    display_name: account.display_name.clone(),
                    bonding_with: Some(from_chip_id),
                };
                (
                    resolution(trace, TapOutcome::PinChallenge { challenge }),
                    None,
                )
            }
            PinDecision::NotRequired => {
                let proposal = BondProposal {
                    from_chip_id,
                    to_chip_id,
                    display_name: account.display_name.clone(),
                };
                (
                    resolution(trace, TapOutcome::BondingProposal { proposal }),
                    None,
                )
            }
        }
    }
}

fn resolution(trace: Vec<TraceNote>, outcome: TapOutcome) -> TapResolution {
    TapResolution { outcome, trace }
}

fn fail(trace: Vec<TraceNote>, kind: ErrorKind, message: &str) -> TapResolution {
    TapResolution {
        outcome: TapOutcome::Failed {
            kind,
            message: message.to_string(),
        },
        trace,
    }
}
