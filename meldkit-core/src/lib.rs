#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Core library for `MeldKit`: decoding, authenticating and resolving MELD
//! NFC taps into session, PIN-challenge and bonding outcomes.

use strum::EnumString;

/// Deployment environment the kit talks to.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Object, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Staging backend.
    Staging,
    /// Production backend.
    Production,
}

impl Environment {
    /// Base URL of the MELD account and bond API for this environment.
    #[must_use]
    pub const fn api_base_url(&self) -> &'static str {
        match self {
            Self::Staging => "https://api.stage.meldritual.app",
            Self::Production => "https://api.meldritual.app",
        }
    }
}

mod accounts;
pub use accounts::*;

mod auth;
pub use auth::*;

mod bonds;
pub use bonds::*;

mod error;
pub use error::*;

/// Pluggable logging facade exported over `UniFFI`.
pub mod logger;

mod orchestrator;
pub use orchestrator::*;

mod outcome;
pub use outcome::*;

mod pin_gate;
pub use pin_gate::*;

mod session;
pub use session::*;

mod tap;
pub use tap::*;

mod trace;
pub use trace::*;

// private modules
mod http_request;
mod time;

uniffi::setup_scaffolding!("meldkit_core");
