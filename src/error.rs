//! Error taxonomy for the blur guard.
//!
//! None of these are fatal. The guard logs them and degrades to either
//! "stay blurred" or "navigate away".

use std::io;

use thiserror::Error;

use crate::auth::{AuthMethod, ChallengeTicket};

pub type Result<T> = std::result::Result<T, GuardError>;

#[derive(Debug, Error)]
pub enum GuardError {
    /// Nothing could be rasterized (zero-size surface, no frame yet).
    #[error("screen capture failed: {0}")]
    CaptureFailed(String),

    /// The user dismissed the credential prompt.
    #[error("credential challenge cancelled")]
    ChallengeCancelled,

    /// Every method the challenger supports asked for a fallback.
    #[error("no authentication method left after {last:?}")]
    FallbackExhausted { last: AuthMethod },

    /// A result arrived for a challenge that is no longer pending.
    #[error("stale challenge result for generation {}", .0.generation)]
    StaleChallenge(ChallengeTicket),

    #[error("authentication store: {0}")]
    AuthStore(#[source] io::Error),

    #[error("invalid authentication metadata: {0}")]
    AuthMetadata(#[from] toml::de::Error),

    #[error("cannot encode authentication metadata: {0}")]
    AuthEncode(#[from] toml::ser::Error),
}
