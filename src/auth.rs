//! Authentication challenge plumbing.
//!
//! The guard never validates credentials itself. It hands a
//! [`ChallengeRequest`] and a [`ChallengeResponder`] to the host's
//! [`AuthenticationChallenger`] and waits. The responder can be moved to
//! any thread (a biometric prompt usually answers from a platform thread);
//! the result is queued in the guard's mailbox and applied on the next
//! [`BlurGuard::pump`](crate::guard::BlurGuard::pump).
//!
//! ```text
//! BlurGuard ──challenge(request, responder)──▶ AuthenticationChallenger
//!     ▲                                              │ (plus tard, n'importe quel thread)
//!     │ pump()                                       ▼
//!  mailbox ◀──────── GuardMessage::Resolved ── responder.respond(outcome)
//!                                                    │
//!                                              HostWaker::wake()
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::guard::GuardMessage;

/// Credential validation method, in the order the guard tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Biometric,
    Passcode,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Biometric => f.write_str("biometric"),
            Self::Passcode => f.write_str("passcode"),
        }
    }
}

/// Terminal result of one challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationOutcome {
    Success,
    /// The user dismissed the prompt.
    Cancel,
    /// The method is unavailable or the user asked for another one.
    Fallback,
}

/// Identifies one challenge. A result is applied only if its ticket is the
/// one the guard is still waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChallengeTicket {
    /// Bumped on every new prompt, on detach and on navigation away.
    pub generation: u64,
    pub method: AuthMethod,
    /// Index of `method` in the method list of this prompt.
    pub attempt: usize,
}

/// What the challenger is asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeRequest {
    pub ticket: ChallengeTicket,
    /// Name of the guarded screen, for the prompt and for logs.
    pub screen: String,
    /// User-facing reason ("Authenticate to view saved logins").
    pub reason: String,
}

/// Wakes the host's event loop so it pumps the guard.
///
/// Same contract as an embedder's event-loop waker: cheap, callable from any
/// thread, never blocks.
pub trait HostWaker: Send + Sync {
    fn wake(&self);
}

/// One-shot reply channel for a challenge.
///
/// Dropping it without answering is reported to the guard as abandoned: the
/// screen stays blurred and the next foreground transition prompts again.
pub struct ChallengeResponder {
    ticket: ChallengeTicket,
    tx: Option<Sender<GuardMessage>>,
    waker: Option<Arc<dyn HostWaker>>,
}

impl ChallengeResponder {
    pub(crate) fn new(
        ticket: ChallengeTicket,
        tx: Sender<GuardMessage>,
        waker: Option<Arc<dyn HostWaker>>,
    ) -> Self {
        Self {
            ticket,
            tx: Some(tx),
            waker,
        }
    }

    pub fn ticket(&self) -> ChallengeTicket {
        self.ticket
    }

    pub fn respond(mut self, outcome: AuthenticationOutcome) {
        self.send(GuardMessage::Resolved(self.ticket, outcome));
    }

    fn send(&mut self, message: GuardMessage) {
        let Some(tx) = self.tx.take() else { return };
        if tx.send(message).is_err() {
            // Guard dropped or detached in the meantime.
            debug!(generation = self.ticket.generation, "Challenge result dropped, guard gone");
            return;
        }
        if let Some(waker) = &self.waker {
            waker.wake();
        }
    }
}

impl Drop for ChallengeResponder {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.send(GuardMessage::Abandoned(self.ticket));
        }
    }
}

impl fmt::Debug for ChallengeResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeResponder")
            .field("ticket", &self.ticket)
            .field("answered", &self.tx.is_none())
            .finish()
    }
}

/// Performs credential validation (biometric or passcode matching is out of
/// this crate's hands).
///
/// Must not block: show the prompt, keep the responder, return.
/// Answering synchronously from inside `challenge` is allowed, the result is
/// only applied on the next pump.
pub trait AuthenticationChallenger {
    fn challenge(&self, request: ChallengeRequest, responder: ChallengeResponder);
}
