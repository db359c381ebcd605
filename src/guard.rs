//! Flou de confidentialité d'un écran sensible.
//!
//! ## Machine à états
//!
//! ```text
//!                 WillResignActive
//!        Clear ────────────────────▶ Backgrounded
//!          ▲                              │ WillEnterForeground / DidBecomeActive
//!          │ pas de validation requise    ▼
//!          ├──────────────────── check_if_user_requires_validation()
//!          │                              │ validation requise
//!          │ Success / Cancel             ▼
//!          └──────────────────────── Prompting ◀─┐ Fallback (méthode suivante)
//!                                         │ ─────┘
//!                                         │ Fallback (plus de méthode) / abandon
//!                                         ▼
//!                                     LockedOut ── foreground ──▶ Prompting
//! ```
//!
//! L'overlay flouté n'est retiré que sur `Clear`. Tant qu'un challenge est en
//! cours, aucune transition de cycle de vie ne peut le retirer.
//!
//! ## Boîte aux lettres
//!
//! Les événements de cycle de vie et les résultats d'authentification sont
//! mis en file ([`GuardMessage`]) puis appliqués par [`BlurGuard::pump`] sur
//! le thread propriétaire. Un résultat n'est appliqué que si son ticket est
//! celui du challenge en attente.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::auth::{
    AuthMethod, AuthenticationChallenger, AuthenticationOutcome, ChallengeRequest,
    ChallengeResponder, ChallengeTicket, HostWaker,
};
use crate::blur::{BlurFilter, BlurParams};
use crate::capture::ScreenCapture;
use crate::config::{AuthConfig, Config};
use crate::error::{GuardError, Result};
use crate::keychain::AuthInfoStore;
use crate::lifecycle::{EventSink, LifecycleEvent, LifecycleSource, Subscription};
use crate::screen::{BlurOverlay, GuardedScreen};

/// Message queued for the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardMessage {
    Lifecycle(LifecycleEvent),
    Resolved(ChallengeTicket, AuthenticationOutcome),
    /// The responder was dropped without an answer.
    Abandoned(ChallengeTicket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Clear,
    Backgrounded,
    Prompting(ChallengeTicket),
    LockedOut,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Backgrounded => "backgrounded",
            Self::Prompting(_) => "prompting",
            Self::LockedOut => "locked-out",
        }
    }
}

/// External collaborators of a guard.
pub struct Collaborators<S> {
    pub capture: Box<dyn ScreenCapture<S>>,
    pub filter: Box<dyn BlurFilter>,
    pub challenger: Box<dyn AuthenticationChallenger>,
    pub store: Box<dyn AuthInfoStore>,
}

/// Privacy blur guard owning one sensitive screen.
pub struct BlurGuard<S: GuardedScreen> {
    screen: S,
    phase: Phase,
    overlay: Option<BlurOverlay>,

    capture: Box<dyn ScreenCapture<S>>,
    filter: Box<dyn BlurFilter>,
    challenger: Box<dyn AuthenticationChallenger>,
    store: Box<dyn AuthInfoStore>,

    params: BlurParams,
    auth: AuthConfig,
    /// Methods of the prompt in progress, indexed by `ChallengeTicket::attempt`.
    methods: Vec<AuthMethod>,
    generation: u64,

    tx: Sender<GuardMessage>,
    rx: Receiver<GuardMessage>,
    waker: Option<Arc<dyn HostWaker>>,
    subscriptions: Vec<Subscription>,
    clock: fn() -> SystemTime,
}

impl<S: GuardedScreen> BlurGuard<S> {
    pub fn new(screen: S, collaborators: Collaborators<S>) -> Self {
        let (tx, rx) = mpsc::channel();
        let Collaborators {
            capture,
            filter,
            challenger,
            store,
        } = collaborators;

        Self {
            screen,
            phase: Phase::Clear,
            overlay: None,
            capture,
            filter,
            challenger,
            store,
            params: BlurParams::default(),
            auth: AuthConfig::default(),
            methods: Vec::new(),
            generation: 0,
            tx,
            rx,
            waker: None,
            subscriptions: Vec::new(),
            clock: SystemTime::now,
        }
    }

    pub fn with_config(mut self, config: &Config) -> Self {
        self.params = config.blur.clone();
        self.auth = config.auth.clone();
        self
    }

    /// Called by responders after queueing a result.
    pub fn with_waker(mut self, waker: Arc<dyn HostWaker>) -> Self {
        self.waker = Some(waker);
        self
    }

    pub fn with_clock(mut self, clock: fn() -> SystemTime) -> Self {
        self.clock = clock;
        self
    }

    // ── Accessors ─────────────────────────────────────────────────────

    pub fn screen(&self) -> &S {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut S {
        &mut self.screen
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn overlay(&self) -> Option<&BlurOverlay> {
        self.overlay.as_ref()
    }

    pub fn is_blurred(&self) -> bool {
        self.overlay.is_some()
    }

    pub fn is_prompting_for_credential(&self) -> bool {
        matches!(self.phase, Phase::Prompting(_))
    }

    pub fn pending_ticket(&self) -> Option<ChallengeTicket> {
        match self.phase {
            Phase::Prompting(ticket) => Some(ticket),
            _ => None,
        }
    }

    pub fn is_attached(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    // ── Subscriptions ─────────────────────────────────────────────────

    /// Subscribes to the three lifecycle events. Attaching twice replaces the
    /// previous set, so the guard never holds more than one per event.
    pub fn attach(&mut self, source: &dyn LifecycleSource) {
        self.subscriptions.clear();
        self.subscriptions = LifecycleEvent::ALL
            .into_iter()
            .map(|event| source.subscribe(event, EventSink::new(self.tx.clone())))
            .collect();
        debug!(screen = self.screen.name(), "Lifecycle observers registered");
    }

    /// Releases the lifecycle subscriptions and invalidates any challenge in
    /// flight. A pending prompt leaves the screen locked out, still blurred.
    pub fn detach(&mut self) {
        self.subscriptions.clear();
        self.generation += 1;
        if self.is_prompting_for_credential() {
            self.set_phase(Phase::LockedOut);
        }
        // Anything still queued refers to the old generation.
        while self.rx.try_recv().is_ok() {}
        debug!(screen = self.screen.name(), "Lifecycle observers released");
    }

    // ── Event loop integration ────────────────────────────────────────

    /// Applies every queued message. Returns how many were processed.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(message) = self.rx.try_recv() {
            processed += 1;

            let result = match message {
                GuardMessage::Lifecycle(event) => {
                    self.handle_event(event);
                    Ok(())
                }
                GuardMessage::Resolved(ticket, outcome) => self.resolve(ticket, outcome),
                GuardMessage::Abandoned(ticket) => self.abandon(ticket),
            };
            if let Err(error) = result {
                self.report(&error);
            }
        }
        processed
    }

    pub fn handle_event(&mut self, event: LifecycleEvent) {
        debug!(screen = self.screen.name(), %event, phase = self.phase.name(), "Lifecycle event");
        match event {
            LifecycleEvent::WillResignActive => {
                self.blur_contents();
                if self.phase == Phase::Clear {
                    self.set_phase(Phase::Backgrounded);
                }
            }
            LifecycleEvent::WillEnterForeground | LifecycleEvent::DidBecomeActive => {
                self.check_if_user_requires_validation();
            }
        }
    }

    // ── Blur overlay ──────────────────────────────────────────────────

    /// Installs the blurred overlay unless one is already there. A screen
    /// with nothing to capture simply stays without overlay.
    pub fn blur_contents(&mut self) {
        if self.overlay.is_some() {
            return;
        }
        match self
            .screen
            .add_blurred_content(self.capture.as_ref(), self.filter.as_ref(), &self.params)
        {
            Ok(overlay) => {
                debug!(
                    screen = self.screen.name(),
                    width = overlay.image().width(),
                    height = overlay.image().height(),
                    "Blur overlay installed"
                );
                self.overlay = Some(overlay);
            }
            Err(error) => debug!(screen = self.screen.name(), %error, "Nothing to blur"),
        }
    }

    /// Removes the overlay, unless a credential prompt is pending or the
    /// screen is locked out.
    pub fn remove_backgrounded_blur(&mut self) {
        match self.phase {
            Phase::Prompting(_) | Phase::LockedOut => {
                debug!(screen = self.screen.name(), phase = self.phase.name(), "Blur kept");
                return;
            }
            Phase::Backgrounded => self.set_phase(Phase::Clear),
            Phase::Clear => {}
        }
        if self.overlay.take().is_some() {
            self.screen.remove_overlay();
            debug!(screen = self.screen.name(), "Blur overlay removed");
        }
    }

    // ── Authentication ────────────────────────────────────────────────

    /// Decides, from the stored metadata, whether a returning user must
    /// authenticate before the overlay goes away.
    pub fn check_if_user_requires_validation(&mut self) {
        match self.phase {
            Phase::Clear => return,
            Phase::Prompting(ticket) => {
                debug!(
                    screen = self.screen.name(),
                    generation = ticket.generation,
                    "Challenge already in flight"
                );
                return;
            }
            Phase::Backgrounded | Phase::LockedOut => {}
        }

        let methods = match self.store.load() {
            Ok(Some(info)) if info.requires_validation((self.clock)()) => {
                info.methods(self.auth.allow_biometrics)
            }
            Ok(_) => {
                self.set_phase(Phase::Clear);
                self.remove_backgrounded_blur();
                return;
            }
            Err(error) => {
                warn!(screen = self.screen.name(), %error, "Authentication metadata unreadable, requiring passcode");
                vec![AuthMethod::Passcode]
            }
        };

        self.start_challenge(methods);
    }

    fn start_challenge(&mut self, methods: Vec<AuthMethod>) {
        // A failed capture at resign time gets a second chance here.
        self.blur_contents();
        self.methods = methods;
        self.prompt(0);
    }

    /// Prompts with `self.methods[attempt]`. Caller guarantees the index.
    fn prompt(&mut self, attempt: usize) {
        self.generation += 1;
        let ticket = ChallengeTicket {
            generation: self.generation,
            method: self.methods[attempt],
            attempt,
        };
        self.set_phase(Phase::Prompting(ticket));

        let request = ChallengeRequest {
            ticket,
            screen: self.screen.name().to_string(),
            reason: self.auth.prompt_reason.clone(),
        };
        let responder = ChallengeResponder::new(ticket, self.tx.clone(), self.waker.clone());
        info!(
            screen = self.screen.name(),
            method = %ticket.method,
            generation = ticket.generation,
            "Requesting credential validation"
        );
        self.challenger.challenge(request, responder);
    }

    /// Applies a challenge result. Cancellation and exhaustion are reported
    /// as errors after the state change has been made.
    pub fn resolve(&mut self, ticket: ChallengeTicket, outcome: AuthenticationOutcome) -> Result<()> {
        if self.pending_ticket() != Some(ticket) {
            return Err(GuardError::StaleChallenge(ticket));
        }
        info!(
            screen = self.screen.name(),
            method = %ticket.method,
            ?outcome,
            "Credential challenge resolved"
        );

        match outcome {
            AuthenticationOutcome::Success => {
                self.record_validation();
                self.clear();
                Ok(())
            }
            AuthenticationOutcome::Cancel => {
                // Leave first, then uncover: the sensitive content is never
                // shown again without a validation.
                self.screen.pop_to_root();
                self.clear();
                Err(GuardError::ChallengeCancelled)
            }
            AuthenticationOutcome::Fallback => {
                let next = ticket.attempt + 1;
                if next < self.methods.len() {
                    self.prompt(next);
                    Ok(())
                } else {
                    self.set_phase(Phase::LockedOut);
                    self.screen.show_locked_out();
                    Err(GuardError::FallbackExhausted { last: ticket.method })
                }
            }
        }
    }

    fn abandon(&mut self, ticket: ChallengeTicket) -> Result<()> {
        if self.pending_ticket() != Some(ticket) {
            return Err(GuardError::StaleChallenge(ticket));
        }
        warn!(screen = self.screen.name(), method = %ticket.method, "Challenge abandoned without an answer");
        self.set_phase(Phase::LockedOut);
        self.screen.show_locked_out();
        Ok(())
    }

    pub fn on_credential_validated(&mut self) -> Result<()> {
        self.resolve_pending(AuthenticationOutcome::Success)
    }

    pub fn on_credential_cancelled(&mut self) -> Result<()> {
        self.resolve_pending(AuthenticationOutcome::Cancel)
    }

    pub fn on_credential_fallback(&mut self) -> Result<()> {
        self.resolve_pending(AuthenticationOutcome::Fallback)
    }

    fn resolve_pending(&mut self, outcome: AuthenticationOutcome) -> Result<()> {
        match self.pending_ticket() {
            Some(ticket) => self.resolve(ticket, outcome),
            None => {
                debug!(screen = self.screen.name(), ?outcome, "No challenge pending");
                Ok(())
            }
        }
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn clear(&mut self) {
        self.methods.clear();
        self.set_phase(Phase::Clear);
        self.remove_backgrounded_blur();
    }

    fn record_validation(&mut self) {
        let saved = self.store.load().and_then(|info| {
            let mut info = info.unwrap_or_default();
            info.record_validation((self.clock)());
            self.store.save(&info)
        });
        if let Err(error) = saved {
            warn!(screen = self.screen.name(), %error, "Cannot record validation time");
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(
                screen = self.screen.name(),
                from = self.phase.name(),
                to = phase.name(),
                "Guard transition"
            );
            self.phase = phase;
        }
    }

    fn report(&self, error: &GuardError) {
        match error {
            GuardError::StaleChallenge(_) => debug!(screen = self.screen.name(), %error, "Ignored"),
            GuardError::ChallengeCancelled => {
                info!(screen = self.screen.name(), "Challenge cancelled, navigated to root")
            }
            _ => warn!(screen = self.screen.name(), %error, "Guard error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ScreenSize;
    use crate::keychain::{AuthenticationInfo, MemoryAuthStore, PasscodeInterval};
    use crate::lifecycle::LifecycleHub;
    use crate::testing::{
        RecordingScreen, ScriptedChallenger, UnreadableStore, guard_with, guard_with_challenger,
    };

    use crate::auth::AuthenticationOutcome::{Cancel, Fallback, Success};
    use crate::lifecycle::LifecycleEvent::{DidBecomeActive, WillEnterForeground, WillResignActive};

    fn passcode_store() -> MemoryAuthStore {
        MemoryAuthStore::new(Some(AuthenticationInfo::with_passcode()))
    }

    fn biometric_store() -> MemoryAuthStore {
        MemoryAuthStore::new(Some(AuthenticationInfo {
            use_biometrics: true,
            ..AuthenticationInfo::with_passcode()
        }))
    }

    fn background_and_return(guard: &mut BlurGuard<RecordingScreen>) {
        guard.handle_event(WillResignActive);
        guard.handle_event(DidBecomeActive);
    }

    // ── Overlay ───────────────────────────────────────────────────────

    #[test]
    fn test_initial_state_is_clear() {
        let (guard, _) = guard_with(MemoryAuthStore::default());
        assert_eq!(guard.phase(), Phase::Clear);
        assert!(!guard.is_blurred());
        assert!(!guard.is_prompting_for_credential());
    }

    #[test]
    fn test_blur_contents_is_idempotent() {
        let (mut guard, _) = guard_with(MemoryAuthStore::default());
        guard.blur_contents();
        guard.blur_contents();
        assert!(guard.is_blurred());
        assert_eq!(guard.screen().installed, 1);
    }

    #[test]
    fn test_redundant_resign_active_keeps_one_overlay() {
        let (mut guard, _) = guard_with(MemoryAuthStore::default());
        guard.handle_event(WillResignActive);
        guard.handle_event(WillResignActive);
        assert_eq!(guard.phase(), Phase::Backgrounded);
        assert_eq!(guard.screen().installed, 1);
    }

    #[test]
    fn test_capture_failure_leaves_no_overlay() {
        let (mut guard, _) = guard_with(MemoryAuthStore::default());
        guard.screen_mut().size = ScreenSize::new(0, 0);
        guard.handle_event(WillResignActive);
        assert!(!guard.is_blurred());
        assert_eq!(guard.phase(), Phase::Backgrounded);

        guard.handle_event(DidBecomeActive);
        assert_eq!(guard.phase(), Phase::Clear);
        assert_eq!(guard.screen().removed, 0);
    }

    #[test]
    fn test_remove_backgrounded_blur_is_noop_while_prompting() {
        let (mut guard, challenger) = guard_with(passcode_store());
        background_and_return(&mut guard);
        assert!(guard.is_prompting_for_credential());

        guard.remove_backgrounded_blur();
        assert!(guard.is_blurred());
        assert_eq!(guard.screen().removed, 0);

        challenger.respond_next(Success);
        guard.pump();
        assert!(!guard.is_prompting_for_credential());
        assert!(!guard.is_blurred());

        // Idempotent once cleared.
        guard.remove_backgrounded_blur();
        assert_eq!(guard.screen().removed, 1);
    }

    #[test]
    fn test_remove_backgrounded_blur_after_flag_cleared() {
        let (mut guard, _) = guard_with(MemoryAuthStore::default());
        guard.handle_event(WillResignActive);
        guard.remove_backgrounded_blur();
        assert!(!guard.is_blurred());
        assert_eq!(guard.phase(), Phase::Clear);
        assert_eq!(guard.screen().removed, 1);
    }

    // ── Scenarios ─────────────────────────────────────────────────────

    #[test]
    fn test_no_metadata_clears_without_challenge() {
        let (mut guard, challenger) = guard_with(MemoryAuthStore::default());
        background_and_return(&mut guard);

        assert_eq!(guard.phase(), Phase::Clear);
        assert!(!guard.is_blurred());
        assert_eq!(challenger.count(), 0);
    }

    #[test]
    fn test_metadata_without_passcode_clears() {
        let store = MemoryAuthStore::new(Some(AuthenticationInfo::default()));
        let (mut guard, challenger) = guard_with(store);
        background_and_return(&mut guard);

        assert_eq!(guard.phase(), Phase::Clear);
        assert_eq!(challenger.count(), 0);
    }

    #[test]
    fn test_unreadable_metadata_requires_passcode() {
        let (mut guard, challenger) = guard_with(UnreadableStore);
        guard.handle_event(WillResignActive);
        guard.handle_event(DidBecomeActive);

        assert_eq!(guard.pending_ticket().map(|t| t.method), Some(AuthMethod::Passcode));
        assert!(guard.is_blurred());
        assert_eq!(challenger.count(), 1);
        assert_eq!(challenger.methods(), vec![AuthMethod::Passcode]);

        // Recording the validation fails too, the overlay still goes away.
        challenger.respond_next(Success);
        guard.pump();
        assert_eq!(guard.phase(), Phase::Clear);
        assert!(!guard.is_blurred());
    }

    #[test]
    fn test_validation_success_clears() {
        let (mut guard, challenger) = guard_with(passcode_store());
        background_and_return(&mut guard);

        assert!(guard.is_prompting_for_credential());
        assert!(guard.is_blurred());
        assert_eq!(challenger.count(), 1);

        challenger.respond_next(Success);
        assert_eq!(guard.pump(), 1);

        assert_eq!(guard.phase(), Phase::Clear);
        assert!(!guard.is_blurred());
        assert_eq!(guard.screen().popped_to_root, 0);
    }

    #[test]
    fn test_validation_success_records_time() {
        let store = MemoryAuthStore::new(Some(AuthenticationInfo {
            required_interval: PasscodeInterval::OneHour,
            ..AuthenticationInfo::with_passcode()
        }));
        let (guard, challenger) = guard_with(store.clone());
        let mut guard = guard.with_clock(|| std::time::UNIX_EPOCH + std::time::Duration::from_secs(5_000));
        background_and_return(&mut guard);
        challenger.respond_next(Success);
        guard.pump();

        assert_eq!(store.get().unwrap().last_validated_at, Some(5_000));

        // Within the interval: no new prompt.
        background_and_return(&mut guard);
        assert_eq!(guard.phase(), Phase::Clear);
        assert_eq!(challenger.count(), 1);
    }

    #[test]
    fn test_validation_cancel_navigates_to_root() {
        let (mut guard, challenger) = guard_with(passcode_store());
        background_and_return(&mut guard);

        challenger.respond_next(Cancel);
        guard.pump();

        assert_eq!(guard.phase(), Phase::Clear);
        assert!(!guard.is_blurred());
        assert_eq!(guard.screen().popped_to_root, 1);
        assert_eq!(
            guard.screen().calls.last().map(String::as_str),
            Some("remove_overlay"),
            "overlay must go only after navigating away"
        );
    }

    #[test]
    fn test_fallback_then_success() {
        let (mut guard, challenger) = guard_with(biometric_store());
        background_and_return(&mut guard);
        assert_eq!(challenger.methods(), vec![AuthMethod::Biometric]);

        challenger.respond_next(Fallback);
        guard.pump();
        assert!(guard.is_prompting_for_credential());
        assert!(guard.is_blurred());

        challenger.respond_next(Success);
        guard.pump();

        assert_eq!(challenger.count(), 2);
        assert_eq!(
            challenger.methods(),
            vec![AuthMethod::Biometric, AuthMethod::Passcode]
        );
        assert_eq!(guard.phase(), Phase::Clear);
        assert!(!guard.is_blurred());
    }

    #[test]
    fn test_fallback_exhaustion_locks_out() {
        let (mut guard, challenger) = guard_with(biometric_store());
        background_and_return(&mut guard);
        challenger.respond_next(Fallback);
        guard.pump();
        challenger.respond_next(Fallback);
        guard.pump();

        assert_eq!(guard.phase(), Phase::LockedOut);
        assert!(guard.is_blurred(), "never silently unblurred");
        assert_eq!(guard.screen().locked_out, 1);
        assert_eq!(challenger.count(), 2);

        guard.remove_backgrounded_blur();
        assert!(guard.is_blurred());

        // Coming back restarts from the first method.
        guard.handle_event(WillEnterForeground);
        assert_eq!(challenger.count(), 3);
        assert_eq!(challenger.methods()[2], AuthMethod::Biometric);
        challenger.respond_next(Success);
        guard.pump();
        assert_eq!(guard.phase(), Phase::Clear);
    }

    #[test]
    fn test_fallback_error_is_reported() {
        let (mut guard, _challenger) = guard_with(passcode_store());
        background_and_return(&mut guard);
        let err = guard.on_credential_fallback().unwrap_err();
        assert!(matches!(
            err,
            GuardError::FallbackExhausted {
                last: AuthMethod::Passcode
            }
        ));
    }

    #[test]
    fn test_public_outcome_handlers() {
        let (mut guard, _challenger) = guard_with(passcode_store());
        background_and_return(&mut guard);
        guard.on_credential_validated().unwrap();
        assert_eq!(guard.phase(), Phase::Clear);

        background_and_return(&mut guard);
        assert!(matches!(
            guard.on_credential_cancelled(),
            Err(GuardError::ChallengeCancelled)
        ));
        assert_eq!(guard.screen().popped_to_root, 1);

        // Nothing pending: harmless.
        guard.on_credential_validated().unwrap();
    }

    // ── Concurrency ───────────────────────────────────────────────────

    #[test]
    fn test_second_check_while_prompting_is_ignored() {
        let (mut guard, challenger) = guard_with(passcode_store());
        guard.handle_event(WillResignActive);
        guard.handle_event(WillEnterForeground);
        guard.handle_event(DidBecomeActive);
        guard.check_if_user_requires_validation();

        assert_eq!(challenger.count(), 1);
        assert!(guard.is_prompting_for_credential());
    }

    #[test]
    fn test_resign_cycles_while_prompting_keep_overlay() {
        let (mut guard, challenger) = guard_with(passcode_store());
        background_and_return(&mut guard);
        for _ in 0..3 {
            guard.handle_event(WillResignActive);
            guard.handle_event(WillEnterForeground);
            guard.handle_event(DidBecomeActive);
        }
        assert!(guard.is_blurred());
        assert_eq!(guard.screen().installed, 1);
        assert_eq!(guard.screen().removed, 0);
        assert_eq!(challenger.count(), 1);
    }

    #[test]
    fn test_stale_result_is_ignored() {
        let (mut guard, _challenger) = guard_with(biometric_store());
        background_and_return(&mut guard);
        let first = guard.pending_ticket().unwrap();
        guard.on_credential_fallback().unwrap();

        let err = guard.resolve(first, Success).unwrap_err();
        assert!(matches!(err, GuardError::StaleChallenge(_)));
        assert!(guard.is_prompting_for_credential());
        assert!(guard.is_blurred());
    }

    #[test]
    fn test_synchronous_answer_is_applied_on_pump() {
        let challenger = ScriptedChallenger::new([Fallback, Success]);
        let mut guard = guard_with_challenger(biometric_store(), Box::new(challenger.clone()));

        background_and_return(&mut guard);
        assert!(guard.is_prompting_for_credential());

        guard.pump();
        assert_eq!(challenger.count(), 2);
        assert_eq!(guard.phase(), Phase::Clear);
    }

    #[test]
    fn test_dropped_responder_locks_out() {
        let (mut guard, challenger) = guard_with(passcode_store());
        background_and_return(&mut guard);
        challenger.drop_next();
        guard.pump();

        assert_eq!(guard.phase(), Phase::LockedOut);
        assert!(guard.is_blurred());
    }

    // ── Subscriptions ─────────────────────────────────────────────────

    #[test]
    fn test_attach_detach_is_paired() {
        let hub = LifecycleHub::new();
        let (mut guard, _) = guard_with(MemoryAuthStore::default());

        guard.attach(&hub);
        guard.attach(&hub);
        for event in LifecycleEvent::ALL {
            assert_eq!(hub.subscriber_count(event), 1, "{event}");
        }

        guard.detach();
        for event in LifecycleEvent::ALL {
            assert_eq!(hub.subscriber_count(event), 0, "{event}");
        }
        assert!(!guard.is_attached());
    }

    #[test]
    fn test_dropping_guard_unsubscribes() {
        let hub = LifecycleHub::new();
        let (mut guard, _) = guard_with(MemoryAuthStore::default());
        guard.attach(&hub);
        drop(guard);
        assert_eq!(hub.subscriber_count(WillResignActive), 0);
    }

    #[test]
    fn test_events_through_hub() {
        let hub = LifecycleHub::new();
        let (mut guard, challenger) = guard_with(passcode_store());
        guard.attach(&hub);

        hub.post(WillResignActive);
        assert!(!guard.is_blurred(), "nothing applied before pump");
        guard.pump();
        assert!(guard.is_blurred());

        hub.post(WillEnterForeground);
        hub.post(DidBecomeActive);
        guard.pump();
        assert_eq!(challenger.count(), 1);

        challenger.respond_next(Success);
        guard.pump();
        assert_eq!(guard.phase(), Phase::Clear);
    }

    #[test]
    fn test_detach_drops_pending_result() {
        let hub = LifecycleHub::new();
        let (mut guard, challenger) = guard_with(passcode_store());
        guard.attach(&hub);
        background_and_return(&mut guard);

        guard.detach();
        challenger.respond_next(Success);
        guard.pump();

        assert_eq!(guard.phase(), Phase::LockedOut);
        assert!(guard.is_blurred());

        hub.post(DidBecomeActive);
        assert_eq!(guard.pump(), 0, "no longer subscribed");
    }

    // ── Property ──────────────────────────────────────────────────────

    /// Blurred iff the last relevant event was a resign-active or a prompt
    /// is pending, for every event sequence up to length 6.
    #[test]
    fn test_blurred_iff_backgrounded_or_prompting() {
        const EVENTS: [LifecycleEvent; 3] = LifecycleEvent::ALL;

        for store in [MemoryAuthStore::default(), passcode_store()] {
            for len in 1..=6u32 {
                for code in 0..3usize.pow(len) {
                    let (mut guard, _challenger) = guard_with(MemoryAuthStore::new(store.get()));
                    let mut c = code;
                    let mut last = None;
                    for _ in 0..len {
                        let event = EVENTS[c % 3];
                        c /= 3;
                        guard.handle_event(event);
                        last = Some(event);
                    }
                    let expected =
                        last == Some(WillResignActive) || guard.is_prompting_for_credential();
                    assert_eq!(guard.is_blurred(), expected, "sequence {code} of length {len}");
                    if guard.phase() == Phase::Clear {
                        assert!(!guard.is_blurred());
                    }
                }
            }
        }
    }
}
