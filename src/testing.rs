//! Recording fakes shared by the unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use crate::auth::{
    AuthMethod, AuthenticationChallenger, AuthenticationOutcome, ChallengeRequest,
    ChallengeResponder,
};
use crate::blur::BoxBlur;
use crate::capture::{ScreenSize, Snapshot};
use crate::guard::{BlurGuard, Collaborators};
use crate::error::{GuardError, Result};
use crate::keychain::{AuthInfoStore, AuthenticationInfo};
use crate::screen::GuardedScreen;

/// Screen that records every call made on it.
#[derive(Debug)]
pub struct RecordingScreen {
    pub name: String,
    pub size: ScreenSize,
    pub overlay: Option<Snapshot>,
    pub installed: usize,
    pub removed: usize,
    pub popped_to_root: usize,
    pub locked_out: usize,
    pub calls: Vec<String>,
}

impl RecordingScreen {
    pub fn new(name: &str, size: ScreenSize) -> Self {
        Self {
            name: name.to_string(),
            size,
            overlay: None,
            installed: 0,
            removed: 0,
            popped_to_root: 0,
            locked_out: 0,
            calls: Vec::new(),
        }
    }
}

impl GuardedScreen for RecordingScreen {
    fn name(&self) -> &str {
        &self.name
    }

    fn install_overlay(&mut self, image: &Snapshot) {
        self.overlay = Some(image.clone());
        self.installed += 1;
        self.calls.push("install_overlay".into());
    }

    fn remove_overlay(&mut self) {
        self.overlay = None;
        self.removed += 1;
        self.calls.push("remove_overlay".into());
    }

    fn pop_to_root(&mut self) {
        self.popped_to_root += 1;
        self.calls.push("pop_to_root".into());
    }

    fn show_locked_out(&mut self) {
        self.locked_out += 1;
        self.calls.push("show_locked_out".into());
    }
}

/// Checkerboard "page" of the screen's size. Zero-size screens capture nothing.
pub fn frame_capture(screen: &RecordingScreen) -> Option<Snapshot> {
    let size = screen.size;
    if size.is_empty() {
        return None;
    }
    let pixels = (0..size.height)
        .flat_map(|y| (0..size.width).map(move |x| (x, y)))
        .map(|(x, y)| {
            if (x + y) % 2 == 0 {
                [20, 20, 20, 255]
            } else {
                [230, 230, 230, 255]
            }
        })
        .collect();
    Snapshot::new(size, pixels)
}

/// Keeps every responder until the test answers it.
#[derive(Clone, Default)]
pub struct RecordingChallenger {
    requests: Rc<RefCell<Vec<ChallengeRequest>>>,
    responders: Rc<RefCell<VecDeque<ChallengeResponder>>>,
}

impl RecordingChallenger {
    pub fn count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn methods(&self) -> Vec<AuthMethod> {
        self.requests.borrow().iter().map(|r| r.ticket.method).collect()
    }

    /// Answers the oldest unanswered challenge.
    pub fn respond_next(&self, outcome: AuthenticationOutcome) {
        let responder = self.responders.borrow_mut().pop_front().expect("no pending challenge");
        responder.respond(outcome);
    }

    pub fn drop_next(&self) {
        let responder = self.responders.borrow_mut().pop_front().expect("no pending challenge");
        drop(responder);
    }
}

impl AuthenticationChallenger for RecordingChallenger {
    fn challenge(&self, request: ChallengeRequest, responder: ChallengeResponder) {
        self.requests.borrow_mut().push(request);
        self.responders.borrow_mut().push_back(responder);
    }
}

/// Answers synchronously, from inside `challenge`, with scripted outcomes.
#[derive(Clone)]
pub struct ScriptedChallenger {
    script: Rc<RefCell<VecDeque<AuthenticationOutcome>>>,
    count: Rc<RefCell<usize>>,
}

impl ScriptedChallenger {
    pub fn new(script: impl IntoIterator<Item = AuthenticationOutcome>) -> Self {
        Self {
            script: Rc::new(RefCell::new(script.into_iter().collect())),
            count: Rc::new(RefCell::new(0)),
        }
    }

    pub fn count(&self) -> usize {
        *self.count.borrow()
    }
}

impl AuthenticationChallenger for ScriptedChallenger {
    fn challenge(&self, _request: ChallengeRequest, responder: ChallengeResponder) {
        *self.count.borrow_mut() += 1;
        let outcome = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or(AuthenticationOutcome::Cancel);
        responder.respond(outcome);
    }
}

/// Store whose metadata can never be read.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnreadableStore;

impl AuthInfoStore for UnreadableStore {
    fn load(&self) -> Result<Option<AuthenticationInfo>> {
        Err(GuardError::AuthStore(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "keychain locked",
        )))
    }

    fn save(&self, _info: &AuthenticationInfo) -> Result<()> {
        Err(GuardError::AuthStore(io::Error::from(io::ErrorKind::PermissionDenied)))
    }
}

pub fn guard_with_challenger(
    store: impl AuthInfoStore + 'static,
    challenger: Box<dyn AuthenticationChallenger>,
) -> BlurGuard<RecordingScreen> {
    BlurGuard::new(
        RecordingScreen::new("logins", ScreenSize::new(12, 20)),
        Collaborators {
            capture: Box::new(frame_capture),
            filter: Box::new(BoxBlur),
            challenger,
            store: Box::new(store),
        },
    )
}

pub fn guard_with(store: impl AuthInfoStore + 'static) -> (BlurGuard<RecordingScreen>, RecordingChallenger) {
    let challenger = RecordingChallenger::default();
    let guard = guard_with_challenger(store, Box::new(challenger.clone()));
    (guard, challenger)
}
