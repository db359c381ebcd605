//! Événements de cycle de vie de l'application et abonnements typés.
//!
//! Pas de registre global indexé par chaînes : chaque abonnement est un
//! [`Subscription`] possédé par l'abonné. Le lâcher (drop) désabonne, de
//! façon déterministe. La source ne garde qu'un [`EventSink`] vers la boîte
//! aux lettres du guard, jamais une référence forte vers l'écran.
//!
//! ## Correspondance Winit
//!
//! ```text
//! WindowEvent::Focused(false)   → WillResignActive
//! WindowEvent::Occluded(true)   → WillResignActive
//! suspended()                   → WillResignActive
//! WindowEvent::Occluded(false)  → WillEnterForeground
//! resumed() (déjà en marche)    → WillEnterForeground
//! WindowEvent::Focused(true)    → DidBecomeActive
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::mpsc::Sender;

use tracing::debug;
use winit::event::WindowEvent;

use crate::guard::GuardMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    WillEnterForeground,
    WillResignActive,
    DidBecomeActive,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 3] = [
        Self::WillEnterForeground,
        Self::WillResignActive,
        Self::DidBecomeActive,
    ];
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WillEnterForeground => "will-enter-foreground",
            Self::WillResignActive => "will-resign-active",
            Self::DidBecomeActive => "did-become-active",
        };
        f.write_str(name)
    }
}

/// Traduit un événement fenêtre Winit en événement de cycle de vie.
pub fn from_window_event(event: &WindowEvent) -> Option<LifecycleEvent> {
    match event {
        WindowEvent::Focused(false) | WindowEvent::Occluded(true) => {
            Some(LifecycleEvent::WillResignActive)
        }
        WindowEvent::Occluded(false) => Some(LifecycleEvent::WillEnterForeground),
        WindowEvent::Focused(true) => Some(LifecycleEvent::DidBecomeActive),
        _ => None,
    }
}

/// Extrémité d'envoi vers la boîte aux lettres d'un guard.
#[derive(Debug, Clone)]
pub struct EventSink(Sender<GuardMessage>);

impl EventSink {
    pub(crate) fn new(tx: Sender<GuardMessage>) -> Self {
        Self(tx)
    }

    /// `false` si le guard n'existe plus.
    pub fn deliver(&self, event: LifecycleEvent) -> bool {
        self.0.send(GuardMessage::Lifecycle(event)).is_ok()
    }
}

/// Abonnement à un type d'événement. Désabonne au drop.
pub struct Subscription {
    event: LifecycleEvent,
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// `cancel` est appelé exactement une fois, au drop ou à [`Self::cancel`].
    pub fn new(event: LifecycleEvent, cancel: impl FnOnce() + 'static) -> Self {
        Self {
            event,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn event(&self) -> LifecycleEvent {
        self.event
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Source d'événements de cycle de vie.
pub trait LifecycleSource {
    fn subscribe(&self, event: LifecycleEvent, sink: EventSink) -> Subscription;
}

// ─────────────────────────────────────────────────────────────────────────────
// LifecycleHub : implémentation en processus
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(u64, LifecycleEvent, EventSink)>,
}

/// Source de cycle de vie alimentée par l'hôte via [`LifecycleHub::post`].
///
/// Mono-thread (`Rc`) : les événements de la plateforme arrivent sur le
/// thread principal. Les clones partagent le même registre.
#[derive(Clone, Default)]
pub struct LifecycleHub {
    registry: Rc<RefCell<Registry>>,
}

impl LifecycleHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distribue `event` aux abonnés de ce type. Les abonnés dont le guard a
    /// disparu sont retirés au passage. Retourne le nombre de livraisons.
    pub fn post(&self, event: LifecycleEvent) -> usize {
        let mut registry = self.registry.borrow_mut();
        let mut delivered = 0;
        registry.entries.retain(|(id, kind, sink)| {
            if *kind != event {
                return true;
            }
            if sink.deliver(event) {
                delivered += 1;
                true
            } else {
                debug!(id, %event, "Dropping subscription of a vanished guard");
                false
            }
        });
        debug!(%event, delivered, "Lifecycle event posted");
        delivered
    }

    pub fn subscriber_count(&self, event: LifecycleEvent) -> usize {
        self.registry
            .borrow()
            .entries
            .iter()
            .filter(|(_, kind, _)| *kind == event)
            .count()
    }
}

impl LifecycleSource for LifecycleHub {
    fn subscribe(&self, event: LifecycleEvent, sink: EventSink) -> Subscription {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, event, sink));
            id
        };

        let registry: Weak<RefCell<Registry>> = Rc::downgrade(&self.registry);
        Subscription::new(event, move || {
            if let Some(registry) = registry.upgrade() {
                registry.borrow_mut().entries.retain(|(entry, ..)| *entry != id);
            }
        })
    }
}
